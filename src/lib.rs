//! Hand gesture feature streaming.
//!
//! `handstream` turns per-frame hand landmarks from an external detector into a small set of
//! gesture features (fingertip position, pinch "zoom", palm angle, finger extension and fingertip
//! touches) and streams one JSON record per frame to a single connected listener.
//!
//! # Coordinates
//!
//! Landmarks are expected in image pixel coordinates: X points to the right, Y points *down*, with
//! the origin in the top left corner. The emitted position is normalized and has Y pointing *up*.
//!
//! # Environment Variables
//!
//! The binary reads its configuration from the environment (see [`config::Config`]):
//!
//! * `HANDSTREAM_TOUCH_THRESHOLD`: fingertip touch distance in pixels (default 30).
//! * `HANDSTREAM_ZOOM_NORMALIZATION`: divisor for the pinch distance (default 200).
//! * `HANDSTREAM_DISPLAY_DEBUG`: log a text overlay for every hand in every frame.
//! * `HANDSTREAM_ADDR`: listen address (default `127.0.0.1:6789`).
//! * `HANDSTREAM_TRANSPORT`: `ws` (WebSocket, default) or `lines` (newline-delimited JSON over
//!   TCP).
//! * `HANDSTREAM_QUEUE_CAPACITY`: frames buffered for the listener before the oldest is dropped.
//! * `HANDSTREAM_WRITE_TIMEOUT_MS`: socket timeout for listener connections.
//!
//! Other variables are never inspected. A `HANDSTREAM_*` variable that is not valid Unicode makes
//! startup fail with an error naming it.

use log::LevelFilter;

pub mod config;
pub mod error;
pub mod frame;
pub mod gesture;
pub mod hand;
pub mod landmark;
pub mod overlay;
pub mod pipeline;
pub mod queue;
pub mod resolution;
pub mod server;
pub mod source;
pub mod timer;

pub use error::ExtractError;
pub use frame::{process_frame, DetectionFrame, FrameRecord};
pub use gesture::{extract, Extractor, FeatureRecord};

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = if cfg!(debug_assertions) {
        LevelFilter::Trace
    } else {
        LevelFilter::Debug
    };
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_CRATE_NAME")), LevelFilter::Debug)
        .filter(Some("tungstenite"), LevelFilter::Warn)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// If `cfg!(debug_assertions)` is enabled, the calling crate will log at *trace* level. Otherwise,
/// it will log at *debug* level. `handstream` itself logs at *debug* level, and `tungstenite` at
/// *warn* level.
///
/// `RUST_LOG` overrides these defaults. If a global logger is already registered, this macro will
/// do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
