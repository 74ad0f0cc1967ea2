//! Gesture feature extraction.
//!
//! Every feature is computed from a single hand's landmark set in a single frame. There is no
//! smoothing and no state carried between frames.
//!
//! The heuristics in here are deliberately simple, and downstream consumers depend on their exact
//! thresholds:
//!
//! - a finger counts as extended when its tip is strictly above a reference joint in the image,
//!   which misclassifies sideways or rotated hands;
//! - fingertip touches compare raw pixel distances against a fixed threshold, so they depend on
//!   how large the hand appears in the frame;
//! - the "zoom" value is just the pinch distance divided by a constant.

use serde::{Deserialize, Serialize};

use crate::{
    error::ExtractError,
    landmark::{LandmarkIdx, LandmarkSet},
    resolution::Resolution,
};

/// Maximum distance in pixels between two fingertips for them to count as touching.
pub const TOUCH_THRESHOLD: f32 = 30.0;

/// Divisor applied to the thumb-index distance to obtain the pseudo-zoom value.
pub const ZOOM_NORMALIZATION: f32 = 200.0;

/// The five fingers, each with the tip/joint pair used for the extension test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    pub const ALL: [Finger; 5] = [
        Finger::Thumb,
        Finger::Index,
        Finger::Middle,
        Finger::Ring,
        Finger::Pinky,
    ];

    /// The fingertip landmark.
    pub fn tip(self) -> LandmarkIdx {
        match self {
            Finger::Thumb => LandmarkIdx::ThumbTip,
            Finger::Index => LandmarkIdx::IndexFingerTip,
            Finger::Middle => LandmarkIdx::MiddleFingerTip,
            Finger::Ring => LandmarkIdx::RingFingerTip,
            Finger::Pinky => LandmarkIdx::PinkyTip,
        }
    }

    /// The joint the tip has to be above for the finger to count as extended.
    ///
    /// This is the IP joint for the thumb and the PIP joint for every other finger.
    pub fn reference_joint(self) -> LandmarkIdx {
        match self {
            Finger::Thumb => LandmarkIdx::ThumbIp,
            Finger::Index => LandmarkIdx::IndexFingerPip,
            Finger::Middle => LandmarkIdx::MiddleFingerPip,
            Finger::Ring => LandmarkIdx::RingFingerPip,
            Finger::Pinky => LandmarkIdx::PinkyPip,
        }
    }

    /// Vertical-only extension test: `tip.y < joint.y`.
    ///
    /// Equal Y coordinates count as *not* extended.
    pub fn is_extended(self, landmarks: &LandmarkSet) -> bool {
        landmarks.get(self.tip()).y < landmarks.get(self.reference_joint()).y
    }
}

/// The fingertip pairs that are checked for touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchPair {
    PointerThumb,
    PointerMiddle,
    PinkyThumb,
    ThumbMiddle,
}

impl TouchPair {
    pub const ALL: [TouchPair; 4] = [
        TouchPair::PointerThumb,
        TouchPair::PointerMiddle,
        TouchPair::PinkyThumb,
        TouchPair::ThumbMiddle,
    ];

    pub fn fingers(self) -> (Finger, Finger) {
        match self {
            TouchPair::PointerThumb => (Finger::Index, Finger::Thumb),
            TouchPair::PointerMiddle => (Finger::Index, Finger::Middle),
            TouchPair::PinkyThumb => (Finger::Pinky, Finger::Thumb),
            TouchPair::ThumbMiddle => (Finger::Thumb, Finger::Middle),
        }
    }

    /// Pixel distance between the two fingertips.
    pub fn distance(self, landmarks: &LandmarkSet) -> f32 {
        let (a, b) = self.fingers();
        landmarks.distance(a.tip(), b.tip())
    }
}

/// Normalized index fingertip position.
///
/// `x` grows to the right and `y` grows *upwards*, both spanning `0.0..=1.0` across the frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

/// Extension flag of each finger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FingerStates {
    pub thumb_up: bool,
    pub index_up: bool,
    pub middle_up: bool,
    pub ring_up: bool,
    pub pinky_up: bool,
}

impl FingerStates {
    pub fn get(&self, finger: Finger) -> bool {
        match finger {
            Finger::Thumb => self.thumb_up,
            Finger::Index => self.index_up,
            Finger::Middle => self.middle_up,
            Finger::Ring => self.ring_up,
            Finger::Pinky => self.pinky_up,
        }
    }

    /// Returns the states as `(name, extended)` pairs, in output order.
    pub fn entries(&self) -> [(&'static str, bool); 5] {
        [
            ("thumb_up", self.thumb_up),
            ("index_up", self.index_up),
            ("middle_up", self.middle_up),
            ("ring_up", self.ring_up),
            ("pinky_up", self.pinky_up),
        ]
    }
}

/// Touch flag of each tracked fingertip pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Touches {
    pub pointer_thumb: bool,
    pub pointer_middle: bool,
    pub pinky_thumb: bool,
    pub thumb_middle: bool,
}

impl Touches {
    pub fn get(&self, pair: TouchPair) -> bool {
        match pair {
            TouchPair::PointerThumb => self.pointer_thumb,
            TouchPair::PointerMiddle => self.pointer_middle,
            TouchPair::PinkyThumb => self.pinky_thumb,
            TouchPair::ThumbMiddle => self.thumb_middle,
        }
    }

    /// Returns the flags as `(name, touching)` pairs, in output order.
    pub fn entries(&self) -> [(&'static str, bool); 4] {
        [
            ("pointer_thumb", self.pointer_thumb),
            ("pointer_middle", self.pointer_middle),
            ("pinky_thumb", self.pinky_thumb),
            ("thumb_middle", self.thumb_middle),
        ]
    }
}

/// Gesture features of one hand in one frame.
///
/// All numbers are `f32`, so they go out on the wire with single precision: a position of
/// `100 / 300` serializes as `0.33333334`, not as the 17-digit double a Python producer would emit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    #[serde(flatten)]
    pub position: Position,
    /// Pinch distance divided by the zoom normalization. Not a calibrated measurement.
    #[serde(rename = "zoom")]
    pub pseudo_zoom: f32,
    /// Angle at the index MCP between the wrist and the pinky MCP, in degrees, in `[0, 360)`.
    pub angle: f32,
    pub finger_states: FingerStates,
    pub touches: Touches,
}

/// Computes [`FeatureRecord`]s with a fixed set of thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extractor {
    touch_threshold: f32,
    zoom_normalization: f32,
}

impl Default for Extractor {
    fn default() -> Self {
        Self {
            touch_threshold: TOUCH_THRESHOLD,
            zoom_normalization: ZOOM_NORMALIZATION,
        }
    }
}

impl Extractor {
    /// Creates an extractor with custom thresholds.
    ///
    /// # Panics
    ///
    /// Panics if `zoom_normalization` is not a positive finite number, or if `touch_threshold` is
    /// negative or not finite.
    pub fn new(touch_threshold: f32, zoom_normalization: f32) -> Self {
        assert!(touch_threshold.is_finite() && touch_threshold >= 0.0);
        assert!(zoom_normalization.is_finite() && zoom_normalization > 0.0);
        Self {
            touch_threshold,
            zoom_normalization,
        }
    }

    pub fn touch_threshold(&self) -> f32 {
        self.touch_threshold
    }

    pub fn zoom_normalization(&self) -> f32 {
        self.zoom_normalization
    }

    /// Validates raw detector coordinates and computes the hand's features.
    pub fn extract<P: AsRef<[f32]>>(
        &self,
        coords: &[P],
        resolution: Resolution,
    ) -> Result<FeatureRecord, ExtractError> {
        resolution.validate()?;
        let landmarks = LandmarkSet::from_coords(coords)?;
        self.features(&landmarks, resolution)
    }

    /// Computes the features of an already validated landmark set.
    pub fn features(
        &self,
        landmarks: &LandmarkSet,
        resolution: Resolution,
    ) -> Result<FeatureRecord, ExtractError> {
        resolution.validate()?;

        let tip = landmarks.get(LandmarkIdx::IndexFingerTip);
        let position = Position {
            x: tip.x / resolution.width() as f32,
            y: 1.0 - tip.y / resolution.height() as f32,
        };

        let finger_states = FingerStates {
            thumb_up: Finger::Thumb.is_extended(landmarks),
            index_up: Finger::Index.is_extended(landmarks),
            middle_up: Finger::Middle.is_extended(landmarks),
            ring_up: Finger::Ring.is_extended(landmarks),
            pinky_up: Finger::Pinky.is_extended(landmarks),
        };

        let touches = Touches {
            pointer_thumb: self.is_touching(TouchPair::PointerThumb, landmarks),
            pointer_middle: self.is_touching(TouchPair::PointerMiddle, landmarks),
            pinky_thumb: self.is_touching(TouchPair::PinkyThumb, landmarks),
            thumb_middle: self.is_touching(TouchPair::ThumbMiddle, landmarks),
        };

        Ok(FeatureRecord {
            position,
            pseudo_zoom: self.pseudo_zoom(landmarks),
            angle: palm_angle(landmarks),
            finger_states,
            touches,
        })
    }

    /// Thumb-index distance scaled by the zoom normalization.
    pub fn pseudo_zoom(&self, landmarks: &LandmarkSet) -> f32 {
        TouchPair::PointerThumb.distance(landmarks) / self.zoom_normalization
    }

    /// Raw-pixel proximity test between two fingertips.
    pub fn is_touching(&self, pair: TouchPair, landmarks: &LandmarkSet) -> bool {
        pair.distance(landmarks) < self.touch_threshold
    }
}

/// Extracts features with the default thresholds.
pub fn extract<P: AsRef<[f32]>>(
    coords: &[P],
    resolution: Resolution,
) -> Result<FeatureRecord, ExtractError> {
    Extractor::default().extract(coords, resolution)
}

/// Signed angle at the index MCP, turning from the wrist to the pinky MCP.
pub fn palm_angle(landmarks: &LandmarkSet) -> f32 {
    let vertex = landmarks.get(LandmarkIdx::IndexFingerMcp);
    let wrist = landmarks.get(LandmarkIdx::Wrist) - vertex;
    let pinky = landmarks.get(LandmarkIdx::PinkyMcp) - vertex;
    let degrees = (pinky.y.atan2(pinky.x) - wrist.y.atan2(wrist.x)).to_degrees();
    wrap_degrees(degrees)
}

/// Wraps an angle into `[0, 360)`.
fn wrap_degrees(degrees: f32) -> f32 {
    let wrapped = degrees.rem_euclid(360.0);
    // `rem_euclid` rounds tiny negative inputs up to exactly 360.
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}
