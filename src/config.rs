//! Process-wide configuration.

use std::{env, ffi::OsStr, str::FromStr, time::Duration};

use anyhow::{bail, Context};

use crate::{
    gesture::{Extractor, TOUCH_THRESHOLD, ZOOM_NORMALIZATION},
    server::Transport,
};

const ENV_PREFIX: &str = "HANDSTREAM_";

/// Runtime settings, fixed at startup.
///
/// Construct with [`Config::default`] and the builder methods, then apply overrides from the
/// environment with [`Config::from_env`] / [`Config::apply_vars`].
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    touch_threshold: f32,
    zoom_normalization: f32,
    display_debug: bool,
    listen_addr: String,
    transport: Transport,
    queue_capacity: usize,
    io_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            touch_threshold: TOUCH_THRESHOLD,
            zoom_normalization: ZOOM_NORMALIZATION,
            display_debug: false,
            listen_addr: "127.0.0.1:6789".into(),
            transport: Transport::WebSocket,
            queue_capacity: 2,
            io_timeout: Duration::from_millis(2000),
        }
    }
}

impl Config {
    /// Returns the default configuration, with overrides from the process environment applied.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::default().apply_vars(env::vars_os())
    }

    /// Applies `HANDSTREAM_*` overrides from a list of variables and validates the result.
    ///
    /// Unrelated variables are ignored, even if they are not valid Unicode. A `HANDSTREAM_*`
    /// variable whose value is not valid Unicode is an error.
    pub fn apply_vars<I, K, V>(mut self, vars: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        for (key, value) in vars {
            let Some(key) = key.as_ref().to_str().filter(|k| k.starts_with(ENV_PREFIX)) else {
                continue;
            };
            let value = value
                .as_ref()
                .to_str()
                .with_context(|| format!("value of {key} is not valid unicode"))?
                .trim();
            match key {
                "HANDSTREAM_TOUCH_THRESHOLD" => self.touch_threshold = parse(key, value)?,
                "HANDSTREAM_ZOOM_NORMALIZATION" => self.zoom_normalization = parse(key, value)?,
                "HANDSTREAM_DISPLAY_DEBUG" => self.display_debug = parse_flag(key, value)?,
                "HANDSTREAM_ADDR" => self.listen_addr = value.to_string(),
                "HANDSTREAM_TRANSPORT" => self.transport = parse(key, value)?,
                "HANDSTREAM_QUEUE_CAPACITY" => self.queue_capacity = parse(key, value)?,
                "HANDSTREAM_WRITE_TIMEOUT_MS" => {
                    self.io_timeout = Duration::from_millis(parse(key, value)?)
                }
                _ => log::warn!("ignoring unknown variable {key}"),
            }
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !(self.touch_threshold.is_finite() && self.touch_threshold >= 0.0) {
            bail!(
                "touch threshold must be a non-negative number, got {}",
                self.touch_threshold
            );
        }
        if !(self.zoom_normalization.is_finite() && self.zoom_normalization > 0.0) {
            bail!(
                "zoom normalization must be a positive number, got {}",
                self.zoom_normalization
            );
        }
        if self.queue_capacity == 0 {
            bail!("queue capacity must be at least 1");
        }
        if self.io_timeout.is_zero() {
            bail!("write timeout must be nonzero");
        }
        Ok(())
    }

    #[inline]
    pub fn touch_threshold(self, touch_threshold: f32) -> Self {
        Self {
            touch_threshold,
            ..self
        }
    }

    #[inline]
    pub fn zoom_normalization(self, zoom_normalization: f32) -> Self {
        Self {
            zoom_normalization,
            ..self
        }
    }

    /// Enables logging the per-hand debug overlay for every frame.
    #[inline]
    pub fn display_debug(self, display_debug: bool) -> Self {
        Self {
            display_debug,
            ..self
        }
    }

    #[inline]
    pub fn listen_addr(self, addr: impl Into<String>) -> Self {
        Self {
            listen_addr: addr.into(),
            ..self
        }
    }

    #[inline]
    pub fn transport(self, transport: Transport) -> Self {
        Self { transport, ..self }
    }

    /// Sets how many frame records may wait for the listener before the oldest is dropped.
    #[inline]
    pub fn queue_capacity(self, queue_capacity: usize) -> Self {
        Self {
            queue_capacity,
            ..self
        }
    }

    /// Sets the read/write timeout of listener connections.
    #[inline]
    pub fn io_timeout(self, io_timeout: Duration) -> Self {
        Self { io_timeout, ..self }
    }

    /// Builds the feature extractor for the configured thresholds.
    ///
    /// The configuration must have passed [`Config::validate`].
    pub fn extractor(&self) -> Extractor {
        Extractor::new(self.touch_threshold, self.zoom_normalization)
    }

    pub fn is_display_debug(&self) -> bool {
        self.display_debug
    }

    pub fn addr(&self) -> &str {
        &self.listen_addr
    }

    pub fn listen_transport(&self) -> Transport {
        self.transport
    }

    pub fn frame_queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    pub fn write_timeout(&self) -> Duration {
        self.io_timeout
    }
}

fn parse<T>(key: &str, value: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Into<anyhow::Error>,
{
    value
        .parse::<T>()
        .map_err(Into::into)
        .with_context(|| format!("invalid value '{value}' for {key}"))
}

fn parse_flag(key: &str, value: &str) -> anyhow::Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => bail!("invalid value '{value}' for {key} (expected a boolean)"),
    }
}
