//! Frame dimensions.

use std::fmt;

use crate::error::ExtractError;

/// Resolution (`width x height`) of a processed camera frame, in pixels.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    width: u32,
    height: u32,
}

impl Resolution {
    /// 480p resolution: `640x480`
    pub const RES_480P: Self = Self {
        width: 640,
        height: 480,
    };

    /// Creates a new [`Resolution`] of `width x height`.
    ///
    /// Zero-sized resolutions can be created, but are rejected by [`Resolution::validate`].
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns the width of this [`Resolution`].
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the height of this [`Resolution`].
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Ensures both dimensions are nonzero, so that they can be divided by.
    pub fn validate(&self) -> Result<(), ExtractError> {
        if self.width == 0 || self.height == 0 {
            Err(ExtractError::InvalidDimensions {
                width: f64::from(self.width),
                height: f64::from(self.height),
            })
        } else {
            Ok(())
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
