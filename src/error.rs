//! Per-hand extraction errors.

use std::{error::Error, fmt};

/// An error that prevents a single hand from being turned into a feature record.
///
/// These errors are always local to one hand: the frame processor logs them and carries on with
/// the remaining hands.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractError {
    /// The landmark list has the wrong length or shape.
    MalformedInput(Malformed),
    /// The frame width or height is not a positive integer.
    ///
    /// Values that are missing or not numbers at all are reported as NaN.
    InvalidDimensions { width: f64, height: f64 },
    /// The hand's label is neither left nor right.
    UnrecognizedHandLabel(String),
}

/// Describes what is wrong with a malformed landmark list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Malformed {
    /// The list does not have exactly 21 entries.
    Count { found: usize },
    /// A landmark does not have 2 or 3 coordinates.
    Shape { index: usize, len: usize },
    /// A landmark has a NaN or infinite X or Y coordinate.
    NonFinite { index: usize },
    /// The landmarks are not a list at all.
    NotAList,
    /// A landmark is not a list of numbers.
    NotNumeric { index: usize },
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractError::MalformedInput(Malformed::Count { found }) => write!(
                f,
                "malformed landmark set: expected {} landmarks, got {found}",
                crate::landmark::NUM_LANDMARKS
            ),
            ExtractError::MalformedInput(Malformed::Shape { index, len }) => write!(
                f,
                "malformed landmark set: landmark {index} has {len} coordinates (expected 2 or 3)"
            ),
            ExtractError::MalformedInput(Malformed::NonFinite { index }) => write!(
                f,
                "malformed landmark set: landmark {index} has a non-finite coordinate"
            ),
            ExtractError::MalformedInput(Malformed::NotAList) => {
                f.write_str("malformed landmark set: landmarks are not a list")
            }
            ExtractError::MalformedInput(Malformed::NotNumeric { index }) => write!(
                f,
                "malformed landmark set: landmark {index} is not a list of numbers"
            ),
            ExtractError::InvalidDimensions { width, height } => {
                write!(f, "invalid frame dimensions {width}x{height}")
            }
            ExtractError::UnrecognizedHandLabel(label) => {
                write!(f, "unrecognized hand label '{label}'")
            }
        }
    }
}

impl Error for ExtractError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages() {
        assert_eq!(
            ExtractError::MalformedInput(Malformed::Count { found: 5 }).to_string(),
            "malformed landmark set: expected 21 landmarks, got 5"
        );
        assert_eq!(
            ExtractError::InvalidDimensions {
                width: 0.0,
                height: 480.0
            }
            .to_string(),
            "invalid frame dimensions 0x480"
        );
        assert_eq!(
            ExtractError::InvalidDimensions {
                width: -1.0,
                height: 2.5
            }
            .to_string(),
            "invalid frame dimensions -1x2.5"
        );
        assert_eq!(
            ExtractError::MalformedInput(Malformed::NotNumeric { index: 3 }).to_string(),
            "malformed landmark set: landmark 3 is not a list of numbers"
        );
        assert_eq!(
            ExtractError::UnrecognizedHandLabel("Middle".into()).to_string(),
            "unrecognized hand label 'Middle'"
        );
    }
}
