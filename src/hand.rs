//! Hands as reported by the upstream detector.

use std::{fmt, str::FromStr};

use serde::Deserialize;
use serde_json::Value;

use crate::error::{ExtractError, Malformed};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    /// Returns the lowercase name of this side, as used for the output record keys.
    pub fn as_str(self) -> &'static str {
        match self {
            Handedness::Left => "left",
            Handedness::Right => "right",
        }
    }
}

impl fmt::Display for Handedness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses a detector label.
///
/// Labels are compared case-insensitively, so both `left` and the `Left` emitted by most
/// MediaPipe wrappers are accepted.
impl FromStr for Handedness {
    type Err = ExtractError;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        if label.eq_ignore_ascii_case("left") {
            Ok(Handedness::Left)
        } else if label.eq_ignore_ascii_case("right") {
            Ok(Handedness::Right)
        } else {
            Err(ExtractError::UnrecognizedHandLabel(label.to_string()))
        }
    }
}

/// One hand in a detection frame, before validation.
///
/// Both fields are kept as raw JSON so that a hand with a broken label or landmark list is
/// rejected on its own, by [`DetectedHand::handedness`] or [`DetectedHand::coords`], instead of
/// failing the whole frame. Any JSON value deserializes into a [`DetectedHand`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "Value")]
pub struct DetectedHand {
    /// Side label assigned by the detector (`label` or `type`).
    pub label: Value,
    /// Landmark coordinates, `[x, y]` or `[x, y, z]` in pixels (`landmarks` or `lmList`).
    pub landmarks: Value,
}

impl DetectedHand {
    pub fn new<P: AsRef<[f32]>>(label: impl Into<String>, landmarks: &[P]) -> Self {
        let landmarks: Vec<Vec<f32>> = landmarks.iter().map(|p| p.as_ref().to_vec()).collect();
        Self {
            label: Value::String(label.into()),
            landmarks: landmarks.into(),
        }
    }

    /// Parses the detector's label into a [`Handedness`].
    pub fn handedness(&self) -> Result<Handedness, ExtractError> {
        match &self.label {
            Value::String(label) => label.parse(),
            other => Err(ExtractError::UnrecognizedHandLabel(other.to_string())),
        }
    }

    /// Reads the landmark list as numeric coordinate lists.
    ///
    /// Only the JSON structure is checked here. The landmark count and the number of coordinates
    /// per landmark are checked by the extractor.
    pub fn coords(&self) -> Result<Vec<Vec<f32>>, ExtractError> {
        let Value::Array(points) = &self.landmarks else {
            return Err(ExtractError::MalformedInput(Malformed::NotAList));
        };
        points
            .iter()
            .enumerate()
            .map(|(index, point)| {
                point
                    .as_array()
                    .and_then(|coords| {
                        coords
                            .iter()
                            .map(|c| c.as_f64().map(|c| c as f32))
                            .collect::<Option<Vec<_>>>()
                    })
                    .ok_or(ExtractError::MalformedInput(Malformed::NotNumeric { index }))
            })
            .collect()
    }
}

impl From<Value> for DetectedHand {
    fn from(hand: Value) -> Self {
        match hand {
            Value::Object(mut fields) => {
                let mut field = |names: [&str; 2]| {
                    names
                        .iter()
                        .find_map(|name| fields.remove(*name))
                        .unwrap_or(Value::Null)
                };
                Self {
                    label: field(["label", "type"]),
                    landmarks: field(["landmarks", "lmList"]),
                }
            }
            other => Self {
                label: Value::Null,
                landmarks: other,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_labels() {
        assert_eq!("Left".parse(), Ok(Handedness::Left));
        assert_eq!("left".parse(), Ok(Handedness::Left));
        assert_eq!("RIGHT".parse(), Ok(Handedness::Right));
        assert_eq!(
            "unknown".parse::<Handedness>(),
            Err(ExtractError::UnrecognizedHandLabel("unknown".into()))
        );
        assert!("".parse::<Handedness>().is_err());
    }

    #[test]
    fn deserialize_cvzone_names() {
        let hand: DetectedHand =
            serde_json::from_str(r#"{"type": "Right", "lmList": [[1, 2, 3], [4.5, 6]]}"#).unwrap();
        assert_eq!(hand.label, "Right");
        assert_eq!(hand.coords(), Ok(vec![vec![1.0, 2.0, 3.0], vec![4.5, 6.0]]));
        assert_eq!(hand.handedness(), Ok(Handedness::Right));
    }

    #[test]
    fn broken_fields_fail_per_hand() {
        let hand = |json: &str| serde_json::from_str::<DetectedHand>(json).unwrap();

        let flat = hand(r#"{"label": "Right", "landmarks": [1, 2, 3]}"#);
        assert_eq!(flat.handedness(), Ok(Handedness::Right));
        assert_eq!(
            flat.coords(),
            Err(ExtractError::MalformedInput(Malformed::NotNumeric { index: 0 }))
        );

        let null = hand(r#"{"label": "Right", "landmarks": [[3, 4], [null, 2]]}"#);
        assert_eq!(
            null.coords(),
            Err(ExtractError::MalformedInput(Malformed::NotNumeric { index: 1 }))
        );

        let numeric_label = hand(r#"{"label": 7, "landmarks": []}"#);
        assert_eq!(
            numeric_label.handedness(),
            Err(ExtractError::UnrecognizedHandLabel("7".into()))
        );
        assert_eq!(numeric_label.coords(), Ok(vec![]));

        let missing = hand("{}");
        assert!(missing.handedness().is_err());
        assert_eq!(
            missing.coords(),
            Err(ExtractError::MalformedInput(Malformed::NotAList))
        );

        let not_an_object = hand(r#""Left""#);
        assert!(not_an_object.handedness().is_err());
        assert!(not_an_object.coords().is_err());
    }

    #[test]
    fn constructed_hands_round_trip() {
        let hand = DetectedHand::new("Left", &[[1.0f32, 2.0], [3.0, 4.5]]);
        assert_eq!(hand.handedness(), Ok(Handedness::Left));
        assert_eq!(hand.coords(), Ok(vec![vec![1.0, 2.0], vec![3.0, 4.5]]));
    }
}
