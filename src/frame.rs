//! Per-frame processing: detected hands in, one output record out.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::ExtractError,
    gesture::{Extractor, FeatureRecord},
    hand::{DetectedHand, Handedness},
    resolution::Resolution,
};

/// Everything the detector reports for one camera frame.
///
/// Any JSON object deserializes into a [`DetectionFrame`]. Missing or non-numeric dimensions are
/// kept as NaN and rejected by [`DetectionFrame::resolution`], and each hand is validated on its
/// own, so a frame object always yields exactly one [`FrameRecord`]. Only values that are not
/// objects fail to deserialize.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub struct DetectionFrame {
    pub width: f64,
    pub height: f64,
    pub hands: Vec<DetectedHand>,
}

impl DetectionFrame {
    pub fn new(resolution: Resolution, hands: Vec<DetectedHand>) -> Self {
        Self {
            width: resolution.width().into(),
            height: resolution.height().into(),
            hands,
        }
    }

    /// Returns the frame size, if both dimensions are positive integers.
    pub fn resolution(&self) -> Result<Resolution, ExtractError> {
        fn dimension(value: f64) -> Option<u32> {
            (value >= 1.0 && value <= f64::from(u32::MAX) && value.fract() == 0.0)
                .then_some(value as u32)
        }

        match (dimension(self.width), dimension(self.height)) {
            (Some(width), Some(height)) => Ok(Resolution::new(width, height)),
            _ => Err(ExtractError::InvalidDimensions {
                width: self.width,
                height: self.height,
            }),
        }
    }

    /// Runs [`process_frame`] over this frame's hands.
    ///
    /// With invalid dimensions, every hand is dropped with [`ExtractError::InvalidDimensions`]
    /// and the record is empty.
    pub fn process(&self, extractor: &Extractor) -> ProcessedFrame {
        match self.resolution() {
            Ok(resolution) => process_frame(extractor, &self.hands, resolution),
            Err(e) => {
                if !self.hands.is_empty() {
                    log::warn!("dropping {} hands: {e}", self.hands.len());
                }
                ProcessedFrame {
                    record: FrameRecord::default(),
                    dropped: vec![e; self.hands.len()],
                }
            }
        }
    }
}

impl TryFrom<Value> for DetectionFrame {
    type Error = &'static str;

    fn try_from(frame: Value) -> Result<Self, Self::Error> {
        let Value::Object(mut fields) = frame else {
            return Err("expected a detection frame object");
        };
        let dimension = |value: Option<&Value>| value.and_then(Value::as_f64).unwrap_or(f64::NAN);
        let width = dimension(fields.get("width"));
        let height = dimension(fields.get("height"));
        let hands = match fields.remove("hands") {
            Some(Value::Array(hands)) => hands.into_iter().map(DetectedHand::from).collect(),
            None | Some(Value::Null) => Vec::new(),
            // Reported as one broken hand, so it gets logged and counted.
            Some(other) => vec![DetectedHand::from(other)],
        };
        Ok(Self {
            width,
            height,
            hands,
        })
    }
}

/// The message sent to the listener for every processed frame.
///
/// Serializes as `{"left": <record|null>, "right": <record|null>}`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FrameRecord {
    pub left: Option<FeatureRecord>,
    pub right: Option<FeatureRecord>,
}

impl FrameRecord {
    pub fn get(&self, side: Handedness) -> Option<&FeatureRecord> {
        match side {
            Handedness::Left => self.left.as_ref(),
            Handedness::Right => self.right.as_ref(),
        }
    }

    fn slot_mut(&mut self, side: Handedness) -> &mut Option<FeatureRecord> {
        match side {
            Handedness::Left => &mut self.left,
            Handedness::Right => &mut self.right,
        }
    }

    /// Returns the populated hands, left first.
    pub fn hands(&self) -> impl Iterator<Item = (Handedness, &FeatureRecord)> + '_ {
        [Handedness::Left, Handedness::Right]
            .into_iter()
            .filter_map(|side| self.get(side).map(|rec| (side, rec)))
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }
}

/// Result of [`process_frame`]: the frame record plus how many hands had to be dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedFrame {
    pub record: FrameRecord,
    pub dropped: Vec<ExtractError>,
}

/// Extracts features for every detected hand and assembles the frame record.
///
/// Hands that fail (unknown label, malformed landmarks, bad frame size) are dropped with a
/// warning. The remaining hands are still processed. If the detector reports the same side more
/// than once, the last hand wins.
pub fn process_frame(
    extractor: &Extractor,
    hands: &[DetectedHand],
    resolution: Resolution,
) -> ProcessedFrame {
    let mut record = FrameRecord::default();
    let mut dropped = Vec::new();

    for (i, hand) in hands.iter().enumerate() {
        let result = hand.handedness().and_then(|side| {
            let coords = hand.coords()?;
            extractor
                .extract(&coords, resolution)
                .map(|features| (side, features))
        });
        match result {
            Ok((side, features)) => {
                let slot = record.slot_mut(side);
                if slot.is_some() {
                    log::debug!("hand {i} overwrites an earlier {side} hand in the same frame");
                }
                *slot = Some(features);
            }
            Err(e) => {
                log::warn!("dropping hand {i} ({}): {e}", hand.label);
                dropped.push(e);
            }
        }
    }

    ProcessedFrame { record, dropped }
}
