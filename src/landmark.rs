//! Hand landmark sets, as reported by the upstream detector.

use std::fmt;

use nalgebra::Point2;

use crate::error::{ExtractError, Malformed};

/// Number of landmarks in a hand landmark set.
pub const NUM_LANDMARKS: usize = 21;

/// Names for the hand pose landmarks.
///
/// # Terminology
///
/// - **CMC**: [Carpometacarpal joint], the lowest joint of the thumb, located near the wrist.
/// - **MCP**: [Metacarpophalangeal joint], the lower joint forming the knuckles near the palm of
///   the hand.
/// - **PIP**: Proximal Interphalangeal joint, the joint between the MCP and DIP.
/// - **DIP**: Distal Interphalangeal joint, the highest joint of a finger.
/// - **Tip**: This landmark is just placed on the tip of the finger, above the DIP.
///
/// [Carpometacarpal joint]: https://en.wikipedia.org/wiki/Carpometacarpal_joint
/// [Metacarpophalangeal joint]: https://en.wikipedia.org/wiki/Metacarpophalangeal_joint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkIdx {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexFingerMcp,
    IndexFingerPip,
    IndexFingerDip,
    IndexFingerTip,
    MiddleFingerMcp,
    MiddleFingerPip,
    MiddleFingerDip,
    MiddleFingerTip,
    RingFingerMcp,
    RingFingerPip,
    RingFingerDip,
    RingFingerTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

/// The 21 landmarks of one detected hand, in the detector's pixel coordinates.
///
/// Image coordinates have their origin in the top left corner, so a *smaller* Y value is visually
/// *higher* up.
#[derive(Clone, PartialEq)]
pub struct LandmarkSet {
    points: [Point2<f32>; NUM_LANDMARKS],
}

impl LandmarkSet {
    /// Builds a landmark set from raw detector coordinates.
    ///
    /// Every entry in `coords` must hold `[x, y]` or `[x, y, z]`. The Z coordinate is accepted
    /// and discarded. Exactly [`NUM_LANDMARKS`] entries are required.
    pub fn from_coords<P: AsRef<[f32]>>(coords: &[P]) -> Result<Self, ExtractError> {
        if coords.len() != NUM_LANDMARKS {
            return Err(ExtractError::MalformedInput(Malformed::Count {
                found: coords.len(),
            }));
        }

        let mut points = [Point2::origin(); NUM_LANDMARKS];
        for (index, (coord, out)) in coords.iter().zip(&mut points).enumerate() {
            let coord = coord.as_ref();
            let (x, y) = match *coord {
                [x, y] | [x, y, _] => (x, y),
                _ => {
                    return Err(ExtractError::MalformedInput(Malformed::Shape {
                        index,
                        len: coord.len(),
                    }))
                }
            };
            if !x.is_finite() || !y.is_finite() {
                return Err(ExtractError::MalformedInput(Malformed::NonFinite { index }));
            }
            *out = Point2::new(x, y);
        }

        Ok(Self { points })
    }

    /// Returns the position of a single landmark.
    #[inline]
    pub fn get(&self, idx: LandmarkIdx) -> Point2<f32> {
        self.points[idx as usize]
    }

    /// Euclidean distance between two landmarks.
    pub fn distance(&self, a: LandmarkIdx, b: LandmarkIdx) -> f32 {
        nalgebra::distance(&self.get(a), &self.get(b))
    }

    /// Returns a copy of `self` with every coordinate multiplied by `factor`.
    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            points: self.points.map(|p| p * factor),
        }
    }
}

impl fmt::Debug for LandmarkSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.points.iter().map(|p| [p.x, p.y]))
            .finish()
    }
}
