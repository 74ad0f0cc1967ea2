//! Text rendering of frame records for debugging.

use std::iter;

use itertools::Itertools;

use crate::{frame::FrameRecord, gesture::FeatureRecord, hand::Handedness};

/// Renders the debug lines for every hand in `record`.
///
/// Each hand gets a title line, then one `name: value` line per finger state and per touch.
pub fn debug_lines(record: &FrameRecord) -> Vec<String> {
    record
        .hands()
        .flat_map(|(side, hand)| hand_lines(side, hand))
        .collect()
}

fn hand_lines(side: Handedness, hand: &FeatureRecord) -> impl Iterator<Item = String> {
    let states = hand.finger_states.entries();
    let touches = hand.touches.entries();
    iter::once(format!("{} Hand", title(side))).chain(
        states
            .into_iter()
            .chain(touches)
            .map(|(name, value)| format!("{name}: {value}")),
    )
}

/// Logs the debug overlay of a frame at info level, one log line per hand.
pub fn log_overlay(record: &FrameRecord) {
    for (side, hand) in record.hands() {
        log::info!(
            "{}, pos ({:.3}, {:.3}), zoom {:.3}, angle {:.1}",
            hand_lines(side, hand).join(", "),
            hand.position.x,
            hand.position.y,
            hand.pseudo_zoom,
            hand.angle,
        );
    }
}

fn title(side: Handedness) -> &'static str {
    match side {
        Handedness::Left => "Left",
        Handedness::Right => "Right",
    }
}

#[cfg(test)]
mod tests {
    use crate::{gesture::extract, landmark::tests::SPLAYED, resolution::Resolution};

    use super::*;

    #[test]
    fn empty_frame_has_no_lines() {
        assert!(debug_lines(&FrameRecord::default()).is_empty());
    }

    #[test]
    fn lines_per_hand() {
        let rec = extract(&SPLAYED, Resolution::RES_480P).unwrap();
        let frame = FrameRecord {
            left: None,
            right: Some(rec),
        };
        let lines = debug_lines(&frame);
        assert_eq!(lines.len(), 1 + 5 + 4);
        assert_eq!(lines[0], "Right Hand");
        assert_eq!(lines[1], "thumb_up: true");
        assert_eq!(lines[6], "pointer_thumb: false");

        let both = FrameRecord {
            left: Some(rec),
            right: Some(rec),
        };
        let lines = debug_lines(&both);
        assert_eq!(lines.len(), 20);
        assert_eq!(lines[0], "Left Hand");
        assert_eq!(lines[10], "Right Hand");
    }
}
