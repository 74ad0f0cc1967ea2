//! The capture loop: detection frames in, frame records out.

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;

use crate::{
    frame::FrameRecord,
    gesture::Extractor,
    overlay,
    queue::FramePublisher,
    source::HandSource,
    timer::{FpsCounter, Timer},
};

/// Counters collected over one [`Pipeline::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunStats {
    /// Frames read from the source and published.
    pub frames: u64,
    /// Hands that produced a feature record.
    pub hands: u64,
    /// Hands dropped because of an extraction error.
    pub dropped_hands: u64,
    /// Records evicted from the emit queue before the listener got them.
    pub evicted: u64,
}

/// Drives a [`HandSource`], turning every frame into a [`FrameRecord`] for the emitter.
pub struct Pipeline<S> {
    source: S,
    extractor: Extractor,
    display_debug: bool,
    frames: FramePublisher<FrameRecord>,
}

impl<S: HandSource> Pipeline<S> {
    pub fn new(source: S, extractor: Extractor, frames: FramePublisher<FrameRecord>) -> Self {
        Self {
            source,
            extractor,
            display_debug: false,
            frames,
        }
    }

    /// Enables logging of the per-hand debug overlay.
    pub fn display_debug(self, display_debug: bool) -> Self {
        Self {
            display_debug,
            ..self
        }
    }

    /// Processes frames until the source ends or `stop` is set.
    ///
    /// `stop` is checked between frames; a source blocked on input is not interrupted.
    pub fn run(&mut self, stop: &AtomicBool) -> anyhow::Result<RunStats> {
        let mut stats = RunStats::default();
        let mut fps = FpsCounter::new("capture");
        let mut t_extract = Timer::new("extract");

        while !stop.load(Ordering::Relaxed) {
            let Some(frame) = self.source.next_frame()? else {
                log::info!("capture source ended");
                break;
            };

            let extractor = &self.extractor;
            let processed = t_extract.time(|| frame.process(extractor));
            let record = processed.record;
            stats.frames += 1;
            stats.hands += record.hands().count() as u64;
            stats.dropped_hands += processed.dropped.len() as u64;

            log::trace!("frame {}: {:?}", stats.frames, record);
            if self.display_debug {
                overlay::log_overlay(&record);
            }

            self.frames
                .publish(record)
                .context("frame emitter is no longer running")?;

            let evicted = self.frames.evicted();
            fps.tick_with(|| format!("{}, {evicted} frames dropped", t_extract.report()));
        }

        if stop.load(Ordering::Relaxed) {
            log::info!("stopped after {} frames", stats.frames);
        }
        stats.evicted = self.frames.evicted();
        Ok(stats)
    }

    /// Consumes the pipeline, returning the source and dropping the publisher.
    ///
    /// Dropping the publisher lets the emitter drain its queue and exit.
    pub fn into_source(self) -> S {
        self.source
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::VecDeque, io::Cursor, time::Duration};

    use crate::{
        frame::DetectionFrame, hand::DetectedHand, landmark::tests::SPLAYED, queue::frame_queue,
        resolution::Resolution, source::JsonLinesSource,
    };

    use super::*;

    struct Scripted(VecDeque<anyhow::Result<Option<DetectionFrame>>>);

    impl HandSource for Scripted {
        fn next_frame(&mut self) -> anyhow::Result<Option<DetectionFrame>> {
            self.0.pop_front().unwrap_or(Ok(None))
        }
    }

    fn frame(hands: Vec<DetectedHand>) -> anyhow::Result<Option<DetectionFrame>> {
        Ok(Some(DetectionFrame::new(Resolution::RES_480P, hands)))
    }

    #[test]
    fn one_record_per_frame() {
        let (publisher, subscriber) = frame_queue(8);
        let source = Scripted(VecDeque::from([
            frame(vec![]),
            frame(vec![DetectedHand::new("Left", &SPLAYED)]),
            frame(vec![
                DetectedHand::new("Right", &SPLAYED),
                DetectedHand::new("Sideways", &SPLAYED),
            ]),
        ]));
        let mut pipeline = Pipeline::new(source, Extractor::default(), publisher);
        let stats = pipeline.run(&AtomicBool::new(false)).unwrap();

        assert_eq!(
            stats,
            RunStats {
                frames: 3,
                hands: 2,
                dropped_hands: 1,
                evicted: 0,
            }
        );

        let records: Vec<_> = std::iter::from_fn(|| subscriber.try_recv()).collect();
        assert_eq!(records.len(), 3);
        assert!(records[0].is_empty());
        assert!(records[1].left.is_some() && records[1].right.is_none());
        assert!(records[2].left.is_none() && records[2].right.is_some());
    }

    #[test]
    fn stop_flag_ends_loop() {
        let (publisher, _subscriber) = frame_queue(1);
        let source = Scripted(VecDeque::from([frame(vec![]), frame(vec![])]));
        let mut pipeline = Pipeline::new(source, Extractor::default(), publisher);
        let stats = pipeline.run(&AtomicBool::new(true)).unwrap();
        assert_eq!(stats.frames, 0);
        assert_eq!(pipeline.into_source().0.len(), 2);
    }

    #[test]
    fn source_error_propagates() {
        let (publisher, _subscriber) = frame_queue(1);
        let source = Scripted(VecDeque::from([
            frame(vec![]),
            Err(anyhow::anyhow!("camera unplugged")),
        ]));
        let mut pipeline = Pipeline::new(source, Extractor::default(), publisher);
        let err = pipeline.run(&AtomicBool::new(false)).unwrap_err();
        assert_eq!(err.to_string(), "camera unplugged");
    }

    #[test]
    fn fails_when_emitter_is_gone() {
        let (publisher, subscriber) = frame_queue(1);
        drop(subscriber);
        let source = Scripted(VecDeque::from([frame(vec![])]));
        let mut pipeline = Pipeline::new(source, Extractor::default(), publisher);
        assert!(pipeline.run(&AtomicBool::new(false)).is_err());
    }

    #[test]
    fn broken_hands_still_emit_one_record_per_line() {
        let left = serde_json::to_string(&SPLAYED).unwrap();
        let lines = [
            r#"{"label": "Right", "landmarks": [1, 2, 3]}"#,
            r#"{"label": "Right", "landmarks": [[null, 2]]}"#,
            r#"{"label": 7, "landmarks": []}"#,
        ]
        .iter()
        .map(|right| {
            format!(
                "{{\"width\": 640, \"height\": 480, \"hands\": [{{\"label\": \"Left\", \"landmarks\": {left}}}, {right}]}}\n"
            )
        })
        .chain([format!(
            "{{\"width\": -1, \"height\": 480, \"hands\": [{{\"label\": \"Left\", \"landmarks\": {left}}}]}}\n"
        )])
        .collect::<String>();

        let (publisher, subscriber) = frame_queue(8);
        let mut pipeline = Pipeline::new(
            JsonLinesSource::new(Cursor::new(lines)),
            Extractor::default(),
            publisher,
        );
        let stats = pipeline.run(&AtomicBool::new(false)).unwrap();
        assert_eq!(stats.frames, 4);
        assert_eq!(stats.hands, 3);
        assert_eq!(stats.dropped_hands, 4);

        let records: Vec<_> = std::iter::from_fn(|| subscriber.try_recv()).collect();
        assert_eq!(records.len(), 4);
        for record in &records[..3] {
            assert!(record.left.is_some() && record.right.is_none());
        }
        assert!(records[3].is_empty());
    }

    #[test]
    fn slow_listener_loses_oldest_frames() {
        let (publisher, subscriber) = frame_queue(2);
        let lines = (0..10)
            .map(|i| format!("{{\"width\": {}, \"height\": 480}}\n", 640 + i))
            .collect::<String>();
        let mut pipeline = Pipeline::new(
            JsonLinesSource::new(Cursor::new(lines)),
            Extractor::default(),
            publisher,
        )
        .display_debug(true);
        let stats = pipeline.run(&AtomicBool::new(false)).unwrap();
        assert_eq!(stats.frames, 10);
        assert_eq!(stats.evicted, 8);
        drop(pipeline);

        let mut remaining = 0;
        while subscriber.recv_timeout(Duration::from_millis(10)).is_ok() {
            remaining += 1;
        }
        assert_eq!(remaining, 2);
    }
}
