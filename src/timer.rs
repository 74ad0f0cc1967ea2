//! Frame rate and timing statistics.

use std::{
    fmt,
    time::{Duration, Instant},
};

/// Accumulates how long an operation takes, averaged over a reporting window.
///
/// Displaying the timer with `{}` prints the average and resets it.
pub struct Timer {
    name: &'static str,
    total: Duration,
    count: u32,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            total: Duration::ZERO,
            count: 0,
        }
    }

    /// Invokes a closure, measuring and recording the time it takes.
    pub fn time<T>(&mut self, timee: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let result = timee();
        self.record(start.elapsed());
        result
    }

    pub fn record(&mut self, duration: Duration) {
        self.total += duration;
        self.count += 1;
    }

    fn take_average(&mut self) -> Option<(u32, Duration)> {
        if self.count == 0 {
            return None;
        }
        let avg = self.total / self.count;
        let count = std::mem::replace(&mut self.count, 0);
        self.total = Duration::ZERO;
        Some((count, avg))
    }

    /// Returns a displayable snapshot of the average and resets the timer.
    pub fn report(&mut self) -> TimerReport {
        TimerReport {
            name: self.name,
            avg: self.take_average(),
        }
    }
}

/// Average duration reported by [`Timer::report`].
pub struct TimerReport {
    name: &'static str,
    avg: Option<(u32, Duration)>,
}

impl fmt::Display for TimerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.avg {
            Some((count, avg)) => write!(
                f,
                "{}: {count}x{:.02}ms",
                self.name,
                avg.as_secs_f32() * 1000.0
            ),
            None => write!(f, "{}: -", self.name),
        }
    }
}

/// Logs frames per second with optional extra data.
pub struct FpsCounter {
    name: String,
    frames: u32,
    start: Instant,
}

impl FpsCounter {
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            frames: 0,
            start: Instant::now(),
        }
    }

    /// Advances the frame counter by 1. If one second has passed, logs FPS along with the string
    /// returned by `extra`.
    ///
    /// `extra` is only invoked when a line is actually logged, so timers it reports on are reset
    /// once per second.
    pub fn tick_with<F: FnOnce() -> String>(&mut self, extra: F) {
        self.frames += 1;
        if self.start.elapsed() > Duration::from_secs(1) {
            let extra = extra();
            if extra.is_empty() {
                log::debug!("{}: {} FPS", self.name, self.frames);
            } else {
                log::debug!("{}: {} FPS ({})", self.name, self.frames, extra);
            }

            self.frames = 0;
            self.start = Instant::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_reports_average_and_resets() {
        let mut timer = Timer::new("extract");
        assert_eq!(timer.report().to_string(), "extract: -");

        timer.record(Duration::from_millis(2));
        timer.record(Duration::from_millis(4));
        assert_eq!(timer.report().to_string(), "extract: 2x3.00ms");
        assert_eq!(timer.report().to_string(), "extract: -");

        assert_eq!(timer.time(|| 7), 7);
        assert!(timer.report().to_string().starts_with("extract: 1x"));
    }

    #[test]
    fn fps_extra_is_lazy() {
        let mut fps = FpsCounter::new("test");
        let mut called = false;
        fps.tick_with(|| {
            called = true;
            String::new()
        });
        assert!(!called);
    }
}
