//! Bounded frame queue with a drop-oldest policy.
//!
//! The capture loop must never wait for a slow listener. When the queue is full, publishing a new
//! frame evicts the oldest queued one instead of blocking, so the listener always receives the
//! freshest data available.

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TrySendError};

/// Creates a connected [`FramePublisher`] / [`FrameSubscriber`] pair.
///
/// # Panics
///
/// Panics if `capacity` is 0.
pub fn frame_queue<T>(capacity: usize) -> (FramePublisher<T>, FrameSubscriber<T>) {
    assert!(capacity > 0, "frame queue capacity must be nonzero");
    let (sender, recv) = channel::bounded(capacity);
    let closed = Arc::new(AtomicBool::new(false));
    (
        FramePublisher {
            sender,
            evict: recv.clone(),
            closed: closed.clone(),
            evicted: 0,
        },
        FrameSubscriber { recv, closed },
    )
}

/// The producing half of a frame queue.
pub struct FramePublisher<T> {
    sender: Sender<T>,
    /// Used to pop the oldest entry when the queue is full.
    evict: Receiver<T>,
    closed: Arc<AtomicBool>,
    evicted: u64,
}

impl<T> FramePublisher<T> {
    /// Enqueues `value`, evicting the oldest queued value if the queue is full.
    ///
    /// This never blocks. It fails once the [`FrameSubscriber`] has been dropped.
    pub fn publish(&mut self, value: T) -> Result<(), QueueClosed> {
        if self.closed.load(Ordering::Acquire) {
            return Err(QueueClosed);
        }

        let mut value = value;
        loop {
            match self.sender.try_send(value) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Full(v)) => {
                    // The subscriber may have taken an entry in the meantime, in which case
                    // nothing is evicted and the retry succeeds.
                    if self.evict.try_recv().is_ok() {
                        self.evicted += 1;
                        log::trace!("frame queue full, evicted oldest frame");
                    }
                    value = v;
                }
                Err(TrySendError::Disconnected(_)) => return Err(QueueClosed),
            }
        }
    }

    /// Total number of values evicted so far.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}

/// The consuming half of a frame queue.
pub struct FrameSubscriber<T> {
    recv: Receiver<T>,
    closed: Arc<AtomicBool>,
}

impl<T> FrameSubscriber<T> {
    /// Waits up to `timeout` for the next value.
    ///
    /// Returns [`RecvTimeoutError::Disconnected`] once the publisher is gone and the queue has been
    /// drained.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<T, RecvTimeoutError> {
        self.recv.recv_timeout(timeout)
    }

    #[cfg(test)]
    pub(crate) fn try_recv(&self) -> Option<T> {
        self.recv.try_recv().ok()
    }
}

impl<T> Drop for FrameSubscriber<T> {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// Error returned by [`FramePublisher::publish`] when the subscriber has been dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueClosed;

impl fmt::Display for QueueClosed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("frame queue subscriber has been dropped")
    }
}

impl std::error::Error for QueueClosed {}
