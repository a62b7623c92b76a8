//! Thread-safe FIFO line queues shared between drain workers and the caller

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// An unbounded queue of text lines.
///
/// Drain workers append from their background tasks while the caller drains
/// from its own thread; a clone shares the underlying queue. Capacity is
/// unbounded: callers producing high-volume output are expected to poll
/// frequently.
#[derive(Debug, Clone, Default)]
pub struct LineBuffer {
    inner: Arc<Mutex<VecDeque<String>>>,
}

impl LineBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one line, preserving arrival order
    pub fn push(&self, line: String) {
        self.lock().push_back(line);
    }

    /// Remove and return every buffered line, oldest first.
    ///
    /// Non-blocking: only lines already enqueued are returned, never lines
    /// still in flight inside a drain worker.
    pub fn drain(&self) -> Vec<String> {
        self.lock().drain(..).collect()
    }

    /// Number of lines currently buffered
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the buffer is currently empty
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<String>> {
        // A drain worker cannot panic while holding the lock, but recover
        // from poisoning anyway rather than propagating a panic to pollers.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
