use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Accumulates streamed text fragments for a single in-flight response.
///
/// Clones share the same buffer: the request task holds one clone and
/// appends, the renderer holds another and reads. Both sides go through
/// one mutex so a reader never observes a half-applied fragment.
#[derive(Debug, Clone, Default)]
pub struct TokenSink {
    buffer: Arc<Mutex<String>>,
}

impl TokenSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Concatenate a fragment onto the buffer. Empty fragments are accepted.
    pub fn append(&self, fragment: &str) {
        self.lock().push_str(fragment);
    }

    /// Snapshot of everything appended so far.
    pub fn current(&self) -> String {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic while holding the lock can only leave a fully appended string behind.
    fn lock(&self) -> MutexGuard<'_, String> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
