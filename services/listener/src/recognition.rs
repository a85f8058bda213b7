//! The single-slot blackboard shared between a recognizer and the capture
//! loop.

use std::sync::{Arc, Mutex, MutexGuard};

/// One word reported by the recognizer.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionSample {
    pub word: String,
    pub confidence: f32,
}

impl RecognitionSample {
    pub fn new(word: impl Into<String>, confidence: f32) -> Self {
        Self {
            word: word.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// Holds the most recent sample. A newer sample overwrites an older one;
/// the capture loop takes a sample out, leaving the slot empty.
#[derive(Debug, Clone, Default)]
pub struct RecognitionSlot {
    inner: Arc<Mutex<Option<RecognitionSample>>>,
}

impl RecognitionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, sample: RecognitionSample) {
        *self.lock() = Some(sample);
    }

    /// Removes and returns the current sample if `accept` approves it.
    /// Rejected samples stay in place.
    pub fn take_if(&self, accept: impl FnOnce(&RecognitionSample) -> bool) -> Option<RecognitionSample> {
        let mut slot = self.lock();
        if slot.as_ref().is_some_and(accept) {
            slot.take()
        } else {
            None
        }
    }

    pub fn peek(&self) -> Option<RecognitionSample> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Option<RecognitionSample>> {
        // A writer that panicked mid-update can only have left a whole
        // `Option` behind, so the poisoned value is still usable.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
