//! Capture Loop
//!
//! Turns the recognizer's continuous stream of words into one discrete
//! "heard this word" or "heard nothing" result per `listen` command.

use crate::{
    capability::{CapabilityError, Recognizer},
    recognition::{RecognitionSample, RecognitionSlot},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::{debug, info, warn};

/// How often the recognition slot is sampled.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A sample is accepted only when its confidence is strictly above this.
pub const CONFIDENCE_THRESHOLD: f32 = 0.4;

pub struct CaptureLoop {
    recognizer: Arc<dyn Recognizer>,
    slot: RecognitionSlot,
    poll_interval: Duration,
    threshold: f32,
}

impl CaptureLoop {
    /// Creates a loop that reads from `slot`, which must be the slot
    /// `recognizer` publishes into.
    pub fn new(recognizer: Arc<dyn Recognizer>, slot: RecognitionSlot) -> Self {
        Self {
            recognizer,
            slot,
            poll_interval: POLL_INTERVAL,
            threshold: CONFIDENCE_THRESHOLD,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Listens for one word out of `vocabulary` until `deadline` elapses.
    ///
    /// Returns the accepted word, or an empty string when nothing acceptable
    /// arrived in time. Recognition is disabled again before returning, even
    /// when nothing was heard.
    pub async fn capture(&self, vocabulary: &[String], deadline: Duration) -> Result<String, CapabilityError> {
        self.recognizer.set_vocabulary(vocabulary).await?;
        self.recognizer.set_enabled(true).await?;
        info!(?vocabulary, timeout = ?deadline, "Listening");

        let heard = self.poll(vocabulary, deadline).await;

        if let Err(e) = self.recognizer.set_enabled(false).await {
            warn!(error = %e, "Failed to disable recognition after capture");
        }

        match &heard {
            Some(sample) => info!(word = %sample.word, confidence = sample.confidence, "Heard"),
            None => info!("Capture deadline passed without an accepted word"),
        }
        Ok(heard.map(|s| s.word).unwrap_or_default())
    }

    async fn poll(&self, vocabulary: &[String], deadline: Duration) -> Option<RecognitionSample> {
        let started = Instant::now();
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let accepted = self.slot.take_if(|sample| {
                sample.confidence > self.threshold
                    && vocabulary.iter().any(|w| w.eq_ignore_ascii_case(&sample.word))
            });
            if accepted.is_some() {
                return accepted;
            }
            if started.elapsed() >= deadline {
                debug!(elapsed = ?started.elapsed(), "Capture deadline reached");
                return None;
            }
        }
    }
}
