//! Desktop stand-ins for the robot capabilities.
//!
//! Speech, motion and the display are logged. Recognized words are typed on
//! stdin, one per line, optionally followed by a confidence score:
//!
//! ```text
//! cat
//! skip 0.35
//! ```

use crate::{
    capability::{Actuators, CapabilityError, Recognizer},
    recognition::{RecognitionSample, RecognitionSlot},
};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub struct SimulatedActuators {
    installed_behaviors: HashSet<String>,
    display_available: bool,
}

impl SimulatedActuators {
    pub fn new(installed_behaviors: impl IntoIterator<Item = String>, display_available: bool) -> Self {
        Self {
            installed_behaviors: installed_behaviors.into_iter().collect(),
            display_available,
        }
    }
}

#[async_trait]
impl Actuators for SimulatedActuators {
    async fn say(&self, text: &str) -> Result<(), CapabilityError> {
        info!(target: "robot", "ROBOT SAYS: {}", text);
        Ok(())
    }

    async fn is_behavior_installed(&self, name: &str) -> Result<bool, CapabilityError> {
        Ok(self.installed_behaviors.contains(name))
    }

    async fn run_behavior(&self, name: &str) -> Result<(), CapabilityError> {
        info!(target: "robot", "ROBOT ANIMATES: {}", name);
        Ok(())
    }

    async fn show_image(&self, url: &str) -> Result<(), CapabilityError> {
        if !self.display_available {
            return Err(CapabilityError::Unavailable("display"));
        }
        info!(target: "robot", "ROBOT TABLET: {}", url);
        Ok(())
    }

    async fn rest(&self) -> Result<(), CapabilityError> {
        info!(target: "robot", "ROBOT RESTS");
        Ok(())
    }
}

/// A recognizer fed by [`SimulatedRecognizer::hear`].
///
/// Words are only published while recognition is enabled and only when they
/// belong to the current vocabulary, as a constrained speech engine would.
pub struct SimulatedRecognizer {
    slot: RecognitionSlot,
    vocabulary: Mutex<Vec<String>>,
    enabled: AtomicBool,
}

impl SimulatedRecognizer {
    pub fn new(slot: RecognitionSlot) -> Self {
        Self {
            slot,
            vocabulary: Mutex::new(Vec::new()),
            enabled: AtomicBool::new(false),
        }
    }

    /// Reports a word as if the microphone had picked it up. Returns whether
    /// the word reached the recognition slot.
    pub fn hear(&self, word: &str, confidence: f32) -> bool {
        if !self.enabled.load(Ordering::SeqCst) {
            debug!(word, "Recognition disabled; ignoring word");
            return false;
        }
        let known = self
            .vocabulary
            .lock()
            .map(|v| v.iter().any(|w| w.eq_ignore_ascii_case(word)))
            .unwrap_or(false);
        if !known {
            debug!(word, "Word outside the current vocabulary; ignoring");
            return false;
        }
        self.slot.publish(RecognitionSample::new(word, confidence));
        true
    }
}

#[async_trait]
impl Recognizer for SimulatedRecognizer {
    async fn set_vocabulary(&self, vocabulary: &[String]) -> Result<(), CapabilityError> {
        let mut current = self
            .vocabulary
            .lock()
            .map_err(|_| CapabilityError::Failed("vocabulary lock poisoned".to_string()))?;
        *current = vocabulary.to_vec();
        Ok(())
    }

    async fn set_enabled(&self, enabled: bool) -> Result<(), CapabilityError> {
        self.enabled.store(enabled, Ordering::SeqCst);
        Ok(())
    }
}

/// Parses one stdin line into a word and a confidence (default 1.0).
pub fn parse_utterance(line: &str) -> Option<(String, f32)> {
    let mut parts = line.split_whitespace();
    let word = parts.next()?.to_string();
    let confidence = match parts.next() {
        Some(raw) => raw.parse::<f32>().ok()?,
        None => 1.0,
    };
    Some((word, confidence))
}

/// Spawns a task that forwards stdin lines to `recognizer` until stdin closes.
pub fn spawn_stdin_feeder(recognizer: Arc<SimulatedRecognizer>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => match parse_utterance(&line) {
                    Some((word, confidence)) => {
                        if !recognizer.hear(&word, confidence) {
                            warn!(word = %word, "Typed word was not recognized");
                        }
                    }
                    None if line.trim().is_empty() => {}
                    None => warn!(line = %line, "Expected `<word> [confidence]`"),
                },
                Ok(None) => {
                    info!("Stdin closed; simulated microphone is off.");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read stdin");
                    break;
                }
            }
        }
    })
}
