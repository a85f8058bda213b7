//! Capability contracts for the robot hardware.
//!
//! The dispatcher never talks to hardware directly; it goes through these
//! traits so the same serving loop can drive a real robot bridge or the
//! desktop simulator.

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CapabilityError {
    #[error("{0} capability is unavailable")]
    Unavailable(&'static str),
    #[error("{0}")]
    Failed(String),
}

/// Speech, motion, behaviors and the display surface.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Actuators: Send + Sync {
    /// Speaks `text` aloud. Returns once the utterance has been queued.
    async fn say(&self, text: &str) -> Result<(), CapabilityError>;

    async fn is_behavior_installed(&self, name: &str) -> Result<bool, CapabilityError>;

    /// Starts an installed behavior without waiting for it to finish.
    async fn run_behavior(&self, name: &str) -> Result<(), CapabilityError>;

    async fn show_image(&self, url: &str) -> Result<(), CapabilityError>;

    /// Moves the robot into its safe resting pose.
    async fn rest(&self) -> Result<(), CapabilityError>;
}

/// Continuous word recognition.
///
/// While enabled, a recognizer publishes every word it hears from the
/// current vocabulary into the `RecognitionSlot` it was built with.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn set_vocabulary(&self, vocabulary: &[String]) -> Result<(), CapabilityError>;

    async fn set_enabled(&self, enabled: bool) -> Result<(), CapabilityError>;
}
