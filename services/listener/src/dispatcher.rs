//! Command Dispatcher
//!
//! Maps each [`Action`] to a handler that drives the capabilities and builds
//! the reply. Nothing a handler does, including panicking, escapes
//! [`Dispatcher::execute`]: every failure becomes an error `Response`.

use crate::{
    capability::{Actuators, CapabilityError},
    capture::CaptureLoop,
};
use futures_util::FutureExt;
use serde_json::{Map, Value};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tutor_core::envelope::{Action, Command, DEFAULT_LISTEN_TIMEOUT_SECS, Response};

pub const UNKNOWN_ACTION: &str = "Unknown action";

#[derive(Debug, thiserror::Error)]
enum HandlerError {
    #[error("Missing field '{0}'")]
    MissingField(&'static str),
    #[error("Invalid field '{0}': {1}")]
    InvalidField(&'static str, String),
    #[error("Behavior '{0}' is not installed on the robot.")]
    BehaviorNotInstalled(String),
    #[error(transparent)]
    Capability(#[from] CapabilityError),
}

pub struct Dispatcher {
    actuators: Arc<dyn Actuators>,
    capture: CaptureLoop,
}

impl Dispatcher {
    pub fn new(actuators: Arc<dyn Actuators>, capture: CaptureLoop) -> Self {
        Self { actuators, capture }
    }

    /// Executes one command and always produces a response.
    pub async fn execute(&self, command: &Command) -> Response {
        info!(action = %command.action, data = ?command.data, "Received command");

        let outcome = AssertUnwindSafe(self.dispatch(command)).catch_unwind().await;
        match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(e @ HandlerError::BehaviorNotInstalled(_))) => {
                warn!(error = %e, "Animation request rejected");
                Response::error(e.to_string())
            }
            Ok(Err(e)) => {
                let message = format!("Error executing action '{}': {}", command.action, e);
                error!("{}", message);
                Response::error(message)
            }
            Err(panic) => {
                let message = format!(
                    "Error executing action '{}': handler panicked: {}",
                    command.action,
                    panic_message(panic.as_ref())
                );
                error!("{}", message);
                Response::error(message)
            }
        }
    }

    async fn dispatch(&self, command: &Command) -> Result<Response, HandlerError> {
        let data = &command.data;
        match &command.action {
            Action::Ping => Ok(Response::ok(&command.action)),
            Action::Say => {
                let text = required_str(data, "text")?;
                self.actuators.say(text).await?;
                Ok(Response::ok(&command.action))
            }
            Action::PlayAnimation => {
                let name = required_str(data, "name")?;
                if !self.actuators.is_behavior_installed(name).await? {
                    return Err(HandlerError::BehaviorNotInstalled(name.to_string()));
                }
                self.actuators.run_behavior(name).await?;
                Ok(Response::ok(&command.action))
            }
            Action::ShowImage => {
                let url = required_str(data, "url")?;
                if let Err(e) = self.actuators.show_image(url).await {
                    warn!(error = %e, url, "Display failed; continuing without the image");
                }
                Ok(Response::ok(&command.action))
            }
            Action::Rest => {
                self.actuators.rest().await?;
                Ok(Response::ok(&command.action))
            }
            Action::Listen => {
                let vocabulary = vocabulary(data)?;
                let timeout = listen_timeout(data)?;
                let word = self.capture.capture(&vocabulary, timeout).await?;
                Ok(Response::listened(word))
            }
            Action::Unknown(name) => {
                warn!(action = %name, "Rejecting unknown action");
                Ok(Response::error(UNKNOWN_ACTION))
            }
        }
    }
}

fn required_str<'a>(data: &'a Map<String, Value>, field: &'static str) -> Result<&'a str, HandlerError> {
    match data.get(field) {
        None | Some(Value::Null) => Err(HandlerError::MissingField(field)),
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(HandlerError::InvalidField(field, format!("expected a string, got {}", other))),
    }
}

fn vocabulary(data: &Map<String, Value>) -> Result<Vec<String>, HandlerError> {
    match data.get("vocabulary") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| HandlerError::InvalidField("vocabulary", format!("{} is not a string", item)))
            })
            .collect(),
        Some(other) => Err(HandlerError::InvalidField(
            "vocabulary",
            format!("expected a list of strings, got {}", other),
        )),
    }
}

fn listen_timeout(data: &Map<String, Value>) -> Result<Duration, HandlerError> {
    let secs = match data.get("timeout") {
        None | Some(Value::Null) => DEFAULT_LISTEN_TIMEOUT_SECS,
        Some(value) => value
            .as_f64()
            .ok_or_else(|| HandlerError::InvalidField("timeout", format!("{} is not a number of seconds", value)))?,
    };
    Duration::try_from_secs_f64(secs)
        .map_err(|e| HandlerError::InvalidField("timeout", format!("{} seconds: {}", secs, e)))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
