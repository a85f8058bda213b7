//! Defines the command envelope exchanged between the brain and the listener.
//!
//! Requests and replies are plain JSON objects. The transport never looks
//! inside `data`; field extraction and defaulting belong to the dispatcher.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;
use std::time::Duration;

/// Default capture window for `listen` when `data.timeout` is absent.
pub const DEFAULT_LISTEN_TIMEOUT_SECS: f64 = 10.0;

/// The operation a [`Command`] asks the listener to perform.
///
/// Any action name outside the known set deserializes to `Unknown` so the
/// dispatcher can answer it instead of the transport rejecting the frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Action {
    Ping,
    Say,
    PlayAnimation,
    ShowImage,
    Listen,
    Rest,
    Unknown(String),
}

impl Action {
    pub fn as_str(&self) -> &str {
        match self {
            Action::Ping => "ping",
            Action::Say => "say",
            Action::PlayAnimation => "play_animation",
            Action::ShowImage => "show_image",
            Action::Listen => "listen",
            Action::Rest => "rest",
            Action::Unknown(name) => name,
        }
    }
}

impl From<String> for Action {
    fn from(name: String) -> Self {
        match name.as_str() {
            "ping" => Action::Ping,
            "say" => Action::Say,
            "play_animation" => Action::PlayAnimation,
            "show_image" => Action::ShowImage,
            "listen" => Action::Listen,
            "rest" => Action::Rest,
            _ => Action::Unknown(name),
        }
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        action.as_str().to_string()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request sent from the brain to the listener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub action: Action,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl Command {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            data: Map::new(),
        }
    }

    /// Builds a command whose `data` is the given JSON object.
    ///
    /// Non-object values are ignored and leave `data` empty.
    pub fn with_data(action: Action, data: Value) -> Self {
        let data = match data {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self { action, data }
    }

    pub fn ping() -> Self {
        Self::new(Action::Ping)
    }

    pub fn say(text: &str) -> Self {
        Self::with_data(Action::Say, json!({ "text": text }))
    }

    pub fn play_animation(name: &str) -> Self {
        Self::with_data(Action::PlayAnimation, json!({ "name": name }))
    }

    pub fn show_image(url: &str) -> Self {
        Self::with_data(Action::ShowImage, json!({ "url": url }))
    }

    pub fn listen(vocabulary: &[String], timeout: Duration) -> Self {
        Self::with_data(
            Action::Listen,
            json!({ "vocabulary": vocabulary, "timeout": timeout.as_secs_f64() }),
        )
    }

    pub fn rest() -> Self {
        Self::new(Action::Rest)
    }

    /// The capture window a `listen` command carries, or `None` for any
    /// other action. Falls back to the default when `timeout` is absent or
    /// not a usable number of seconds.
    pub fn listen_window(&self) -> Option<Duration> {
        if self.action != Action::Listen {
            return None;
        }
        let window = self
            .data
            .get("timeout")
            .and_then(Value::as_f64)
            .and_then(|s| Duration::try_from_secs_f64(s).ok())
            .unwrap_or(Duration::from_secs_f64(DEFAULT_LISTEN_TIMEOUT_SECS));
        Some(window)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Error,
}

/// A reply sent from the listener to the brain.
///
/// Failures of every kind (transport, protocol, capability) travel as a
/// `Response` with `status: error`, so callers have a single error path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

impl Response {
    pub fn ok(action: &Action) -> Self {
        Self {
            status: Status::Ok,
            action: Some(action.to_string()),
            message: None,
            result: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            action: None,
            message: Some(message.into()),
            result: None,
        }
    }

    /// The reply to a `listen` command; an empty `word` means the deadline
    /// passed without an accepted sample.
    pub fn listened(word: impl Into<String>) -> Self {
        Self {
            result: Some(word.into()),
            ..Self::ok(&Action::Listen)
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    /// The recognized word carried by a `listen` reply, or `""`.
    pub fn heard(&self) -> &str {
        self.result.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_wire_shape() {
        let cmd = Command::say("hello");
        let value = serde_json::to_value(&cmd).unwrap();
        assert_eq!(value, json!({ "action": "say", "data": { "text": "hello" } }));
    }

    #[test]
    fn test_unknown_action_is_not_a_decode_failure() {
        let cmd: Command = serde_json::from_str(r#"{"action":"dance","data":{}}"#).unwrap();
        assert_eq!(cmd.action, Action::Unknown("dance".to_string()));
    }

    #[test]
    fn test_missing_action_is_rejected() {
        let err = serde_json::from_str::<Command>(r#"{"data":{}}"#).unwrap_err();
        assert!(err.to_string().contains("action"));
    }

    #[test]
    fn test_missing_data_defaults_to_empty() {
        let cmd: Command = serde_json::from_str(r#"{"action":"rest"}"#).unwrap();
        assert_eq!(cmd.action, Action::Rest);
        assert!(cmd.data.is_empty());
    }

    #[test]
    fn test_error_response_omits_absent_fields() {
        let json = serde_json::to_value(Response::error("Unknown action")).unwrap();
        assert_eq!(json, json!({ "status": "error", "message": "Unknown action" }));
    }

    #[test]
    fn test_listen_response_carries_result() {
        let json = serde_json::to_value(Response::listened("cat")).unwrap();
        assert_eq!(
            json,
            json!({ "status": "ok", "action": "listen", "result": "cat" })
        );
        assert_eq!(Response::listened("").heard(), "");
    }

    #[test]
    fn test_listen_window_defaults_and_overrides() {
        let vocab = vec!["cat".to_string()];
        let cmd = Command::listen(&vocab, Duration::from_secs(15));
        assert_eq!(cmd.listen_window(), Some(Duration::from_secs(15)));

        let bare = Command::new(Action::Listen);
        assert_eq!(bare.listen_window(), Some(Duration::from_secs(10)));

        assert_eq!(Command::ping().listen_window(), None);
    }

    #[test]
    fn test_listen_window_ignores_unrepresentable_timeouts() {
        for timeout in [json!(1e30), json!(-1), json!("soon")] {
            let cmd = Command::with_data(Action::Listen, json!({ "vocabulary": ["cat"], "timeout": timeout }));
            assert_eq!(cmd.listen_window(), Some(Duration::from_secs(10)), "{}", timeout);
        }
    }
}
