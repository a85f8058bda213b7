//! Command Channel
//!
//! A strict request/reply link to the robot listener. Exactly one command is
//! in flight at a time: `send` takes `&mut self` and does not return until a
//! reply arrives or the deadline passes. Every failure is reported as an
//! error [`Response`] rather than a Rust error, so the session controller has
//! a single path to inspect.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{self, Message},
};
use tracing::{debug, error, info};
use tutor_core::envelope::{Command, Response};

/// Message of the synthetic reply produced when the listener does not answer
/// in time.
pub const NO_RESPONSE: &str = "no response from listener";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Failed to connect to listener: {0}")]
    Connect(#[source] tungstenite::Error),
    #[error("Listener connection error: {0}")]
    Transport(#[from] tungstenite::Error),
    #[error("Listener closed the connection")]
    Closed,
    #[error("Failed to encode command: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("Malformed reply from listener: {0}")]
    Malformed(#[source] serde_json::Error),
}

/// Anything that can carry a command to the listener and bring back its reply.
#[async_trait]
pub trait Transport: Send {
    /// Sends one command and waits for its reply. Never fails: transport
    /// problems come back as `{status: error}`.
    async fn send(&mut self, command: Command) -> Response;

    /// Checks that the listener is alive and answering.
    async fn ping(&mut self) -> bool {
        info!("Pinging robot listener to check connection...");
        let alive = self.send(Command::ping()).await.is_ok();
        if alive {
            info!("Ping successful. Listener is alive.");
        } else {
            error!("Ping failed. Listener did not respond correctly.");
        }
        alive
    }
}

/// A WebSocket connection to the listener, opened on first use.
pub struct CommandChannel {
    url: String,
    timeout: Duration,
    stream: Option<WsStream>,
}

impl CommandChannel {
    /// Creates a channel to `url` (e.g. `ws://10.0.0.5:5555/ws`).
    ///
    /// `timeout` bounds each round trip. For `listen` commands the capture
    /// window the command carries is added on top.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
            stream: None,
        }
    }

    async fn round_trip(&mut self, command: &Command) -> Result<Response, ChannelError> {
        if self.stream.is_none() {
            info!(url = %self.url, "Connecting to robot listener...");
            let (ws, _) = connect_async(self.url.as_str())
                .await
                .map_err(ChannelError::Connect)?;
            info!("Connected to robot listener.");
            self.stream = Some(ws);
        }
        let Some(stream) = self.stream.as_mut() else {
            return Err(ChannelError::Closed);
        };

        let payload = serde_json::to_string(command).map_err(ChannelError::Encode)?;
        stream.send(Message::text(payload)).await?;

        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str(text.as_str()).map_err(ChannelError::Malformed);
                }
                Some(Ok(Message::Binary(data))) => {
                    return serde_json::from_slice(&data).map_err(ChannelError::Malformed);
                }
                Some(Ok(Message::Close(_))) | None => return Err(ChannelError::Closed),
                Some(Ok(other)) => debug!(frame = ?other, "Skipping control frame"),
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }
}

#[async_trait]
impl Transport for CommandChannel {
    async fn send(&mut self, command: Command) -> Response {
        let deadline = self
            .timeout
            .saturating_add(command.listen_window().unwrap_or_default());

        let response = match timeout(deadline, self.round_trip(&command)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                // The connection state is unknown after a failure; start fresh.
                self.stream = None;
                error!(action = %command.action, error = %e, "Communication with robot listener failed");
                return Response::error(e.to_string());
            }
            Err(_) => {
                // A late reply must never be read as the answer to the next command.
                self.stream = None;
                error!(
                    action = %command.action,
                    timeout = ?deadline,
                    "No response from robot listener. The listener might be down."
                );
                return Response::error(NO_RESPONSE);
            }
        };

        if !response.is_ok() {
            error!(
                action = %command.action,
                message = response.message.as_deref().unwrap_or_default(),
                "Robot listener reported an error"
            );
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use serde_json::json;
    use tokio_tungstenite::accept_async;
    use tutor_core::envelope::{Action, Status};

    /// Accepts WebSocket clients and answers each text frame with the value
    /// `reply` returns for it after `delay`; `None` means stay silent.
    async fn peer<F>(delay: Duration, reply: F) -> String
    where
        F: Fn(Command) -> Option<String> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((tcp, _)) = listener.accept().await {
                let Ok(mut ws) = accept_async(tcp).await else { continue };
                while let Some(Ok(msg)) = ws.next().await {
                    let Ok(text) = msg.to_text() else { continue };
                    let Ok(command) = serde_json::from_str::<Command>(text) else { continue };
                    if let Some(out) = reply(command) {
                        tokio::time::sleep(delay).await;
                        if ws.send(Message::text(out)).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });
        format!("ws://{}", addr)
    }

    #[tokio::test]
    async fn test_ping_round_trip_returns_echo() {
        let url = peer(Duration::ZERO, |cmd| {
            Some(serde_json::to_string(&Response::ok(&cmd.action)).unwrap())
        })
        .await;
        let mut channel = CommandChannel::new(url, DEFAULT_TIMEOUT);

        let response = channel.send(Command::ping()).await;
        assert_eq!(response, Response::ok(&Action::Ping));
        assert_eq!(response.action.as_deref(), Some("ping"));
        assert!(channel.ping().await);
    }

    #[tokio::test]
    async fn test_silent_peer_times_out_as_data() {
        let url = peer(Duration::ZERO, |_| None).await;
        let mut channel = CommandChannel::new(url, Duration::from_millis(10));

        let started = std::time::Instant::now();
        let response = channel.send(Command::say("hello")).await;
        assert_eq!(response, Response::error(NO_RESPONSE));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_refused_connection_is_an_error_response() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut channel = CommandChannel::new(format!("ws://{}", addr), DEFAULT_TIMEOUT);
        let response = channel.send(Command::ping()).await;
        assert_eq!(response.status, Status::Error);
        assert!(response.message.unwrap().starts_with("Failed to connect"));
        assert!(!channel.ping().await);
    }

    #[tokio::test]
    async fn test_malformed_reply_is_normalized() {
        let url = peer(Duration::ZERO, |_| Some("definitely not json".to_string())).await;
        let mut channel = CommandChannel::new(url, DEFAULT_TIMEOUT);

        let response = channel.send(Command::rest()).await;
        assert_eq!(response.status, Status::Error);
        assert!(response.message.unwrap().starts_with("Malformed reply"));
    }

    #[tokio::test]
    async fn test_listen_deadline_includes_capture_window() {
        let url = peer(Duration::from_millis(150), |cmd| {
            let response = match cmd.action {
                Action::Listen => Response::listened("cat"),
                _ => Response::ok(&cmd.action),
            };
            Some(serde_json::to_string(&response).unwrap())
        })
        .await;
        let mut channel = CommandChannel::new(url, Duration::from_millis(50));

        let vocabulary = vec!["cat".to_string()];
        let response = channel
            .send(Command::listen(&vocabulary, Duration::from_millis(500)))
            .await;
        assert_eq!(response.heard(), "cat");
    }

    #[tokio::test]
    async fn test_oversized_listen_timeout_still_gets_a_reply() {
        let url = peer(Duration::ZERO, |_| {
            Some(serde_json::to_string(&Response::error("Invalid field 'timeout'")).unwrap())
        })
        .await;
        let mut channel = CommandChannel::new(url, Duration::from_millis(10));

        let command = Command::with_data(Action::Listen, json!({ "vocabulary": ["cat"], "timeout": 1e30 }));
        let response = channel.send(command).await;
        assert_eq!(response.status, Status::Error);

        let mut far = CommandChannel::new("ws://127.0.0.1:1", Duration::MAX);
        let silent = far.send(Command::listen(&["cat".to_string()], Duration::from_secs(5))).await;
        assert_eq!(silent.status, Status::Error);
    }

    #[tokio::test]
    async fn test_channel_recovers_after_timeout() {
        let url = peer(Duration::ZERO, |cmd| match cmd.action {
            Action::Say => None,
            _ => Some(serde_json::to_string(&Response::ok(&cmd.action)).unwrap()),
        })
        .await;
        let mut channel = CommandChannel::new(url, Duration::from_millis(50));

        assert_eq!(channel.send(Command::say("hello")).await, Response::error(NO_RESPONSE));
        assert_eq!(channel.send(Command::rest()).await, Response::ok(&Action::Rest));
    }
}
