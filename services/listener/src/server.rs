//! Serves commands over a WebSocket, one at a time.
//!
//! Each text frame carries one JSON `Command`; the reply is sent before the
//! next frame is read. All connections share one dispatcher behind an async
//! mutex, so commands from different connections never overlap either.

use crate::dispatcher::Dispatcher;
use axum::{
    Router,
    extract::{
        ConnectInfo, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response as HttpResponse,
    routing::get,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{net::TcpListener, sync::Mutex};
use tracing::{Instrument, debug, error, info, warn};
use tutor_core::envelope::{Command, Response};

/// The shared listener state handed to every connection.
#[derive(Clone)]
pub struct ListenerState {
    pub dispatcher: Arc<Mutex<Dispatcher>>,
}

impl ListenerState {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(Mutex::new(dispatcher)),
        }
    }
}

pub fn create_router(state: Arc<ListenerState>) -> Router {
    Router::new().route("/ws", get(ws_handler)).with_state(state)
}

/// Runs the server on an already bound listener until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: Arc<ListenerState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let app = create_router(state);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
}

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<Arc<ListenerState>>,
) -> HttpResponse {
    let span = tracing::info_span!("brain_connection", %peer);
    ws.on_upgrade(move |socket| handle_socket(socket, state).instrument(span))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<ListenerState>) {
    info!("Brain connected. Waiting for commands...");

    while let Some(msg_result) = socket.recv().await {
        let frame = match msg_result {
            Ok(Message::Text(text)) => text.as_str().to_owned(),
            Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                Ok(text) => text,
                Err(_) => {
                    warn!("Received a non UTF-8 binary frame");
                    if send_response(&mut socket, Response::error("Malformed command: binary frame is not UTF-8"))
                        .await
                        .is_err()
                    {
                        break;
                    }
                    continue;
                }
            },
            Ok(Message::Close(_)) => {
                info!("Brain sent close frame.");
                break;
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
            Err(e) => {
                warn!(error = %e, "Error receiving from brain");
                break;
            }
        };

        let response = handle_frame(&state, &frame).await;
        if send_response(&mut socket, response).await.is_err() {
            break;
        }
    }

    info!("Brain connection closed.");
}

/// Decodes one frame and runs it through the dispatcher.
pub async fn handle_frame(state: &ListenerState, frame: &str) -> Response {
    match serde_json::from_str::<Command>(frame) {
        Ok(command) => {
            let dispatcher = state.dispatcher.lock().await;
            dispatcher.execute(&command).await
        }
        Err(e) => {
            warn!(error = %e, "Rejecting malformed command");
            Response::error(format!("Malformed command: {}", e))
        }
    }
}

async fn send_response(socket: &mut WebSocket, response: Response) -> Result<(), ()> {
    let serialized = match serde_json::to_string(&response) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "Failed to encode response");
            return Err(());
        }
    };
    debug!(response = %serialized, "Sending response");
    socket.send(Message::Text(serialized.into())).await.map_err(|e| {
        error!(error = %e, "Failed to send response to brain");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        capture::CaptureLoop,
        recognition::RecognitionSlot,
        simulator::{SimulatedActuators, SimulatedRecognizer},
    };
    use futures_util::{SinkExt, StreamExt};
    use serde_json::json;
    use std::time::{Duration, Instant};
    use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
    use tutor_core::envelope::{Action, Command, Status};

    fn state() -> Arc<ListenerState> {
        let slot = RecognitionSlot::new();
        let recognizer = Arc::new(SimulatedRecognizer::new(slot.clone()));
        let capture = CaptureLoop::new(recognizer, slot).with_poll_interval(Duration::from_millis(10));
        let actuators = Arc::new(SimulatedActuators::new(vec!["celebrate".to_string()], true));
        Arc::new(ListenerState::new(Dispatcher::new(actuators, capture)))
    }

    #[tokio::test]
    async fn test_malformed_frame_gets_error_reply() {
        let state = state();
        let response = handle_frame(&state, "{not json").await;
        assert_eq!(response.status, Status::Error);
        assert!(response.message.unwrap().starts_with("Malformed command"));

        let response = handle_frame(&state, r#"{"data":{}}"#).await;
        assert_eq!(response.status, Status::Error);
    }

    #[tokio::test]
    async fn test_serves_commands_in_order_over_websocket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(serve(listener, state(), async {
            let _ = stop_rx.await;
        }));

        let (mut ws, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();

        let frames = vec![
            json!({"action": "ping"}),
            json!({"action": "fly"}),
            json!({"action": "say", "data": {"text": "Hello"}}),
        ];
        let mut replies = Vec::new();
        for frame in frames {
            ws.send(WsMessage::text(frame.to_string())).await.unwrap();
            let reply = ws.next().await.unwrap().unwrap();
            let response: Response = serde_json::from_str(reply.to_text().unwrap()).unwrap();
            replies.push(response);
        }

        assert_eq!(replies[0], Response::ok(&Action::Ping));
        assert_eq!(replies[1], Response::error("Unknown action"));
        assert_eq!(replies[2], Response::ok(&Action::Say));

        ws.close(None).await.unwrap();
        let _ = stop_tx.send(());
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_second_client_waits_for_running_capture() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(serve(listener, state(), async {
            let _ = stop_rx.await;
        }));

        let url = format!("ws://{}/ws", addr);
        let (mut first, _) = connect_async(url.as_str()).await.unwrap();
        let (mut second, _) = connect_async(url.as_str()).await.unwrap();

        let window = Duration::from_millis(300);
        let listen = Command::listen(&["cat".to_string()], window);
        let started = Instant::now();
        first
            .send(WsMessage::text(serde_json::to_string(&listen).unwrap()))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        second
            .send(WsMessage::text(json!({"action": "ping"}).to_string()))
            .await
            .unwrap();

        let first_reply = async {
            let frame = first.next().await.unwrap().unwrap();
            let response: Response = serde_json::from_str(frame.to_text().unwrap()).unwrap();
            (response, started.elapsed())
        };
        let second_reply = async {
            let frame = second.next().await.unwrap().unwrap();
            let response: Response = serde_json::from_str(frame.to_text().unwrap()).unwrap();
            (response, started.elapsed())
        };
        let ((heard, heard_at), (pong, pong_at)) = tokio::join!(first_reply, second_reply);

        assert_eq!(heard, Response::listened(""));
        assert_eq!(pong, Response::ok(&Action::Ping));
        let capture_end = window - Duration::from_millis(20);
        assert!(heard_at >= capture_end, "capture ended at {:?}", heard_at);
        assert!(pong_at >= capture_end, "ping answered at {:?} during the capture", pong_at);

        first.close(None).await.unwrap();
        second.close(None).await.unwrap();
        let _ = stop_tx.send(());
        server.await.unwrap().unwrap();
    }
}
