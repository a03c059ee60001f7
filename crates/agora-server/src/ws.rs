//! WebSocket connection handling.
//!
//! Each connection runs one task that interleaves two streams: frames from
//! the peer (dispatched to the router in arrival order) and events from the
//! hub (serialized out). Rejections are delivered as `error` frames to the
//! originating connection only; broadcasts go through the hub.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use agora_shared::protocol::{ClientEvent, ServerEvent};

use crate::api::AppState;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let mut events = state.hub.subscribe();

    debug!(peers = state.hub.receiver_count(), "WebSocket connected");

    loop {
        tokio::select! {
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(message) = process_frame(&state, &text).await {
                            let event = ServerEvent::Error { message };
                            match event.to_json() {
                                Ok(reply) => {
                                    if sink.send(Message::Text(reply)).await.is_err() {
                                        break;
                                    }
                                }
                                Err(e) => warn!(error = %e, "Failed to serialize error event"),
                            }
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        if sink.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    // Binary frames and pongs carry nothing for us.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(error = %e, "WebSocket read failed");
                        break;
                    }
                }
            }

            event = events.recv() => {
                match event {
                    Ok(event) => match event.to_json() {
                        Ok(text) => {
                            if sink.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!(error = %e, "Failed to serialize broadcast"),
                    },
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "Slow WebSocket consumer, events dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    debug!("WebSocket disconnected");
}

/// Parse and dispatch one text frame. Returns the user-facing message of a
/// rejection, `None` when the frame was handled cleanly.
async fn process_frame(state: &AppState, text: &str) -> Option<String> {
    let event = match ClientEvent::from_json(text) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "Unparseable client frame");
            return Some("Malformed event".to_string());
        }
    };

    match state.router.handle(event).await {
        Ok(()) => None,
        Err(e) => {
            warn!(error = %e, "Rejected client event");
            Some(e.user_message())
        }
    }
}
