//! WebSocket transport for the reply hub.
//!
//! Each connection gets its own bounded channel; the hub writes encoded
//! frames into it and a forward task drains it onto the socket. Inbound
//! frames are limited to client-submitted replies.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::dto::SubmitReplyRequest;
use crate::router::AppState;

/// Frames buffered per subscriber before the hub starts dropping.
const SUBSCRIBER_BUFFER: usize = 64;

/// Frames a client may send. Anything else is logged and ignored.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ClientFrame {
    #[serde(rename = "reply")]
    Reply(SubmitReplyRequest),
}

/// GET /ws: upgrade and join the reply feed.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let (event_tx, mut event_rx) = mpsc::channel::<String>(SUBSCRIBER_BUFFER);
    let subscriber = match state.hub.attach(event_tx).await {
        Ok(id) => id,
        Err(e) => {
            warn!("websocket subscription failed: {e}");
            let _ = ws_tx.close().await;
            return;
        }
    };
    debug!(subscriber, "websocket client attached");

    let forward = tokio::spawn(async move {
        while let Some(frame) = event_rx.recv().await {
            if ws_tx.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(next) = ws_rx.next().await {
        match next {
            Ok(Message::Text(text)) => handle_client_frame(&state, text.as_str()).await,
            Ok(Message::Close(_)) => break,
            // Ping/pong is answered by the protocol layer during reads.
            Ok(_) => {}
            Err(e) => {
                debug!(subscriber, "websocket read error: {e}");
                break;
            }
        }
    }

    state.hub.detach(subscriber).await;
    forward.abort();
    debug!(subscriber, "websocket client detached");
}

async fn handle_client_frame(state: &AppState, raw: &str) {
    let frame: ClientFrame = match serde_json::from_str(raw) {
        Ok(frame) => frame,
        Err(e) => {
            debug!("ignoring malformed websocket frame: {e}");
            return;
        }
    };
    match frame {
        ClientFrame::Reply(body) => {
            let reply = match body.into_new_reply() {
                Ok(reply) => reply,
                Err(e) => {
                    debug!("ignoring invalid reply frame: {e}");
                    return;
                }
            };
            if let Err(e) = state.hub.publish(reply).await {
                warn!("failed to record websocket reply: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_frames_parse_camel_case_fields() {
        let raw = r#"{"type":"reply","userId":"42","username":"zoe","content":"hi","messageId":"m1"}"#;
        let ClientFrame::Reply(body) = serde_json::from_str::<ClientFrame>(raw).unwrap();
        assert_eq!(body.user_id.as_deref(), Some("42"));
        assert_eq!(body.username.as_deref(), Some("zoe"));
        assert_eq!(body.message_id.as_deref(), Some("m1"));
        assert!(body.into_new_reply().is_ok());
    }

    #[test]
    fn unknown_frame_types_are_rejected() {
        assert!(serde_json::from_str::<ClientFrame>(r#"{"type":"subscribe"}"#).is_err());
        assert!(serde_json::from_str::<ClientFrame>("not json").is_err());
    }

    #[test]
    fn reply_frames_missing_required_fields_fail_validation() {
        let raw = r#"{"type":"reply","userId":"42"}"#;
        let ClientFrame::Reply(body) = serde_json::from_str::<ClientFrame>(raw).unwrap();
        assert!(body.into_new_reply().is_err());
    }
}
