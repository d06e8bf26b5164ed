//! The dealer WebSocket client (§4.F): a TLS WebSocket session carrying
//! real-time commands and notifications. Grounded on the teacher's
//! `network.rs` network-dispatch shape (one task owns the socket, classifies
//! inbound payloads, and posts typed work onward) generalized from polling
//! `rspotify` to a persistent `tokio-tungstenite` connection.

use crate::error::{CoreError, CoreResult};
use crate::events::{EventPoster, EventType};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

const PUSHER_CONNECTION_URI_PREFIX: &str = "hm://pusher/v1/connections";

type DealerSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Outbound reply to a `request` frame (§4.F, §6).
#[derive(Debug, serde::Serialize)]
struct ReplyFrame<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    key: &'a str,
    payload: ReplyPayload,
}

#[derive(Debug, serde::Serialize)]
struct ReplyPayload {
    success: bool,
}

/// Handle to a live dealer session. Cloning shares the outbound channel, so
/// `reply_to_request` can be called from the worker that drains the event
/// loop while a separate task owns the socket read/write halves.
#[derive(Clone)]
pub struct DealerClient {
    outbound: mpsc::UnboundedSender<Message>,
    connection_ready: Arc<AtomicBool>,
}

impl DealerClient {
    /// Opens the WebSocket, spawns the read loop that classifies inbound
    /// frames and posts them to `events`, and returns a handle plus the
    /// connection-ready flag it sets on `open`.
    pub async fn connect(
        dealer_host: &str,
        access_token: &str,
        events: EventPoster,
    ) -> CoreResult<Self> {
        let url = format!("wss://{dealer_host}/?access_token={access_token}");
        let (socket, _response) = tokio_tungstenite::connect_async(&url)
            .await
            .map_err(CoreError::from)?;

        let connection_ready = Arc::new(AtomicBool::new(true));
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_socket(socket, outbound_rx, events));

        Ok(Self {
            outbound: outbound_tx,
            connection_ready,
        })
    }

    pub fn connection_ready(&self) -> bool {
        self.connection_ready.load(Ordering::SeqCst)
    }

    /// Sends `{"type":"reply","key":key,"payload":{"success":success}}` (§4.F, I6).
    pub fn reply_to_request(&self, success: bool, key: &str) -> CoreResult<()> {
        let frame = ReplyFrame {
            kind: "reply",
            key,
            payload: ReplyPayload { success },
        };
        let text = serde_json::to_string(&frame)?;
        self.outbound
            .send(Message::Text(text))
            .map_err(|_| CoreError::IoError(std::io::Error::other("dealer socket closed")))
    }
}

async fn run_socket(
    mut socket: DealerSocket,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    events: EventPoster,
) {
    loop {
        tokio::select! {
            inbound = socket.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => handle_inbound_text(&text, &events),
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = socket.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        log::warn!("dealer socket closed");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        log::warn!("dealer socket error: {e}");
                        break;
                    }
                }
            }
            outgoing = outbound.recv() => {
                match outgoing {
                    Some(message) => {
                        if let Err(e) = socket.send(message).await {
                            log::warn!("dealer send failed: {e}");
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }
}

/// Parses one inbound text frame and classifies it by top-level `"type"`
/// (§4.F). Anything else is dropped with a debug log.
fn handle_inbound_text(text: &str, events: &EventPoster) {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            log::debug!("dropping unparseable dealer frame: {e}");
            return;
        }
    };
    match value.get("type").and_then(Value::as_str) {
        Some("message") => events.post(EventType::DealerMessage(value)),
        Some("request") => events.post(EventType::DealerRequest(value)),
        other => log::debug!("dropping dealer frame of unknown type {other:?}"),
    }
}

/// True if a `DealerMessage` payload is the pusher connection notice that
/// carries `Spotify-Connection-Id` (§4.F, §4.K).
pub fn is_pusher_connection_message(message: &Value) -> bool {
    message
        .get("uri")
        .and_then(Value::as_str)
        .map(|uri| uri.starts_with(PUSHER_CONNECTION_URI_PREFIX))
        .unwrap_or(false)
}

/// Extracts `headers["Spotify-Connection-Id"]` from a pusher connection
/// message, if present.
pub fn extract_connection_id(message: &Value) -> Option<String> {
    message
        .get("headers")
        .and_then(|h| h.get("Spotify-Connection-Id"))
        .and_then(Value::as_str)
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn recognizes_pusher_connection_messages() {
        let message = json!({
            "uri": "hm://pusher/v1/connections/abc",
            "headers": {"Spotify-Connection-Id": "conn-1"},
        });
        assert!(is_pusher_connection_message(&message));
        assert_eq!(extract_connection_id(&message).as_deref(), Some("conn-1"));
    }

    #[test]
    fn ignores_other_messages() {
        let message = json!({"uri": "hm://some-other-channel"});
        assert!(!is_pusher_connection_message(&message));
        assert_eq!(extract_connection_id(&message), None);
    }

    #[test]
    fn reply_frame_serializes_per_contract() {
        let frame = ReplyFrame {
            kind: "reply",
            key: "k1",
            payload: ReplyPayload { success: true },
        };
        let text = serde_json::to_string(&frame).unwrap();
        assert_eq!(text, r#"{"type":"reply","key":"k1","payload":{"success":true}}"#);
    }
}
