use futures_util::StreamExt;
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use crate::api::models::RemoteMessage;
use crate::error::ChatError;

/// Envelope the server wraps every push event in.
#[derive(Debug, Deserialize)]
struct WireEvent {
    event_type: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeletedPayload {
    conversation_id: String,
    message_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IncomingEvent {
    NewMessage(RemoteMessage),
    MessageDeleted { conversation_id: String, message_id: String },
    /// Event type this client does not handle; carried through for logging.
    Other(String),
}

/// Server push stream. Dropped frames and unknown events are skipped, never
/// fatal; the stream ends when the server closes or the socket errors.
pub struct EventStream {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl EventStream {
    pub async fn connect(ws_url: &str) -> Result<Self, ChatError> {
        let url = Url::parse(ws_url).map_err(|e| ChatError::Config(e.to_string()))?;
        let (ws, _) = connect_async(url.as_str())
            .await
            .map_err(|e| ChatError::fetch(None, e.to_string()))?;
        log::debug!("event stream connected to {}", url);
        Ok(Self { ws })
    }

    pub async fn next_event(&mut self) -> Option<IncomingEvent> {
        loop {
            match self.ws.next().await? {
                Ok(WsMessage::Text(text)) => {
                    if let Some(event) = parse_event(&text) {
                        return Some(event);
                    }
                }
                Ok(WsMessage::Close(_)) => return None,
                Ok(_) => continue,
                Err(e) => {
                    log::warn!("event stream read error: {}", e);
                    return None;
                }
            }
        }
    }
}

/// Decode one text frame. Returns None for frames that are not valid event
/// envelopes or whose payload does not match the advertised type.
fn parse_event(text: &str) -> Option<IncomingEvent> {
    let wire: WireEvent = match serde_json::from_str(text) {
        Ok(wire) => wire,
        Err(e) => {
            log::warn!("unparseable event frame: {}", e);
            return None;
        }
    };
    match wire.event_type.as_str() {
        "message-created" => match serde_json::from_value::<RemoteMessage>(wire.data) {
            Ok(msg) => Some(IncomingEvent::NewMessage(msg)),
            Err(e) => {
                log::warn!("bad message-created payload: {}", e);
                None
            }
        },
        "message-deleted" => match serde_json::from_value::<DeletedPayload>(wire.data) {
            Ok(payload) => Some(IncomingEvent::MessageDeleted {
                conversation_id: payload.conversation_id,
                message_id: payload.message_id,
            }),
            Err(e) => {
                log::warn!("bad message-deleted payload: {}", e);
                None
            }
        },
        _ => Some(IncomingEvent::Other(wire.event_type)),
    }
}
