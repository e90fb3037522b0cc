//! Push events and the Socket.IO v4 wire framing they travel in.
//!
//! ## Framing
//!
//! Each WebSocket text frame is an Engine.IO packet; type `4` carries a
//! Socket.IO packet:
//!
//! ```text
//! 0{"sid":..,"pingInterval":..}   open          → client replies "40"
//! 2 / 3                           ping / pong
//! 1                               close
//! 40{"sid":..}                    namespace connect ack
//! 41                              namespace disconnect
//! 42["new_message",{...}]         event
//! 44{"message":..}                connect error
//! ```

use crate::error::{Error, Result};
use crate::types::{DocumentId, Message};
use serde::Deserialize;
use serde_json::Value;

/// Event categories handlers can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    NewMessage,
    DocProcessed,
    Lifecycle,
}

/// Payload of a `doc_processed` event.
///
/// Only `document_id` matters to the engine, and an event without one is
/// malformed. The backend does not always include it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DocProcessed {
    #[serde(default, alias = "doc_id")]
    pub document_id: Option<DocumentId>,
    #[serde(default)]
    pub chunks: Option<u32>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Connection lifecycle notifications, for diagnostics only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lifecycle {
    Connected,
    Disconnected { reason: String },
    Ack { status: String },
    RoomJoined { room: String },
}

/// A decoded push event.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    NewMessage(Message),
    DocProcessed(DocProcessed),
    Lifecycle(Lifecycle),
}

impl PushEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            PushEvent::NewMessage(_) => EventKind::NewMessage,
            PushEvent::DocProcessed(_) => EventKind::DocProcessed,
            PushEvent::Lifecycle(_) => EventKind::Lifecycle,
        }
    }
}

/// An Engine.IO frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Open { sid: Option<String>, ping_interval_ms: Option<u64> },
    Close,
    Ping,
    Pong,
    Packet(Packet),
    /// Upgrade, noop and other frames the client does not act on
    Other,
}

/// A Socket.IO packet carried in an Engine.IO message frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Connect,
    Disconnect,
    Event { name: String, payload: Value },
    ConnectError(Value),
    /// Acks and binary packets, which this client never requests
    Unsupported(char),
}

/// Reply to an Engine.IO open: connect to the default namespace.
pub const NAMESPACE_CONNECT: &str = "40";

/// Reply to an Engine.IO ping.
pub const PONG: &str = "3";

#[derive(Deserialize)]
struct OpenPayload {
    #[serde(default)]
    sid: Option<String>,
    #[serde(default, rename = "pingInterval")]
    ping_interval: Option<u64>,
}

#[derive(Deserialize)]
struct AckPayload {
    #[serde(default)]
    status: String,
}

#[derive(Deserialize)]
struct RoomPayload {
    #[serde(default)]
    room: String,
}

/// Decode one WebSocket text frame.
pub fn decode_frame(text: &str) -> Result<Frame> {
    let mut chars = text.chars();
    let kind = chars
        .next()
        .ok_or_else(|| Error::Protocol("empty frame".to_string()))?;
    let rest = chars.as_str();

    match kind {
        '0' => {
            let open: OpenPayload = serde_json::from_str(rest)
                .map_err(|e| Error::Protocol(format!("bad open payload: {}", e)))?;
            Ok(Frame::Open {
                sid: open.sid,
                ping_interval_ms: open.ping_interval,
            })
        }
        '1' => Ok(Frame::Close),
        '2' => Ok(Frame::Ping),
        '3' => Ok(Frame::Pong),
        '4' => decode_packet(rest).map(Frame::Packet),
        '5' | '6' => Ok(Frame::Other),
        other => Err(Error::Protocol(format!("unknown engine packet type {:?}", other))),
    }
}

fn decode_packet(text: &str) -> Result<Packet> {
    let mut chars = text.chars();
    let kind = chars
        .next()
        .ok_or_else(|| Error::Protocol("empty socket packet".to_string()))?;
    let body = strip_namespace(chars.as_str());

    match kind {
        '0' => Ok(Packet::Connect),
        '1' => Ok(Packet::Disconnect),
        '2' => {
            // Optional ack id digits precede the JSON array
            let body = body.trim_start_matches(|c: char| c.is_ascii_digit());
            let mut items: Vec<Value> = serde_json::from_str(body)
                .map_err(|e| Error::Protocol(format!("bad event packet: {}", e)))?;
            if items.is_empty() {
                return Err(Error::Protocol("event packet without name".to_string()));
            }
            let name = match items.remove(0) {
                Value::String(name) => name,
                other => {
                    return Err(Error::Protocol(format!("event name is not a string: {}", other)))
                }
            };
            let payload = if items.is_empty() {
                Value::Null
            } else {
                items.remove(0)
            };
            Ok(Packet::Event { name, payload })
        }
        '4' => Ok(Packet::ConnectError(
            serde_json::from_str(body).unwrap_or(Value::String(body.to_string())),
        )),
        other => Ok(Packet::Unsupported(other)),
    }
}

/// Skip a `/namespace,` prefix if present.
fn strip_namespace(text: &str) -> &str {
    if text.starts_with('/') {
        match text.find(',') {
            Some(idx) => &text[idx + 1..],
            None => "",
        }
    } else {
        text
    }
}

/// Encode an outgoing event frame for the default namespace.
pub fn encode_event(name: &str, payload: &Value) -> String {
    format!("42{}", Value::Array(vec![Value::String(name.to_string()), payload.clone()]))
}

/// Turn a named event into a typed push event.
///
/// Returns `Ok(None)` for event names the client does not consume and
/// `Err` when a known event carries an undecodable payload.
pub fn decode_event(name: &str, payload: Value) -> Result<Option<PushEvent>> {
    let event = match name {
        "new_message" => {
            let message: Message = serde_json::from_value(payload)
                .map_err(|e| Error::Protocol(format!("malformed new_message: {}", e)))?;
            PushEvent::NewMessage(message)
        }
        "doc_processed" => {
            let processed: DocProcessed = serde_json::from_value(payload)
                .map_err(|e| Error::Protocol(format!("malformed doc_processed: {}", e)))?;
            PushEvent::DocProcessed(processed)
        }
        "connection_ack" => {
            let ack: AckPayload = serde_json::from_value(payload)
                .map_err(|e| Error::Protocol(format!("malformed connection_ack: {}", e)))?;
            PushEvent::Lifecycle(Lifecycle::Ack { status: ack.status })
        }
        "room_joined" => {
            let joined: RoomPayload = serde_json::from_value(payload)
                .map_err(|e| Error::Protocol(format!("malformed room_joined: {}", e)))?;
            PushEvent::Lifecycle(Lifecycle::RoomJoined { room: joined.room })
        }
        _ => return Ok(None),
    };
    Ok(Some(event))
}
