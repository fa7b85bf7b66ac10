use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Transport-neutral WebSocket frame exchanged between the pumps and a transport.
///
/// Text is reference-counted so a single serialized broadcast can sit in many
/// mailboxes without being copied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(Arc<str>),
    Binary(Vec<u8>),
    Close,
}

impl Frame {
    pub fn text(text: impl Into<Arc<str>>) -> Self {
        Frame::Text(text.into())
    }

    /// Serialize any value into a text frame.
    pub fn json<T: Serialize>(payload: &T) -> serde_json::Result<Self> {
        Ok(Frame::Text(serde_json::to_string(payload)?.into()))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Frame::Text(text) => Some(text.as_ref()),
            _ => None,
        }
    }
}

pub const PING: &str = "ping";
pub const PONG: &str = "pong";
pub const CONNECTED: &str = "connected";

/// Raw inbound frame — parse the `type` discriminator first, then extract body.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundFrame {
    #[serde(rename = "type")]
    pub frame_type: String,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, Value>,
}

impl InboundFrame {
    /// Try to interpret this frame as a keep-alive ping.
    /// Wire: `{ "type": "ping", "timestamp": <opaque> }`
    pub fn as_ping(&self) -> Option<PingFrame> {
        if self.frame_type != PING {
            return None;
        }
        Some(PingFrame {
            timestamp: self.rest.get("timestamp").cloned(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PingFrame {
    pub timestamp: Option<Value>,
}

/// Server → Client keep-alive reply, timestamp echoed verbatim.
/// Wire: `{ "type": "pong", "timestamp": 123 }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PongFrame {
    #[serde(rename = "type")]
    pub frame_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,
}

impl PongFrame {
    pub fn reply_to(ping: PingFrame) -> Self {
        Self {
            frame_type: PONG.to_string(),
            timestamp: ping.timestamp,
        }
    }
}

/// Welcome frame sent once a client has joined its room.
/// Wire: `{ "type": "connected", "message": "...", "formId": "507f..." }`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedFrame {
    #[serde(rename = "type")]
    pub frame_type: String,
    pub message: String,
    pub form_id: String,
}

impl ConnectedFrame {
    pub fn new(message: impl Into<String>, form_id: impl Into<String>) -> Self {
        Self {
            frame_type: CONNECTED.to_string(),
            message: message.into(),
            form_id: form_id.into(),
        }
    }
}

/// Broadcast envelope delivered to every member of a room.
/// Wire: `{ "formId": "507f...", "type": "analytics:update", "data": {...} }`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub form_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Value,
}
