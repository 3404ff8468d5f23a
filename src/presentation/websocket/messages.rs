//! WebSocket Message Types
//!
//! Inbound client frames and the broadcast envelope routed by the hub.

use bytes::Bytes;
use serde::Deserialize;

use super::session::ConnectionId;

/// Inbound frame kinds understood by the connection reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameKind {
    /// Subscribe this connection to a chat
    JoinChat,
    /// Unsubscribe this connection from a chat
    LeaveChat,
    /// Typing indicator, relayed to the chat
    Typing,
    /// Delivery receipt, relayed to the chat
    MessageDelivered,
    /// Read receipt, relayed to the chat
    MessageRead,
}

impl FrameKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameKind::JoinChat => "join_chat",
            FrameKind::LeaveChat => "leave_chat",
            FrameKind::Typing => "typing",
            FrameKind::MessageDelivered => "message_delivered",
            FrameKind::MessageRead => "message_read",
        }
    }
}

/// Incoming client frame
///
/// ```json
/// { "type": "typing", "chat_id": 5, "payload": { ... } }
/// ```
#[derive(Debug, Deserialize)]
pub struct InboundFrame {
    #[serde(rename = "type")]
    pub kind: FrameKind,
    pub chat_id: i64,
    /// Opaque to the server; relayed frames are forwarded byte-for-byte.
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
}

/// What the reader should do with a decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    Join(i64),
    Leave(i64),
    Relay(i64),
}

/// Frame decoding errors. Always recoverable: the frame is dropped and the
/// connection stays open.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("Malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl InboundFrame {
    /// Decode a raw websocket payload.
    pub fn decode(raw: &[u8]) -> Result<Self, FrameError> {
        Ok(serde_json::from_slice(raw)?)
    }

    pub fn action(&self) -> ClientAction {
        match self.kind {
            FrameKind::JoinChat => ClientAction::Join(self.chat_id),
            FrameKind::LeaveChat => ClientAction::Leave(self.chat_id),
            FrameKind::Typing | FrameKind::MessageDelivered | FrameKind::MessageRead => {
                ClientAction::Relay(self.chat_id)
            }
        }
    }
}

/// A routed broadcast request: deliver `payload` to every subscriber of
/// `chat_id` except `exclude`.
#[derive(Debug, Clone)]
pub struct BroadcastEnvelope {
    pub chat_id: i64,
    pub payload: Bytes,
    pub exclude: Option<i64>,
    /// Set when a client relays a frame. The hub drops the envelope unless
    /// this connection is live and has joined `chat_id`.
    pub origin: Option<ConnectionId>,
}

impl BroadcastEnvelope {
    pub fn new(chat_id: i64, payload: impl Into<Bytes>) -> Self {
        Self {
            chat_id,
            payload: payload.into(),
            exclude: None,
            origin: None,
        }
    }

    /// A frame relayed by a client connection. The sender never receives
    /// its own echo.
    pub fn relayed(
        chat_id: i64,
        payload: impl Into<Bytes>,
        user_id: i64,
        connection_id: ConnectionId,
    ) -> Self {
        Self {
            chat_id,
            payload: payload.into(),
            exclude: Some(user_id),
            origin: Some(connection_id),
        }
    }

    /// Skip the given user when fanning out (used to suppress echoes).
    pub fn excluding(mut self, user_id: i64) -> Self {
        self.exclude = Some(user_id);
        self
    }
}
