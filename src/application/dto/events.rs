//! Realtime Events
//!
//! Payloads the request layer pushes through the hub. The hub treats the
//! serialized bytes as opaque.

use bytes::Bytes;
use serde::Serialize;

use crate::domain::{Message, MessageStatus};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    NewMessage {
        message: Message,
    },
    MessageStatus {
        message_id: i64,
        status: MessageStatus,
        user_id: i64,
    },
    MessageDeleted {
        message_id: i64,
    },
}

impl ChatEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            ChatEvent::NewMessage { .. } => "new_message",
            ChatEvent::MessageStatus { .. } => "message_status",
            ChatEvent::MessageDeleted { .. } => "message_deleted",
        }
    }

    pub fn to_bytes(&self) -> Result<Bytes, serde_json::Error> {
        serde_json::to_vec(self).map(Bytes::from)
    }
}
