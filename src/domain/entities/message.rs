//! Message entity and repository trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Content kind of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    Video,
    Audio,
    Document,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Document => "document",
        }
    }

    /// Media messages must carry a `media_url`.
    pub fn is_media(&self) -> bool {
        !matches!(self, Self::Text)
    }
}

/// Delivery state of a message, as acknowledged by recipients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    #[default]
    Sent,
    Delivered,
    Read,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Read => "read",
        }
    }
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A message posted to a chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,

    pub chat_id: i64,

    pub sender_id: i64,

    #[serde(rename = "type")]
    pub kind: MessageKind,

    pub content: String,

    pub media_url: Option<String>,

    pub status: MessageStatus,

    /// Message this one replies to
    pub reply_to_id: Option<i64>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Default for Message {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            chat_id: 0,
            sender_id: 0,
            kind: MessageKind::default(),
            content: String::new(),
            media_url: None,
            status: MessageStatus::default(),
            reply_to_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A per-recipient acknowledgement of a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageReceipt {
    pub message_id: i64,
    pub user_id: i64,
    pub status: MessageStatus,
    pub timestamp: DateTime<Utc>,
}

/// Repository trait for Message data access operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Find a message by ID.
    async fn find_by_id(&self, id: i64) -> Result<Option<Message>, AppError>;

    /// A page of the chat's messages, oldest first. `offset` counts back
    /// from the newest message.
    async fn find_by_chat(
        &self,
        chat_id: i64,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Message>, AppError>;

    /// Store a new message, assigning its ID, and bump the chat.
    async fn create(&self, message: Message) -> Result<Message, AppError>;

    /// Record a recipient's receipt and advance the message status.
    async fn record_receipt(&self, receipt: MessageReceipt) -> Result<Message, AppError>;

    /// Delete a message.
    async fn delete(&self, id: i64) -> Result<(), AppError>;
}
