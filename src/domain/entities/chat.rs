//! Chat entity and repository trait.
//!
//! A chat is the conversation a hub room is keyed by. Membership lives
//! here, in the persistence collaborator, not in the hub.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    /// One-to-one conversation
    #[default]
    Private,
    /// Conversation backed by a group
    Group,
}

impl ChatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Group => "group",
        }
    }
}

impl std::fmt::Display for ChatType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A conversation between users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,

    #[serde(rename = "type")]
    pub chat_type: ChatType,

    /// Participant user IDs
    pub members: Vec<i64>,

    /// Most recent message, if any
    pub last_message_id: Option<i64>,

    pub created_at: DateTime<Utc>,

    /// Bumped whenever a message is posted
    pub updated_at: DateTime<Utc>,
}

impl Chat {
    /// Create a private chat between two users.
    pub fn private(id: i64, user_a: i64, user_b: i64) -> Self {
        let now = Utc::now();
        Self {
            id,
            chat_type: ChatType::Private,
            members: vec![user_a, user_b],
            last_message_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_member(&self, user_id: i64) -> bool {
        self.members.contains(&user_id)
    }

    /// True for the private chat between exactly these two users, in
    /// either order.
    pub fn is_private_between(&self, user_a: i64, user_b: i64) -> bool {
        self.chat_type == ChatType::Private && self.has_member(user_a) && self.has_member(user_b)
    }
}

/// Repository trait for Chat data access operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// Find a chat by ID.
    async fn find_by_id(&self, id: i64) -> Result<Option<Chat>, AppError>;

    /// Chats the user participates in, most recently updated first.
    async fn find_by_member(&self, user_id: i64) -> Result<Vec<Chat>, AppError>;

    /// Find the private chat between two users, if one exists.
    async fn find_private(&self, user_a: i64, user_b: i64) -> Result<Option<Chat>, AppError>;

    /// Create a private chat between two users.
    async fn create_private(&self, user_a: i64, user_b: i64) -> Result<Chat, AppError>;

    /// Whether the user belongs to the chat. Gatekeeps hub room joins.
    async fn is_member(&self, chat_id: i64, user_id: i64) -> Result<bool, AppError>;
}
