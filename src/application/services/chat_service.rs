//! Chat Service
//!
//! Handles chats, messages and receipts. Every successful write is
//! followed by a realtime event pushed through the hub.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::application::dto::ChatEvent;
use crate::domain::{
    Chat, ChatRepository, Message, MessageKind, MessageReceipt, MessageRepository, MessageStatus,
};
use crate::presentation::websocket::HubHandle;
use crate::shared::error::AppError;

const DEFAULT_PAGE_SIZE: usize = 50;
const MAX_PAGE_SIZE: usize = 100;

/// Chat service trait
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Get or create the private chat between two users
    async fn open_private_chat(&self, user_id: i64, recipient_id: i64) -> Result<Chat, ChatError>;

    /// Chats the user belongs to
    async fn list_chats(&self, user_id: i64) -> Result<Vec<Chat>, ChatError>;

    /// A page of a chat's history, oldest first
    async fn get_messages(
        &self,
        chat_id: i64,
        user_id: i64,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<Vec<Message>, ChatError>;

    /// Post a message and fan it out to the other participants
    async fn send_message(
        &self,
        chat_id: i64,
        sender_id: i64,
        request: CreateMessageDto,
    ) -> Result<Message, ChatError>;

    /// Record a delivered/read receipt
    async fn update_status(
        &self,
        message_id: i64,
        user_id: i64,
        status: MessageStatus,
    ) -> Result<Message, ChatError>;

    /// Delete a message
    async fn delete_message(&self, message_id: i64, actor_id: i64) -> Result<(), ChatError>;
}

/// Create message request
#[derive(Debug, Clone, Default)]
pub struct CreateMessageDto {
    pub kind: MessageKind,
    pub content: String,
    pub media_url: Option<String>,
    pub reply_to_id: Option<i64>,
}

/// Chat service errors
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Chat not found")]
    ChatNotFound,

    #[error("Message not found")]
    MessageNotFound,

    #[error("Permission denied")]
    Forbidden,

    #[error("Cannot open a chat with yourself")]
    InvalidRecipient,

    #[error("Status must be delivered or read")]
    InvalidStatus,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<AppError> for ChatError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::NotFound(_) => ChatError::ChatNotFound,
            other => ChatError::Internal(other.to_string()),
        }
    }
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::ChatNotFound | ChatError::MessageNotFound => {
                AppError::NotFound(err.to_string())
            }
            ChatError::Forbidden => AppError::Forbidden(err.to_string()),
            ChatError::InvalidRecipient | ChatError::InvalidStatus => {
                AppError::BadRequest(err.to_string())
            }
            ChatError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

/// ChatService implementation
pub struct ChatServiceImpl<C, M>
where
    C: ChatRepository,
    M: MessageRepository,
{
    chat_repo: Arc<C>,
    message_repo: Arc<M>,
    hub: HubHandle,
}

impl<C, M> ChatServiceImpl<C, M>
where
    C: ChatRepository,
    M: MessageRepository,
{
    pub fn new(chat_repo: Arc<C>, message_repo: Arc<M>, hub: HubHandle) -> Self {
        Self {
            chat_repo,
            message_repo,
            hub,
        }
    }

    async fn require_member(&self, chat_id: i64, user_id: i64) -> Result<(), ChatError> {
        self.chat_repo
            .find_by_id(chat_id)
            .await?
            .ok_or(ChatError::ChatNotFound)?;

        if !self.chat_repo.is_member(chat_id, user_id).await? {
            return Err(ChatError::Forbidden);
        }
        Ok(())
    }

    async fn load_message(&self, message_id: i64) -> Result<Message, ChatError> {
        self.message_repo
            .find_by_id(message_id)
            .await
            .map_err(|e| ChatError::Internal(e.to_string()))?
            .ok_or(ChatError::MessageNotFound)
    }

    /// The write has already happened, so a failed publish is only logged.
    async fn publish(&self, chat_id: i64, event: ChatEvent, exclude: Option<i64>) {
        let payload = match event.to_bytes() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(chat_id, event = event.event_name(), error = %e, "Failed to encode event");
                return;
            }
        };

        if let Err(e) = self.hub.broadcast_to_chat(chat_id, payload, exclude).await {
            tracing::warn!(chat_id, event = event.event_name(), error = %e, "Realtime fan-out skipped");
        }
    }
}

#[async_trait]
impl<C, M> ChatService for ChatServiceImpl<C, M>
where
    C: ChatRepository + 'static,
    M: MessageRepository + 'static,
{
    async fn open_private_chat(&self, user_id: i64, recipient_id: i64) -> Result<Chat, ChatError> {
        if user_id == recipient_id {
            return Err(ChatError::InvalidRecipient);
        }

        if let Some(chat) = self.chat_repo.find_private(user_id, recipient_id).await? {
            return Ok(chat);
        }

        let chat = self.chat_repo.create_private(user_id, recipient_id).await?;
        tracing::info!(chat_id = chat.id, user_id, recipient_id, "Private chat created");
        Ok(chat)
    }

    async fn list_chats(&self, user_id: i64) -> Result<Vec<Chat>, ChatError> {
        Ok(self.chat_repo.find_by_member(user_id).await?)
    }

    async fn get_messages(
        &self,
        chat_id: i64,
        user_id: i64,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<Vec<Message>, ChatError> {
        self.require_member(chat_id, user_id).await?;

        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        self.message_repo
            .find_by_chat(chat_id, limit, offset.unwrap_or(0))
            .await
            .map_err(|e| ChatError::Internal(e.to_string()))
    }

    async fn send_message(
        &self,
        chat_id: i64,
        sender_id: i64,
        request: CreateMessageDto,
    ) -> Result<Message, ChatError> {
        self.require_member(chat_id, sender_id).await?;

        if let Some(reply_to_id) = request.reply_to_id {
            let parent = self.load_message(reply_to_id).await?;
            if parent.chat_id != chat_id {
                return Err(ChatError::MessageNotFound);
            }
        }

        let now = Utc::now();
        let message = Message {
            id: 0,
            chat_id,
            sender_id,
            kind: request.kind,
            content: request.content,
            media_url: request.media_url,
            status: MessageStatus::Sent,
            reply_to_id: request.reply_to_id,
            created_at: now,
            updated_at: now,
        };

        let created = self.message_repo.create(message).await?;
        tracing::debug!(chat_id, message_id = created.id, sender_id, "Message stored");

        self.publish(
            chat_id,
            ChatEvent::NewMessage {
                message: created.clone(),
            },
            Some(sender_id),
        )
        .await;

        Ok(created)
    }

    async fn update_status(
        &self,
        message_id: i64,
        user_id: i64,
        status: MessageStatus,
    ) -> Result<Message, ChatError> {
        if status == MessageStatus::Sent {
            return Err(ChatError::InvalidStatus);
        }

        let message = self.load_message(message_id).await?;
        self.require_member(message.chat_id, user_id).await?;

        let updated = self
            .message_repo
            .record_receipt(MessageReceipt {
                message_id,
                user_id,
                status,
                timestamp: Utc::now(),
            })
            .await
            .map_err(|e| ChatError::Internal(e.to_string()))?;

        self.publish(
            updated.chat_id,
            ChatEvent::MessageStatus {
                message_id,
                status,
                user_id,
            },
            None,
        )
        .await;

        Ok(updated)
    }

    async fn delete_message(&self, message_id: i64, actor_id: i64) -> Result<(), ChatError> {
        let message = self.load_message(message_id).await?;

        if message.sender_id != actor_id {
            return Err(ChatError::Forbidden);
        }

        self.message_repo
            .delete(message_id)
            .await
            .map_err(|e| ChatError::Internal(e.to_string()))?;
        tracing::info!(chat_id = message.chat_id, message_id, "Message deleted");

        self.publish(
            message.chat_id,
            ChatEvent::MessageDeleted { message_id },
            None,
        )
        .await;

        Ok(())
    }
}
