//! In-memory chat persistence.
//!
//! Backs both [`ChatRepository`] and [`MessageRepository`] with a single
//! lock-guarded state so the server runs without an external database.
//! Nothing survives a restart.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use crate::domain::{
    Chat, ChatRepository, Message, MessageReceipt, MessageRepository,
};
use crate::shared::error::AppError;

#[derive(Debug, Default)]
struct StoreState {
    next_chat_id: i64,
    next_message_id: i64,
    chats: HashMap<i64, Chat>,
    messages: HashMap<i64, Message>,
    receipts: Vec<MessageReceipt>,
}

/// Process-local store for chats, messages and receipts.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receipts recorded for a message, in arrival order.
    pub fn receipts_for(&self, message_id: i64) -> Vec<MessageReceipt> {
        self.state
            .read()
            .receipts
            .iter()
            .filter(|r| r.message_id == message_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ChatRepository for InMemoryStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Chat>, AppError> {
        Ok(self.state.read().chats.get(&id).cloned())
    }

    async fn find_by_member(&self, user_id: i64) -> Result<Vec<Chat>, AppError> {
        let mut chats: Vec<Chat> = self
            .state
            .read()
            .chats
            .values()
            .filter(|c| c.has_member(user_id))
            .cloned()
            .collect();
        chats.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        Ok(chats)
    }

    async fn find_private(&self, user_a: i64, user_b: i64) -> Result<Option<Chat>, AppError> {
        Ok(self
            .state
            .read()
            .chats
            .values()
            .find(|c| c.is_private_between(user_a, user_b))
            .cloned())
    }

    async fn create_private(&self, user_a: i64, user_b: i64) -> Result<Chat, AppError> {
        let mut state = self.state.write();
        // re-check under the write lock so concurrent creates converge
        if let Some(existing) = state
            .chats
            .values()
            .find(|c| c.is_private_between(user_a, user_b))
        {
            return Ok(existing.clone());
        }
        state.next_chat_id += 1;
        let chat = Chat::private(state.next_chat_id, user_a, user_b);
        state.chats.insert(chat.id, chat.clone());
        Ok(chat)
    }

    async fn is_member(&self, chat_id: i64, user_id: i64) -> Result<bool, AppError> {
        Ok(self
            .state
            .read()
            .chats
            .get(&chat_id)
            .map(|c| c.has_member(user_id))
            .unwrap_or(false))
    }
}

#[async_trait]
impl MessageRepository for InMemoryStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Message>, AppError> {
        Ok(self.state.read().messages.get(&id).cloned())
    }

    async fn find_by_chat(
        &self,
        chat_id: i64,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Message>, AppError> {
        let state = self.state.read();
        let mut messages: Vec<&Message> = state
            .messages
            .values()
            .filter(|m| m.chat_id == chat_id)
            .collect();
        // newest first, then reverse the page so it reads oldest first
        messages.sort_by(|a, b| b.id.cmp(&a.id));
        let mut page: Vec<Message> = messages
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        page.reverse();
        Ok(page)
    }

    async fn create(&self, mut message: Message) -> Result<Message, AppError> {
        let mut state = self.state.write();
        let now = Utc::now();
        state.next_message_id += 1;
        message.id = state.next_message_id;
        message.created_at = now;
        message.updated_at = now;

        let chat = state
            .chats
            .get_mut(&message.chat_id)
            .ok_or_else(|| AppError::NotFound("Chat not found".into()))?;
        chat.last_message_id = Some(message.id);
        chat.updated_at = now;

        state.messages.insert(message.id, message.clone());
        Ok(message)
    }

    async fn record_receipt(&self, receipt: MessageReceipt) -> Result<Message, AppError> {
        let mut state = self.state.write();
        let message = state
            .messages
            .get_mut(&receipt.message_id)
            .ok_or_else(|| AppError::NotFound("Message not found".into()))?;

        // the sender's own acknowledgements never move the status
        if message.sender_id != receipt.user_id && receipt.status > message.status {
            message.status = receipt.status;
            message.updated_at = receipt.timestamp;
        }
        let message = message.clone();
        state.receipts.push(receipt);
        Ok(message)
    }

    async fn delete(&self, id: i64) -> Result<(), AppError> {
        let mut state = self.state.write();
        state
            .messages
            .remove(&id)
            .ok_or_else(|| AppError::NotFound("Message not found".into()))?;
        state.receipts.retain(|r| r.message_id != id);
        Ok(())
    }
}
