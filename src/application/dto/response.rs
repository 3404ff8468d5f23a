//! Response DTOs
//!
//! JSON envelopes returned by the chat endpoints.

use serde::Serialize;

use crate::domain::{Chat, Message};

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub chat: Chat,
}

#[derive(Debug, Serialize)]
pub struct ChatListResponse {
    pub chats: Vec<Chat>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: Message,
}

#[derive(Debug, Serialize)]
pub struct MessageListResponse {
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}
