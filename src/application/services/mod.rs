//! Application Services
//!
//! - **ChatService**: Chats, messages and receipts, with realtime fan-out

pub mod chat_service;

pub use chat_service::{ChatError, ChatService, ChatServiceImpl, CreateMessageDto};
