//! # Domain Entities
//!
//! - **Chat**: A conversation and its participants
//! - **Message**: A message posted to a chat, with per-recipient receipts
//!
//! ## Repository Traits
//!
//! Each entity has an associated repository trait defining data access operations.
//! These traits are implemented in the infrastructure layer.

mod chat;
mod message;

pub use chat::{Chat, ChatRepository, ChatType};
pub use message::{Message, MessageKind, MessageReceipt, MessageRepository, MessageStatus};

#[cfg(test)]
pub use chat::MockChatRepository;
#[cfg(test)]
pub use message::MockMessageRepository;
