//! Request DTOs
//!
//! Data structures for API request bodies.

use serde::Deserialize;
use validator::{Validate, ValidationError};

use crate::domain::{MessageKind, MessageStatus};

/// Open (or fetch) a private chat with another user
#[derive(Debug, Deserialize, Validate)]
pub struct CreateChatRequest {
    #[validate(range(min = 1, message = "Recipient ID must be positive"))]
    pub recipient_id: i64,
}

/// Post a message to a chat
#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_message_body"))]
pub struct SendMessageRequest {
    #[serde(rename = "type", default)]
    pub kind: MessageKind,

    #[serde(default)]
    #[validate(length(max = 4000, message = "Message content must be at most 4000 characters"))]
    pub content: String,

    #[validate(url(message = "Invalid media URL"))]
    pub media_url: Option<String>,

    pub reply_to_id: Option<i64>,
}

/// Acknowledge a message
#[derive(Debug, Deserialize)]
pub struct UpdateMessageStatusRequest {
    pub status: MessageStatus,
}

/// Query string for message history
#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

fn validate_message_body(request: &SendMessageRequest) -> Result<(), ValidationError> {
    if request.kind.is_media() {
        if request.media_url.is_none() {
            return Err(ValidationError::new("media_url_required"));
        }
    } else if request.content.trim().is_empty() {
        return Err(ValidationError::new("content_required"));
    }
    Ok(())
}
