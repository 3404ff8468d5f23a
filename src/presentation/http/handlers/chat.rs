//! Chat Handlers

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::application::dto::request::{
    CreateChatRequest, MessageQuery, SendMessageRequest, UpdateMessageStatusRequest,
};
use crate::application::dto::response::{
    ChatListResponse, ChatResponse, MessageListResponse, MessageResponse, SuccessResponse,
};
use crate::application::services::CreateMessageDto;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::startup::AppState;

fn parse_id(raw: &str, what: &str) -> Result<i64, AppError> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid {} ID", what)))
}

/// Get or create the private chat with another user
pub async fn create_chat(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<CreateChatRequest>,
) -> Result<(StatusCode, Json<ChatResponse>), AppError> {
    body.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let chat = state
        .chat_service
        .open_private_chat(auth.user_id, body.recipient_id)
        .await?;

    Ok((StatusCode::CREATED, Json(ChatResponse { chat })))
}

/// List the caller's chats
pub async fn list_chats(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<ChatListResponse>, AppError> {
    let chats = state.chat_service.list_chats(auth.user_id).await?;
    Ok(Json(ChatListResponse { chats }))
}

/// Get a page of messages from a chat
pub async fn get_messages(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(chat_id): Path<String>,
    Query(query): Query<MessageQuery>,
) -> Result<Json<MessageListResponse>, AppError> {
    let chat_id = parse_id(&chat_id, "chat")?;

    let messages = state
        .chat_service
        .get_messages(chat_id, auth.user_id, query.limit, query.offset)
        .await?;

    Ok(Json(MessageListResponse { messages }))
}

/// Send message to chat
pub async fn send_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(chat_id): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    let chat_id = parse_id(&chat_id, "chat")?;

    body.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let request = CreateMessageDto {
        kind: body.kind,
        content: body.content,
        media_url: body.media_url,
        reply_to_id: body.reply_to_id,
    };

    let message = state
        .chat_service
        .send_message(chat_id, auth.user_id, request)
        .await?;

    Ok((StatusCode::CREATED, Json(MessageResponse { message })))
}

/// Mark a message delivered or read
pub async fn update_message_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(message_id): Path<String>,
    Json(body): Json<UpdateMessageStatusRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let message_id = parse_id(&message_id, "message")?;

    let message = state
        .chat_service
        .update_status(message_id, auth.user_id, body.status)
        .await?;

    Ok(Json(MessageResponse { message }))
}

/// Delete one of the caller's messages
pub async fn delete_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(message_id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    let message_id = parse_id(&message_id, "message")?;

    state
        .chat_service
        .delete_message(message_id, auth.user_id)
        .await?;

    Ok(Json(SuccessResponse::ok()))
}
