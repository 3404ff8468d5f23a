//! WebSocket Upgrade Handler
//!
//! Authenticates the upgrade request, registers the connection with the
//! hub and hands the split socket to a [`Connection`].

use axum::{
    extract::{ws::WebSocket, Query, State, WebSocketUpgrade},
    http::HeaderMap,
    response::Response,
};
use futures::StreamExt;
use serde::Deserialize;
use std::time::Duration;

use super::connection::Connection;
use crate::presentation::middleware::{bearer_token, decode_user_id};
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Browsers cannot set headers on a websocket handshake, so the token may
/// also arrive as `?token=`.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let user_id = match bearer_token(&headers) {
        Ok(token) => decode_user_id(token, &state.settings.jwt.secret)?,
        Err(missing) => {
            let token = query.token.ok_or(missing)?;
            decode_user_id(&token, &state.settings.jwt.secret)?
        }
    };

    if state.hub.is_closed() {
        return Err(AppError::Unavailable("Hub is not running".into()));
    }

    let max_message_size = state.settings.websocket.max_message_size;
    let max_frame_size = state.settings.websocket.max_frame_size;
    Ok(ws
        .max_message_size(max_message_size)
        .max_frame_size(max_frame_size)
        .on_upgrade(move |socket| handle_socket(socket, user_id, state)))
}

async fn handle_socket(socket: WebSocket, user_id: i64, state: AppState) {
    let (handle, outbound) = state.hub.new_connection(user_id);
    let write_timeout = Duration::from_secs(state.settings.websocket.write_timeout_secs);
    let connection = Connection::new(&handle, state.hub.clone(), state.chats.clone())
        .with_write_timeout(write_timeout);

    if let Err(e) = state.hub.register(handle).await {
        tracing::error!(user_id, error = %e, "Failed to register connection");
        return;
    }

    let (sink, stream) = socket.split();
    connection.run(sink, stream, outbound).await;
}
