//! Connection Reader/Writer
//!
//! Each upgraded socket is served by two tasks. The reader decodes inbound
//! frames and turns them into hub commands. The writer drains the
//! connection's bounded outbound queue into the socket. Whichever side
//! finishes first ends the connection, and the hub is always told to
//! unregister it afterwards.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use bytes::Bytes;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;

use super::hub::{HubError, HubHandle};
use super::messages::{BroadcastEnvelope, ClientAction, InboundFrame};
use super::session::{ConnectionHandle, ConnectionId};
use crate::domain::ChatRepository;

/// How long the writer may keep flushing after the reader has gone.
const WRITER_GRACE: Duration = Duration::from_secs(5);

/// Default bound on a single frame write.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// One authenticated client connection.
#[derive(Clone)]
pub struct Connection {
    user_id: i64,
    connection_id: ConnectionId,
    hub: HubHandle,
    chats: Arc<dyn ChatRepository>,
    write_timeout: Duration,
}

impl Connection {
    pub fn new(handle: &ConnectionHandle, hub: HubHandle, chats: Arc<dyn ChatRepository>) -> Self {
        Self {
            user_id: handle.user_id(),
            connection_id: handle.connection_id(),
            hub,
            chats,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }

    /// A peer that does not accept a frame within `timeout` is dropped.
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Serve the connection until either side stops, then unregister.
    ///
    /// The handle must already be registered with the hub; `outbound` is
    /// the receiver created alongside it.
    pub async fn run<S, R, E>(self, sink: S, stream: R, outbound: mpsc::Receiver<Bytes>)
    where
        S: Sink<Message> + Unpin + Send + 'static,
        S::Error: Display + Send,
        R: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
        E: Display + Send + 'static,
    {
        let user_id = self.user_id;
        let connection_id = self.connection_id;

        let mut writer = tokio::spawn(write_loop(
            sink,
            outbound,
            self.write_timeout,
            user_id,
            connection_id,
        ));
        let mut reader = tokio::spawn(self.clone().read_loop(stream));

        let reader_finished = tokio::select! {
            _ = &mut writer => {
                reader.abort();
                false
            }
            _ = &mut reader => true,
        };

        if let Err(e) = self.hub.unregister(user_id, connection_id).await {
            tracing::debug!(user_id, %connection_id, error = %e, "Unregister skipped");
        }

        // Unregistering drops the hub's sender, so the writer drains and exits.
        if reader_finished && tokio::time::timeout(WRITER_GRACE, &mut writer).await.is_err() {
            writer.abort();
        }

        tracing::info!(user_id, %connection_id, "Connection closed");
    }

    async fn read_loop<R, E>(self, mut stream: R)
    where
        R: Stream<Item = Result<Message, E>> + Unpin,
        E: Display,
    {
        while let Some(frame) = stream.next().await {
            let raw = match frame {
                Ok(Message::Text(text)) => Bytes::copy_from_slice(text.as_str().as_bytes()),
                Ok(Message::Binary(data)) => data,
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => {
                    tracing::debug!(user_id = self.user_id, error = %e, "WebSocket read error");
                    break;
                }
            };

            if let Err(e) = self.handle_frame(raw).await {
                tracing::warn!(user_id = self.user_id, error = %e, "Hub unavailable, closing connection");
                break;
            }
        }
    }

    /// Apply one inbound frame. Only a stopped hub is an error; bad frames
    /// and rejected joins are logged and dropped.
    async fn handle_frame(&self, raw: Bytes) -> Result<(), HubError> {
        let frame = match InboundFrame::decode(&raw) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(user_id = self.user_id, error = %e, "Discarding frame");
                return Ok(());
            }
        };

        match frame.action() {
            ClientAction::Join(chat_id) => match self.chats.is_member(chat_id, self.user_id).await {
                Ok(true) => {
                    self.hub
                        .join_room(self.user_id, self.connection_id, chat_id)
                        .await?
                }
                Ok(false) => {
                    tracing::warn!(user_id = self.user_id, chat_id, "Join rejected: not a member");
                }
                Err(e) => {
                    tracing::warn!(user_id = self.user_id, chat_id, error = %e, "Join membership check failed");
                }
            },
            ClientAction::Leave(chat_id) => {
                self.hub
                    .leave_room(self.user_id, self.connection_id, chat_id)
                    .await?
            }
            ClientAction::Relay(chat_id) => {
                tracing::trace!(user_id = self.user_id, chat_id, kind = frame.kind.as_str(), "Relaying frame");
                self.hub
                    .broadcast(BroadcastEnvelope::relayed(
                        chat_id,
                        raw,
                        self.user_id,
                        self.connection_id,
                    ))
                    .await?
            }
        }
        Ok(())
    }
}

/// Drain the outbound queue into the socket. Ends when the hub releases the
/// queue, on a write error, or when the peer stalls past `write_timeout`.
async fn write_loop<S>(
    mut sink: S,
    mut outbound: mpsc::Receiver<Bytes>,
    write_timeout: Duration,
    user_id: i64,
    connection_id: ConnectionId,
) where
    S: Sink<Message> + Unpin,
    S::Error: Display + Send,
{
    while let Some(payload) = outbound.recv().await {
        let frame = match std::str::from_utf8(&payload) {
            Ok(text) => Message::Text(text.into()),
            Err(_) => Message::Binary(payload.clone()),
        };

        match tokio::time::timeout(write_timeout, sink.send(frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!(user_id, %connection_id, error = %e, "WebSocket write error");
                break;
            }
            Err(_) => {
                tracing::warn!(user_id, %connection_id, "WebSocket write timed out");
                break;
            }
        }
    }

    let _ = tokio::time::timeout(write_timeout, sink.close()).await;
}
