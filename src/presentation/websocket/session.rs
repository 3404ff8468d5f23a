//! Connection Handle
//!
//! Server-side state for one live client connection, owned by the hub once
//! registered.

use std::collections::HashSet;
use std::fmt;

use bytes::Bytes;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Distinguishes successive connections of the same user, so commands from
/// a replaced connection cannot touch its successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Result of trying to queue a payload for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Queued,
    /// Queue at capacity: the peer is not keeping up.
    Full,
    /// Writer is gone.
    Closed,
}

/// Hub-side state for one connection.
///
/// Holds the only sender of the outbound queue; dropping the handle closes
/// the queue and lets the writer task finish.
#[derive(Debug)]
pub struct ConnectionHandle {
    user_id: i64,
    connection_id: ConnectionId,
    outbound: mpsc::Sender<Bytes>,
    joined: HashSet<i64>,
}

impl ConnectionHandle {
    /// Create a handle with a fresh bounded outbound queue.
    /// The receiver goes to the connection's writer task.
    pub fn new(user_id: i64, capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (outbound, rx) = mpsc::channel(capacity);
        let handle = Self {
            user_id,
            connection_id: ConnectionId::new(),
            outbound,
            joined: HashSet::new(),
        };
        (handle, rx)
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn joined(&self) -> &HashSet<i64> {
        &self.joined
    }

    pub fn has_joined(&self, chat_id: i64) -> bool {
        self.joined.contains(&chat_id)
    }

    pub(crate) fn record_join(&mut self, chat_id: i64) -> bool {
        self.joined.insert(chat_id)
    }

    pub(crate) fn record_leave(&mut self, chat_id: i64) -> bool {
        self.joined.remove(&chat_id)
    }

    /// Queue a payload without waiting.
    pub fn try_deliver(&self, payload: Bytes) -> Delivery {
        match self.outbound.try_send(payload) {
            Ok(()) => Delivery::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => Delivery::Full,
            Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Closed,
        }
    }
}
