//! Fan-out Hub
//!
//! Single owner of the live-connection table and the room registry. Every
//! registration change and every broadcast arrives as a [`HubCommand`] on a
//! bounded mailbox and is applied by one task, one command at a time, so the
//! state needs no locks and each step is atomic relative to the others.
//!
//! Delivery never waits on a consumer: a connection whose outbound queue is
//! full when a broadcast arrives is evicted on the spot, exactly as if it
//! had disconnected.

use std::collections::{HashMap, HashSet};

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use super::messages::BroadcastEnvelope;
use super::rooms::RoomRegistry;
use super::session::{ConnectionHandle, ConnectionId, Delivery};
use crate::config::HubSettings;
use crate::infrastructure::metrics;

/// Commands processed by the hub loop.
#[derive(Debug)]
pub enum HubCommand {
    Register(ConnectionHandle),
    Unregister {
        user_id: i64,
        connection_id: ConnectionId,
    },
    Join {
        user_id: i64,
        connection_id: ConnectionId,
        chat_id: i64,
    },
    Leave {
        user_id: i64,
        connection_id: ConnectionId,
        chat_id: i64,
    },
    Broadcast(BroadcastEnvelope),
    Stats(oneshot::Sender<HubStats>),
}

/// Point-in-time counts of hub state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HubStats {
    pub connections: usize,
    pub rooms: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("Hub is not running")]
    Closed,
}

/// Why a connection was removed without asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    /// Same user registered a newer connection
    Replaced,
    /// Outbound queue was full
    SlowConsumer,
    /// Outbound queue receiver was dropped
    WriterGone,
}

impl EvictionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionReason::Replaced => "replaced",
            EvictionReason::SlowConsumer => "slow_consumer",
            EvictionReason::WriterGone => "writer_gone",
        }
    }
}

/// Hub state. Drive it with [`Hub::run`] or [`Hub::spawn`]; the synchronous
/// methods are the individual loop steps.
#[derive(Debug, Default)]
pub struct Hub {
    connections: HashMap<i64, ConnectionHandle>,
    rooms: RoomRegistry,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the hub loop on the tokio runtime and return a handle to it.
    pub fn spawn(settings: &HubSettings) -> HubHandle {
        let (tx, rx) = mpsc::channel(settings.mailbox_capacity);
        tokio::spawn(Hub::new().run(rx));
        HubHandle {
            tx,
            outbound_capacity: settings.outbound_capacity,
        }
    }

    /// Process commands until every [`HubHandle`] is dropped.
    pub async fn run(mut self, mut rx: mpsc::Receiver<HubCommand>) {
        tracing::info!("Hub started");
        while let Some(command) = rx.recv().await {
            self.apply(command);
        }
        tracing::info!(
            connections = self.connections.len(),
            rooms = self.rooms.len(),
            "Hub stopped"
        );
    }

    /// Apply a single command.
    pub fn apply(&mut self, command: HubCommand) {
        match command {
            HubCommand::Register(handle) => {
                self.register(handle);
            }
            HubCommand::Unregister {
                user_id,
                connection_id,
            } => {
                self.unregister(user_id, connection_id);
            }
            HubCommand::Join {
                user_id,
                connection_id,
                chat_id,
            } => {
                self.join_room(user_id, connection_id, chat_id);
            }
            HubCommand::Leave {
                user_id,
                connection_id,
                chat_id,
            } => {
                self.leave_room(user_id, connection_id, chat_id);
            }
            HubCommand::Broadcast(envelope) => {
                self.broadcast(envelope);
            }
            HubCommand::Stats(reply) => {
                let _ = reply.send(self.stats());
            }
        }
        metrics::set_hub_gauges(self.connections.len(), self.rooms.len());
    }

    /// Install a connection. An existing connection for the same user is
    /// fully torn down first; its id is returned.
    pub fn register(&mut self, handle: ConnectionHandle) -> Option<ConnectionId> {
        let user_id = handle.user_id();
        let replaced = self
            .evict(user_id, EvictionReason::Replaced)
            .map(|old| old.connection_id());

        tracing::info!(
            user_id = user_id,
            connection_id = %handle.connection_id(),
            "Client connected"
        );
        self.connections.insert(user_id, handle);
        replaced
    }

    /// Remove a connection and all of its room memberships. Dropping the
    /// handle closes its outbound queue. Returns `false` if `connection_id`
    /// is not the user's live connection (already removed or replaced).
    pub fn unregister(&mut self, user_id: i64, connection_id: ConnectionId) -> bool {
        if !self.is_live(user_id, connection_id) {
            return false;
        }
        if let Some(handle) = self.remove(user_id) {
            tracing::info!(
                user_id = user_id,
                connection_id = %handle.connection_id(),
                "Client disconnected"
            );
        }
        true
    }

    /// Subscribe a live connection to a chat. Returns `false` for a stale
    /// connection or a repeated join.
    pub fn join_room(&mut self, user_id: i64, connection_id: ConnectionId, chat_id: i64) -> bool {
        if !self.is_live(user_id, connection_id) {
            return false;
        }
        let Some(handle) = self.connections.get_mut(&user_id) else {
            return false;
        };
        if !handle.record_join(chat_id) {
            return false;
        }
        self.rooms.join(chat_id, user_id);

        tracing::debug!(user_id = user_id, chat_id = chat_id, "Client joined chat room");
        true
    }

    /// Unsubscribe a live connection from a chat, deleting the room once
    /// empty.
    pub fn leave_room(&mut self, user_id: i64, connection_id: ConnectionId, chat_id: i64) -> bool {
        if !self.is_live(user_id, connection_id) {
            return false;
        }
        let Some(handle) = self.connections.get_mut(&user_id) else {
            return false;
        };
        if !handle.record_leave(chat_id) {
            return false;
        }
        self.rooms.leave(chat_id, user_id);

        tracing::debug!(user_id = user_id, chat_id = chat_id, "Client left chat room");
        true
    }

    /// Queue the payload for every room member except the excluded user.
    /// Members that cannot take it are evicted. A client relay is dropped
    /// unless its connection is live and joined to the chat. Returns the
    /// number of connections the payload was queued for.
    pub fn broadcast(&mut self, envelope: BroadcastEnvelope) -> usize {
        if let (Some(connection_id), Some(user_id)) = (envelope.origin, envelope.exclude) {
            if !self.may_relay(user_id, connection_id, envelope.chat_id) {
                tracing::warn!(
                    user_id = user_id,
                    chat_id = envelope.chat_id,
                    "Relay dropped: sender has not joined chat"
                );
                return 0;
            }
        }

        let Some(members) = self.rooms.members(envelope.chat_id) else {
            return 0;
        };

        let mut delivered = 0;
        let mut dead = Vec::new();
        for user_id in members {
            if envelope.exclude == Some(*user_id) {
                continue;
            }
            let Some(handle) = self.connections.get(user_id) else {
                continue;
            };
            match handle.try_deliver(envelope.payload.clone()) {
                Delivery::Queued => delivered += 1,
                Delivery::Full => dead.push((*user_id, EvictionReason::SlowConsumer)),
                Delivery::Closed => dead.push((*user_id, EvictionReason::WriterGone)),
            }
        }

        for (user_id, reason) in dead {
            self.evict(user_id, reason);
        }

        metrics::record_broadcast(delivered);
        delivered
    }

    pub fn stats(&self) -> HubStats {
        HubStats {
            connections: self.connections.len(),
            rooms: self.rooms.len(),
        }
    }

    pub fn connection(&self, user_id: i64) -> Option<&ConnectionHandle> {
        self.connections.get(&user_id)
    }

    pub fn room_members(&self, chat_id: i64) -> Option<&HashSet<i64>> {
        self.rooms.members(chat_id)
    }

    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    fn is_live(&self, user_id: i64, connection_id: ConnectionId) -> bool {
        self.connections
            .get(&user_id)
            .map(|handle| handle.connection_id() == connection_id)
            .unwrap_or(false)
    }

    fn may_relay(&self, user_id: i64, connection_id: ConnectionId, chat_id: i64) -> bool {
        self.connections
            .get(&user_id)
            .map(|handle| handle.connection_id() == connection_id && handle.has_joined(chat_id))
            .unwrap_or(false)
    }

    fn evict(&mut self, user_id: i64, reason: EvictionReason) -> Option<ConnectionHandle> {
        let handle = self.remove(user_id)?;
        tracing::warn!(
            user_id = user_id,
            connection_id = %handle.connection_id(),
            reason = reason.as_str(),
            "Client evicted"
        );
        metrics::record_eviction(reason.as_str());
        Some(handle)
    }

    /// Drop the user's connection from the live table and every room it
    /// joined, keeping both sides of the membership relation in step.
    fn remove(&mut self, user_id: i64) -> Option<ConnectionHandle> {
        let handle = self.connections.remove(&user_id)?;
        self.rooms.remove_member(user_id, handle.joined());
        Some(handle)
    }
}

/// Cloneable sender side of the hub mailbox.
#[derive(Debug, Clone)]
pub struct HubHandle {
    tx: mpsc::Sender<HubCommand>,
    outbound_capacity: usize,
}

impl HubHandle {
    /// Wrap an existing mailbox, e.g. one drained by a hand-driven [`Hub`].
    pub fn new(tx: mpsc::Sender<HubCommand>, outbound_capacity: usize) -> Self {
        Self {
            tx,
            outbound_capacity,
        }
    }

    /// Create a handle and outbound queue sized for this hub.
    pub fn new_connection(&self, user_id: i64) -> (ConnectionHandle, mpsc::Receiver<Bytes>) {
        ConnectionHandle::new(user_id, self.outbound_capacity)
    }

    pub async fn register(&self, handle: ConnectionHandle) -> Result<(), HubError> {
        self.send(HubCommand::Register(handle)).await
    }

    pub async fn unregister(
        &self,
        user_id: i64,
        connection_id: ConnectionId,
    ) -> Result<(), HubError> {
        self.send(HubCommand::Unregister {
            user_id,
            connection_id,
        })
        .await
    }

    pub async fn join_room(
        &self,
        user_id: i64,
        connection_id: ConnectionId,
        chat_id: i64,
    ) -> Result<(), HubError> {
        self.send(HubCommand::Join {
            user_id,
            connection_id,
            chat_id,
        })
        .await
    }

    pub async fn leave_room(
        &self,
        user_id: i64,
        connection_id: ConnectionId,
        chat_id: i64,
    ) -> Result<(), HubError> {
        self.send(HubCommand::Leave {
            user_id,
            connection_id,
            chat_id,
        })
        .await
    }

    pub async fn broadcast(&self, envelope: BroadcastEnvelope) -> Result<(), HubError> {
        self.send(HubCommand::Broadcast(envelope)).await
    }

    /// Push an event to every subscriber of a chat. Entry point for the
    /// request layer.
    pub async fn broadcast_to_chat(
        &self,
        chat_id: i64,
        payload: impl Into<Bytes>,
        exclude: Option<i64>,
    ) -> Result<(), HubError> {
        self.broadcast(BroadcastEnvelope {
            chat_id,
            payload: payload.into(),
            exclude,
            origin: None,
        })
        .await
    }

    pub async fn stats(&self) -> Result<HubStats, HubError> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::Stats(reply)).await?;
        rx.await.map_err(|_| HubError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn send(&self, command: HubCommand) -> Result<(), HubError> {
        self.tx.send(command).await.map_err(|_| HubError::Closed)
    }
}
