//! WebSocket Fan-out
//!
//! Real-time delivery over websocket connections: the [`Hub`] actor, the
//! room registry it owns, and the per-connection reader/writer tasks.

pub mod connection;
pub mod handler;
pub mod hub;
pub mod messages;
pub mod rooms;
pub mod session;

pub use connection::Connection;
pub use handler::ws_handler;
pub use hub::{EvictionReason, Hub, HubCommand, HubError, HubHandle, HubStats};
pub use messages::{BroadcastEnvelope, ClientAction, FrameError, FrameKind, InboundFrame};
pub use rooms::RoomRegistry;
pub use session::{ConnectionHandle, ConnectionId, Delivery};
