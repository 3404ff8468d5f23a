//! # Domain Layer
//!
//! Chats, messages and the repository traits the request layer persists
//! them through. The fan-out hub never depends on this layer; only the
//! connection reader (to authorize joins) and the chat service do.

pub mod entities;

pub use entities::*;
