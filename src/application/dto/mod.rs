//! Data Transfer Objects
//!
//! DTOs for API request/response serialization and realtime events.

pub mod events;
pub mod request;
pub mod response;

pub use events::ChatEvent;
