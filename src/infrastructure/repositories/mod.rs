//! Repository Implementations
//!
//! Implementations of the domain repository traits. The in-memory store
//! stands in for the chat persistence service; a database-backed
//! implementation only has to provide the same traits.

pub mod memory;

pub use memory::InMemoryStore;
