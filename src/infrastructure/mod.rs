//! Infrastructure Layer
//!
//! Contains implementations for external services including:
//! - Chat persistence (in-memory repositories)
//! - Prometheus metrics

pub mod metrics;
pub mod repositories;
