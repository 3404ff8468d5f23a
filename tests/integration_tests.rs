//! Integration Tests Entry Point
//!
//! Tests are organized by module:
//! - `api/` - REST, health and websocket endpoint tests
//! - `common/` - Shared test utilities

mod api;
mod common;
