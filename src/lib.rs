//! # Chat Hub Library
//!
//! A chat server built around a real-time fan-out hub:
//! - WebSocket connections authenticated with JWT
//! - A single-task hub that tracks which connection is subscribed to which
//!   chat and delivers events without ever blocking on a slow client
//! - A small REST API for chats and messages that publishes through the hub
//!
//! ## Architecture
//!
//! - **Domain Layer**: Chat and message entities, repository traits
//! - **Application Layer**: Chat service, DTOs and realtime events
//! - **Infrastructure Layer**: In-memory persistence and Prometheus metrics
//! - **Presentation Layer**: HTTP handlers, middleware and the websocket hub
//!
//! ## Module Structure
//!
//! ```text
//! chat_hub/
//! +-- config/         Configuration management
//! +-- domain/         Entities and repository traits
//! +-- application/    Services and DTOs
//! +-- infrastructure/ Persistence and metrics
//! +-- presentation/   HTTP routes, middleware, websocket hub
//! +-- shared/         Error types
//! ```

// Configuration module
pub mod config;

// Domain layer
pub mod domain;

// Application layer
pub mod application;

// Infrastructure layer
pub mod infrastructure;

// Presentation layer - HTTP and WebSocket handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
