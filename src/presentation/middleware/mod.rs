//! Middleware
//!
//! Tower middleware for request processing.

pub mod auth;
pub mod cors;
pub mod logging;

pub use auth::{auth_middleware, bearer_token, decode_user_id, issue_token, AuthUser, Claims};
pub use cors::create_cors_layer;
pub use logging::track_metrics;
