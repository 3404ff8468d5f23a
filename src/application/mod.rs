//! Application Layer
//!
//! Contains business logic services and data transfer objects (DTOs).
//! This layer orchestrates the flow of data between the presentation
//! and domain layers, and hands finished events to the hub.

pub mod services;
pub mod dto;
