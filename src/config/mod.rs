//! # Configuration Module
//!
//! Configuration can be loaded from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/{environment}.toml)
//! - .env files (via dotenvy)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use chat_hub::config::Settings;
//!
//! let settings = Settings::load()?;
//! println!("Outbound queue capacity: {}", settings.hub.outbound_capacity);
//! ```

mod settings;

pub use settings::*;
