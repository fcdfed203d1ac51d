//! Infrastructure layer: configuration, session storage, dependency health.

#[cfg(feature = "redis")]
pub mod cache;
pub mod config;
pub mod health;
pub mod session;

pub use config::{AppConfig, ConfigError, load_config};
