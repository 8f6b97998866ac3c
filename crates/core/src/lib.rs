//! Core functionality shared by OrbitWatch services.
//!
//! This crate provides configuration loading and logging initialization
//! used across the OrbitWatch workspace.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{env_override, load_toml};
pub use error::{ConfigError, Result};
pub use logging::LogFormat;
