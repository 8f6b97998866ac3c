//! Core error types

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("Failed to read configuration file {path}: {source}")]
    Read {
        /// File that failed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid TOML for the expected schema
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Environment variable holds an unusable value
    #[error("Invalid value {value:?} for {key}: {reason}")]
    InvalidEnv {
        /// Variable name
        key: String,
        /// Raw value
        value: String,
        /// Parse failure
        reason: String,
    },

    /// Values parsed but are inconsistent
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Result type alias for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;
