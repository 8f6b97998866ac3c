//! Live feed errors

use orbitwatch_store::StoreError;
use thiserror::Error;

/// Live feed errors
#[derive(Debug, Error)]
pub enum FeedError {
    /// Feed settings rejected
    #[error("Invalid feed configuration: {0}")]
    InvalidConfig(String),

    /// Position store could not be read
    #[error("Position store failure: {0}")]
    Store(#[from] StoreError),

    /// Socket error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket protocol error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Message could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
