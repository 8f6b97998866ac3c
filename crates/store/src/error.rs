//! Store errors

use orbitwatch_domain::DomainError;
use thiserror::Error;

/// Errors raised by store backends
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend cannot be reached right now
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// SQLite operation failed
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// No object with this id
    #[error("Object {0} not found")]
    ObjectNotFound(String),

    /// No alert with this id
    #[error("Alert {0} not found")]
    AlertNotFound(String),

    /// Stored data could not be decoded
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// Domain rule rejected the operation
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl StoreError {
    /// Whether the caller is asking about something that does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::ObjectNotFound(_) | StoreError::AlertNotFound(_))
    }
}

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
