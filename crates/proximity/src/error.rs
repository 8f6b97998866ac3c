//! Proximity errors

use orbitwatch_domain::DomainError;
use orbitwatch_store::StoreError;
use thiserror::Error;

/// Errors raised by the scanner and the alert desk
#[derive(Debug, Error)]
pub enum ProximityError {
    /// Thresholds do not form a coherent policy
    #[error("Invalid proximity policy: {0}")]
    InvalidPolicy(String),

    /// Position store could not be read
    #[error("Position store failure: {0}")]
    PositionStore(#[source] StoreError),

    /// Alert store could not be read or written
    #[error("Alert store failure: {0}")]
    AlertStore(#[source] StoreError),

    /// No alert with this id
    #[error("Alert {0} not found")]
    AlertNotFound(String),

    /// Operation needs an open alert
    #[error("Alert {0} is already resolved")]
    AlertNotOpen(String),
}

impl ProximityError {
    /// Map an alert store error, lifting not-found and lifecycle conditions
    pub fn from_alert_store(err: StoreError) -> Self {
        match err {
            StoreError::AlertNotFound(id) => ProximityError::AlertNotFound(id),
            StoreError::Domain(DomainError::AlertNotOpen(id)) => ProximityError::AlertNotOpen(id),
            other => ProximityError::AlertStore(other),
        }
    }

    /// Whether the target of an operator action does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProximityError::AlertNotFound(_))
    }
}

/// Result type alias for proximity operations
pub type Result<T> = std::result::Result<T, ProximityError>;
