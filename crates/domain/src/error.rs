//! Domain errors
//!
//! Pure domain errors with no infrastructure dependencies

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid position: {0}")]
    InvalidPosition(String),

    #[error("Invalid pair: {0}")]
    InvalidPair(String),

    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    #[error("Unknown value: {0}")]
    UnknownValue(String),

    #[error("Alert {0} is resolved")]
    AlertNotOpen(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
