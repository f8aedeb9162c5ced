//! # Error Types
//!
//! Crate-level error handling. Probe failures never surface through these types:
//! they are folded into [`CheckResult`](crate::probe::CheckResult) values at the
//! probe boundary. `HealthError` covers the remaining cases, such as registry
//! misuse, configuration problems and administrative operations that cannot reach
//! their backing store.

use thiserror::Error;

use crate::config::ConfigurationError;
use crate::probe::{ErrorKind, ProbeError};

#[derive(Debug, Error)]
pub enum HealthError {
    #[error("Check '{0}' is already registered")]
    DuplicateCheck(String),

    #[error("Check '{0}' is not registered")]
    CheckNotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Connection failure: {0}")]
    ConnectionFailure(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Validation failure: {0}")]
    ValidationFailure(String),

    #[error("Circuit breaker open: {0}")]
    CircuitOpen(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HealthError {
    /// The error taxonomy bucket this error belongs to
    pub fn kind(&self) -> ErrorKind {
        match self {
            HealthError::ConnectionFailure(_) => ErrorKind::ConnectionFailure,
            HealthError::Timeout(_) => ErrorKind::Timeout,
            HealthError::Configuration(_) | HealthError::ValidationFailure(_) => {
                ErrorKind::ValidationFailure
            }
            HealthError::CircuitOpen(_) => ErrorKind::CircuitOpen,
            HealthError::DuplicateCheck(_)
            | HealthError::CheckNotFound(_)
            | HealthError::Internal(_) => ErrorKind::InternalError,
        }
    }
}

impl From<ProbeError> for HealthError {
    fn from(err: ProbeError) -> Self {
        match err.kind {
            ErrorKind::Timeout => HealthError::Timeout(err.message),
            ErrorKind::ConnectionFailure => HealthError::ConnectionFailure(err.message),
            ErrorKind::ValidationFailure => HealthError::ValidationFailure(err.message),
            ErrorKind::CircuitOpen => HealthError::CircuitOpen(err.message),
            ErrorKind::InternalError => HealthError::Internal(err.message),
        }
    }
}

pub type Result<T> = std::result::Result<T, HealthError>;
