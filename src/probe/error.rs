//! Typed probe failures.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Closed set of failure categories every probe adapter maps into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Probe exceeded its time bound
    Timeout,
    /// Dependency unreachable or refused the connection
    ConnectionFailure,
    /// Malformed configuration, missing credentials or certificates
    ValidationFailure,
    /// Fast-fail rejection by an open circuit breaker
    CircuitOpen,
    /// Unexpected condition inside the probe or the orchestration logic
    InternalError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::ConnectionFailure => "connection_failure",
            ErrorKind::ValidationFailure => "validation_failure",
            ErrorKind::CircuitOpen => "circuit_open",
            ErrorKind::InternalError => "internal_error",
        }
    }

    /// Connectivity and timeout failures are the only ones a circuit breaker counts
    pub fn is_connectivity(&self) -> bool {
        matches!(self, ErrorKind::Timeout | ErrorKind::ConnectionFailure)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ProbeError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ProbeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConnectionFailure, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValidationFailure, message)
    }

    pub fn circuit_open(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CircuitOpen, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalError, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connectivity_classification() {
        assert!(ErrorKind::Timeout.is_connectivity());
        assert!(ErrorKind::ConnectionFailure.is_connectivity());
        assert!(!ErrorKind::ValidationFailure.is_connectivity());
        assert!(!ErrorKind::CircuitOpen.is_connectivity());
        assert!(!ErrorKind::InternalError.is_connectivity());
    }

    #[test]
    fn test_display() {
        let err = ProbeError::timeout("timed out after 5 s");
        assert_eq!(err.to_string(), "timeout: timed out after 5 s");
    }
}
