//! # Circuit Breaker Configuration
//!
//! Configuration for a single circuit breaker. File-based settings live in
//! [`crate::config::CircuitBreakerSettings`] and convert into this type.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a single circuit breaker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive connectivity failures before opening the circuit
    pub failure_threshold: u32,

    /// Time to stay open before a half-open trial is permitted
    pub open_duration: Duration,
}

impl CircuitBreakerConfig {
    /// Flaky third-party HTTP APIs
    pub fn for_external_api() -> Self {
        Self {
            failure_threshold: 5,
            open_duration: Duration::from_secs(60),
        }
    }

    /// Message broker connections
    pub fn for_broker() -> Self {
        Self {
            failure_threshold: 3,
            open_duration: Duration::from_secs(30),
        }
    }

    /// Object storage endpoints
    pub fn for_object_storage() -> Self {
        Self {
            failure_threshold: 5,
            open_duration: Duration::from_secs(45),
        }
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.failure_threshold == 0 {
            return Err("failure_threshold must be greater than 0".to_string());
        }

        if self.failure_threshold > 100 {
            return Err("failure_threshold should not exceed 100".to_string());
        }

        if self.open_duration.is_zero() {
            return Err("open_duration must be greater than 0".to_string());
        }

        if self.open_duration > Duration::from_secs(3600) {
            return Err("open_duration should not exceed 3600 seconds".to_string());
        }

        Ok(())
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_duration: Duration::from_secs(60),
        }
    }
}
