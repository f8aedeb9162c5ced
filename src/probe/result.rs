//! Check result value objects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;

use super::error::{ErrorKind, ProbeError};

/// Outcome of a single probe execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Healthy,
    Degraded,
    Error,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Healthy => "healthy",
            CheckStatus::Degraded => "degraded",
            CheckStatus::Error => "error",
        }
    }

    /// Whether this status should pull the aggregate away from Healthy
    pub fn is_problematic(&self) -> bool {
        matches!(self, CheckStatus::Degraded | CheckStatus::Error)
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable result of one probe run.
///
/// Builder-style methods consume `self`, so a result handed to a consumer cannot
/// be altered in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub status: CheckStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Map<String, Value>>,
    pub duration_ms: f64,
    pub timestamp: DateTime<Utc>,
    /// Error taxonomy bucket for Error results produced from a [`ProbeError`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl CheckResult {
    pub fn new(status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
            duration_ms: 0.0,
            timestamp: Utc::now(),
            error_kind: None,
        }
    }

    pub fn healthy(message: impl Into<String>) -> Self {
        Self::new(CheckStatus::Healthy, message)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::new(CheckStatus::Degraded, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(CheckStatus::Error, message)
    }

    /// Convert a typed probe failure into an Error result carrying an
    /// `error_type` detail.
    pub fn from_error(err: &ProbeError) -> Self {
        let mut result = Self::error(err.message.clone()).with_detail("error_type", err.kind.as_str());
        result.error_kind = Some(err.kind);
        result
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_details(mut self, details: Map<String, Value>) -> Self {
        match self.details.as_mut() {
            Some(existing) => existing.extend(details),
            None => self.details = Some(details),
        }
        self
    }

    /// Stamp the wall-clock duration and completion time
    pub fn with_duration(mut self, elapsed: Duration) -> Self {
        self.duration_ms = elapsed.as_secs_f64() * 1000.0;
        self.timestamp = Utc::now();
        self
    }

    pub fn is_healthy(&self) -> bool {
        self.status == CheckStatus::Healthy
    }

    /// True when this result is a fast-fail rejection rather than a real probe run
    pub fn is_circuit_open(&self) -> bool {
        self.error_kind == Some(ErrorKind::CircuitOpen)
    }

    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details.as_ref().and_then(|d| d.get(key))
    }
}
