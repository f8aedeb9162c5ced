//! Memory pressure alerts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered severity: Warning < Critical < Emergency
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Warning,
    Critical,
    Emergency,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Warning => "warning",
            AlertLevel::Critical => "critical",
            AlertLevel::Emergency => "emergency",
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an alert measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    MemoryUsage,
    Fragmentation,
    HitRatio,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryAlert {
    pub kind: AlertKind,
    pub level: AlertLevel,
    pub message: String,
    pub threshold_value: f64,
    pub current_value: f64,
    pub recommended_action: String,
    pub timestamp: DateTime<Utc>,
}

impl MemoryAlert {
    pub fn new(
        kind: AlertKind,
        level: AlertLevel,
        message: impl Into<String>,
        threshold_value: f64,
        current_value: f64,
        recommended_action: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            level,
            message: message.into(),
            threshold_value,
            current_value,
            recommended_action: recommended_action.into(),
            timestamp: Utc::now(),
        }
    }
}
