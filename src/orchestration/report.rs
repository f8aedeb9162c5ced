//! # Aggregated Reports
//!
//! Folding individual check results into one verdict.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::probe::{CheckResult, CheckStatus};

/// Overall verdict of a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl OverallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverallStatus::Healthy => "healthy",
            OverallStatus::Degraded => "degraded",
            OverallStatus::Unhealthy => "unhealthy",
        }
    }

    /// Healthy and Degraded both accept traffic
    pub fn is_ready(&self) -> bool {
        !matches!(self, OverallStatus::Unhealthy)
    }

    pub fn http_status(&self) -> u16 {
        if self.is_ready() {
            200
        } else {
            503
        }
    }
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregation rule over `(critical, status)` pairs
///
/// Any critical Error makes the pass Unhealthy. Otherwise any Error or Degraded
/// result makes it Degraded. Otherwise it is Healthy, including the empty case.
pub fn aggregate_status<I>(entries: I) -> OverallStatus
where
    I: IntoIterator<Item = (bool, CheckStatus)>,
{
    let mut overall = OverallStatus::Healthy;
    for (critical, status) in entries {
        match status {
            CheckStatus::Error if critical => return OverallStatus::Unhealthy,
            CheckStatus::Error | CheckStatus::Degraded => overall = OverallStatus::Degraded,
            CheckStatus::Healthy => {}
        }
    }
    overall
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub healthy: usize,
    pub degraded: usize,
    /// Error results, circuit-open rejections included
    pub errors: usize,
    /// Subset of `errors` rejected by an open circuit breaker
    pub circuit_open: usize,
    pub healthy_percentage: f64,
}

impl Summary {
    pub fn from_results<'a, I>(results: I) -> Self
    where
        I: IntoIterator<Item = &'a CheckResult>,
    {
        let mut summary = Summary::default();
        for result in results {
            summary.total += 1;
            match result.status {
                CheckStatus::Healthy => summary.healthy += 1,
                CheckStatus::Degraded => summary.degraded += 1,
                CheckStatus::Error => {
                    summary.errors += 1;
                    if result.is_circuit_open() {
                        summary.circuit_open += 1;
                    }
                }
            }
        }

        summary.healthy_percentage = if summary.total == 0 {
            0.0
        } else {
            let raw = summary.healthy as f64 * 100.0 / summary.total as f64;
            (raw * 100.0).round() / 100.0
        };
        summary
    }
}

/// Result of one orchestrated pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedReport {
    pub run_id: Uuid,
    pub overall_status: OverallStatus,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub checks: BTreeMap<String, CheckResult>,
    /// Critical checks that reported Error, in name order
    pub critical_failures: Vec<String>,
    pub summary: Summary,
}

impl AggregatedReport {
    /// Build a report from `(name, critical, result)` entries
    pub fn from_entries(entries: Vec<(String, bool, CheckResult)>, uptime_seconds: u64) -> Self {
        let overall_status =
            aggregate_status(entries.iter().map(|(_, critical, r)| (*critical, r.status)));

        let mut critical_failures: Vec<String> = entries
            .iter()
            .filter(|(_, critical, r)| *critical && r.status == CheckStatus::Error)
            .map(|(name, _, _)| name.clone())
            .collect();
        critical_failures.sort();

        let checks: BTreeMap<String, CheckResult> = entries
            .into_iter()
            .map(|(name, _, result)| (name, result))
            .collect();
        let summary = Summary::from_results(checks.values());

        Self {
            run_id: Uuid::new_v4(),
            overall_status,
            timestamp: Utc::now(),
            uptime_seconds,
            checks,
            critical_failures,
            summary,
        }
    }

    pub fn check(&self, name: &str) -> Option<&CheckResult> {
        self.checks.get(name)
    }
}
