//! # Health Endpoints
//!
//! Transport-agnostic handlers behind `/alive`, `/ready` and `/health`. A web or
//! CLI front end maps [`EndpointResponse::http_status`] and the serialized body
//! onto its own response type.
//!
//! Handlers never fail: an empty registry, a panic inside aggregation or any
//! other internal problem yields an Unhealthy response.

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error};

use crate::orchestration::{AggregatedReport, Orchestrator, OverallStatus};

/// Liveness body: `{status: "alive", uptime_seconds}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivenessResponse {
    pub status: String,
    pub uptime_seconds: u64,
    pub timestamp: DateTime<Utc>,
}

/// Readiness or full health body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointResponse {
    pub http_status: u16,
    pub status: OverallStatus,
    /// `ready` / `not_ready` for readiness, the overall status otherwise
    pub verdict: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<AggregatedReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EndpointResponse {
    fn from_report(report: AggregatedReport, verdict: String) -> Self {
        Self {
            http_status: report.overall_status.http_status(),
            status: report.overall_status,
            verdict,
            report: Some(report),
            error: None,
        }
    }

    fn unhealthy(verdict: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            http_status: OverallStatus::Unhealthy.http_status(),
            status: OverallStatus::Unhealthy,
            verdict: verdict.into(),
            report: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HealthEndpoints {
    orchestrator: Arc<Orchestrator>,
}

impl HealthEndpoints {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Process liveness; performs no I/O and never runs probes
    pub fn liveness(&self) -> LivenessResponse {
        LivenessResponse {
            status: "alive".to_string(),
            uptime_seconds: self.orchestrator.uptime_seconds(),
            timestamp: Utc::now(),
        }
    }

    /// Critical checks only; Healthy and Degraded are ready (200), Unhealthy is not (503)
    pub async fn readiness(&self) -> EndpointResponse {
        debug!("Performing readiness probe");
        if self.orchestrator.registry().is_empty() {
            return EndpointResponse::unhealthy("not_ready", "no health checks registered");
        }

        let orchestrator = Arc::clone(&self.orchestrator);
        match AssertUnwindSafe(async move { orchestrator.run_critical_only().await })
            .catch_unwind()
            .await
        {
            Ok(report) => {
                let verdict = if report.overall_status.is_ready() {
                    "ready"
                } else {
                    "not_ready"
                };
                EndpointResponse::from_report(report, verdict.to_string())
            }
            Err(_) => {
                error!("Readiness evaluation panicked");
                EndpointResponse::unhealthy("not_ready", "internal error during readiness evaluation")
            }
        }
    }

    /// Every registered check; Healthy and Degraded map to 200, Unhealthy to 503
    pub async fn full_health(&self) -> EndpointResponse {
        debug!("Performing full health check");
        if self.orchestrator.registry().is_empty() {
            return EndpointResponse::unhealthy(
                OverallStatus::Unhealthy.as_str(),
                "no health checks registered",
            );
        }

        let orchestrator = Arc::clone(&self.orchestrator);
        match AssertUnwindSafe(async move { orchestrator.run_all(true).await })
            .catch_unwind()
            .await
        {
            Ok(report) => {
                let verdict = report.overall_status.as_str().to_string();
                EndpointResponse::from_report(report, verdict)
            }
            Err(_) => {
                error!("Full health evaluation panicked");
                EndpointResponse::unhealthy(
                    OverallStatus::Unhealthy.as_str(),
                    "internal error during health evaluation",
                )
            }
        }
    }
}
