//! Result sinks receive every check outcome after a pass.
//!
//! Sinks back persistence of historical results and uptime counters. They run
//! on a detached task, so a slow or failing sink never delays the report.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::Result;
use crate::probe::{CheckResult, CheckStatus};

#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Store the full result of one check run
    async fn record_result(&self, check_name: &str, result: &CheckResult) -> Result<()>;

    /// Update the current status of one check
    async fn record_status(&self, check_name: &str, status: CheckStatus) -> Result<()>;

    fn name(&self) -> &str {
        "unnamed"
    }
}

/// Sink that writes each outcome to the tracing pipeline
#[derive(Debug, Default, Clone)]
pub struct LoggingSink;

#[async_trait]
impl ResultSink for LoggingSink {
    async fn record_result(&self, check_name: &str, result: &CheckResult) -> Result<()> {
        info!(
            check = %check_name,
            status = %result.status,
            duration_ms = result.duration_ms,
            message = %result.message,
            "Check result recorded"
        );
        Ok(())
    }

    async fn record_status(&self, _check_name: &str, _status: CheckStatus) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "logging"
    }
}

/// Deliver results to every sink on a detached task
pub(crate) fn emit(sinks: &[Arc<dyn ResultSink>], entries: Vec<(String, CheckResult)>) {
    if sinks.is_empty() || entries.is_empty() {
        return;
    }

    let sinks: Vec<Arc<dyn ResultSink>> = sinks.to_vec();
    tokio::spawn(async move {
        for sink in &sinks {
            for (check_name, result) in &entries {
                if let Err(e) = sink.record_result(check_name, result).await {
                    warn!(
                        sink = sink.name(),
                        check = %check_name,
                        error = %e,
                        "Result sink failed to record result"
                    );
                }
                if let Err(e) = sink.record_status(check_name, result.status).await {
                    warn!(
                        sink = sink.name(),
                        check = %check_name,
                        error = %e,
                        "Result sink failed to record status"
                    );
                }
            }
        }
    });
}
