//! # Timeout Guard
//!
//! Bounds the wall-clock time a caller spends waiting on a probe. The probe runs
//! in its own spawned task; when the deadline passes the guard stops waiting and
//! reports an Error result. The task is detached rather than aborted, so a
//! blocking probe may keep running in the background and callers must not assume
//! its resources were released.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

use crate::probe::{CheckResult, Probe, ProbeError, ProbeResult};

pub struct TimeoutGuard {
    probe: Arc<dyn Probe>,
    timeout: Duration,
}

impl TimeoutGuard {
    pub fn new(probe: Arc<dyn Probe>, timeout: Duration) -> Self {
        Self { probe, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run the probe and convert every outcome into a stamped [`CheckResult`]
    pub async fn run(&self) -> CheckResult {
        let start = Instant::now();
        let probe = Arc::clone(&self.probe);
        let handle = tokio::spawn(async move { probe.check().await });

        let result = match tokio::time::timeout(self.timeout, handle).await {
            Ok(Ok(Ok(result))) => result,
            Ok(Ok(Err(probe_error))) => CheckResult::from_error(&probe_error),
            Ok(Err(join_error)) => {
                let message = if join_error.is_panic() {
                    "probe panicked".to_string()
                } else {
                    format!("probe task cancelled: {join_error}")
                };
                CheckResult::from_error(&ProbeError::internal(message))
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Probe exceeded its timeout, abandoning wait"
                );
                CheckResult::from_error(&ProbeError::timeout(timeout_message(self.timeout)))
                    .with_detail("timeout_seconds", self.timeout.as_secs_f64())
            }
        };

        result.with_duration(start.elapsed())
    }
}

pub(crate) fn timeout_message(timeout: Duration) -> String {
    format!("timed out after {} s", timeout.as_secs_f64())
}

#[async_trait]
impl Probe for TimeoutGuard {
    async fn check(&self) -> ProbeResult {
        Ok(self.run().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{CheckStatus, ErrorKind, FnProbe};

    #[tokio::test]
    async fn test_passes_through_fast_probe() {
        let guard = TimeoutGuard::new(
            Arc::new(FnProbe::new(|| async { Ok(CheckResult::healthy("ok")) })),
            Duration::from_secs(1),
        );

        let result = guard.run().await;
        assert_eq!(result.status, CheckStatus::Healthy);
        assert!(result.duration_ms >= 0.0);
    }

    #[tokio::test]
    async fn test_hanging_probe_times_out() {
        let guard = TimeoutGuard::new(
            Arc::new(FnProbe::new(|| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(CheckResult::healthy("too late"))
            })),
            Duration::from_millis(50),
        );

        let result = guard.run().await;
        assert_eq!(result.status, CheckStatus::Error);
        assert_eq!(result.error_kind, Some(ErrorKind::Timeout));
        assert_eq!(result.message, "timed out after 0.05 s");
        assert!(result.duration_ms < 5_000.0);
    }

    #[tokio::test]
    async fn test_probe_error_becomes_result() {
        let guard = TimeoutGuard::new(
            Arc::new(FnProbe::new(|| async {
                Err(ProbeError::connection("connection refused"))
            })),
            Duration::from_secs(1),
        );

        let result = guard.run().await;
        assert_eq!(result.status, CheckStatus::Error);
        assert_eq!(result.detail("error_type").unwrap(), "connection_failure");
    }

    #[tokio::test]
    async fn test_panicking_probe_is_contained() {
        let guard = TimeoutGuard::new(
            Arc::new(FnProbe::new(|| async {
                if true {
                    panic!("probe bug");
                }
                Ok(CheckResult::healthy("unreachable"))
            })),
            Duration::from_secs(1),
        );

        let result = guard.run().await;
        assert_eq!(result.error_kind, Some(ErrorKind::InternalError));
    }

    #[test]
    fn test_timeout_message_format() {
        assert_eq!(timeout_message(Duration::from_secs(5)), "timed out after 5 s");
    }
}
