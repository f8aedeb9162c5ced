//! # Orchestrator
//!
//! Runs registered checks and folds their results into an [`AggregatedReport`].
//!
//! ## Execution model
//!
//! - Parallel passes fan out one task per check, admitted through a semaphore
//!   sized to the configured concurrency (default: available cores).
//! - Each check runs under its own [`TimeoutGuard`](crate::resilience::TimeoutGuard).
//! - The pass as a whole is joined against a pool deadline. Checks that miss it
//!   are reported as Timeout and left running in the background.
//! - A check still in flight from an earlier pass is not started again; the
//!   pass reports its last result instead.

use opentelemetry::KeyValue;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::registry::{CheckRegistry, RegisteredCheck};
use super::report::AggregatedReport;
use super::sink::{self, ResultSink};
use crate::config::OrchestratorConfig;
use crate::error::{HealthError, Result};
use crate::logging::log_check_operation;
use crate::probe::{CheckResult, ErrorKind, ProbeError};
use crate::telemetry;

/// Which checks a pass covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PassScope {
    All,
    CriticalOnly,
}

impl PassScope {
    fn as_str(&self) -> &'static str {
        match self {
            PassScope::All => "all",
            PassScope::CriticalOnly => "critical",
        }
    }
}

pub struct Orchestrator {
    registry: Arc<CheckRegistry>,
    semaphore: Arc<Semaphore>,
    max_concurrency: usize,
    pool_timeout: Duration,
    started_at: Instant,
    sinks: Vec<Arc<dyn ResultSink>>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("checks", &self.registry.len())
            .field("max_concurrency", &self.max_concurrency)
            .field("pool_timeout", &self.pool_timeout)
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl Orchestrator {
    pub fn new(registry: Arc<CheckRegistry>, config: &OrchestratorConfig) -> Self {
        let max_concurrency = config.effective_concurrency();
        info!(
            max_concurrency = max_concurrency,
            pool_timeout_ms = config.pool_timeout_ms,
            "Initializing health check orchestrator"
        );

        Self {
            registry,
            semaphore: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
            pool_timeout: config.pool_timeout(),
            started_at: Instant::now(),
            sinks: Vec::new(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn registry(&self) -> &Arc<CheckRegistry> {
        &self.registry
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Run a single check by name and record its result
    #[instrument(skip(self))]
    pub async fn run_one(&self, name: &str) -> Result<CheckResult> {
        let check = self
            .registry
            .get(name)
            .ok_or_else(|| HealthError::CheckNotFound(name.to_string()))?;

        let result = execute_check(check).await;
        sink::emit(&self.sinks, vec![(name.to_string(), result.clone())]);
        Ok(result)
    }

    /// Run every registered check and aggregate the results
    ///
    /// `parallel = false` runs checks one after another in registration order.
    #[instrument(skip(self))]
    pub async fn run_all(&self, parallel: bool) -> AggregatedReport {
        self.run_pass(PassScope::All, parallel).await
    }

    /// Run only critical checks, in parallel
    #[instrument(skip(self))]
    pub async fn run_critical_only(&self) -> AggregatedReport {
        self.run_pass(PassScope::CriticalOnly, true).await
    }

    async fn run_pass(&self, scope: PassScope, parallel: bool) -> AggregatedReport {
        let checks = match scope {
            PassScope::All => self.registry.checks(),
            PassScope::CriticalOnly => self.registry.critical_checks(),
        };
        let deadline = Instant::now() + self.pool_timeout;
        let pass_start = Instant::now();

        debug!(
            scope = scope.as_str(),
            checks = checks.len(),
            parallel = parallel,
            "Starting health check pass"
        );

        let entries = if parallel {
            self.run_parallel(checks, deadline, pass_start).await
        } else {
            self.run_sequential(checks, deadline, pass_start).await
        };

        sink::emit(
            &self.sinks,
            entries
                .iter()
                .map(|(name, _, result)| (name.clone(), result.clone()))
                .collect(),
        );

        let report = AggregatedReport::from_entries(entries, self.uptime_seconds());

        telemetry::check_passes_total().add(
            1,
            &[
                KeyValue::new("overall_status", report.overall_status.as_str()),
                KeyValue::new("scope", scope.as_str()),
            ],
        );

        info!(
            run_id = %report.run_id,
            scope = scope.as_str(),
            overall_status = %report.overall_status,
            total = report.summary.total,
            errors = report.summary.errors,
            degraded = report.summary.degraded,
            circuit_open = report.summary.circuit_open,
            duration_ms = pass_start.elapsed().as_millis() as u64,
            "Health check pass completed"
        );

        report
    }

    async fn run_parallel(
        &self,
        checks: Vec<Arc<RegisteredCheck>>,
        deadline: Instant,
        pass_start: Instant,
    ) -> Vec<(String, bool, CheckResult)> {
        let handles: Vec<_> = checks
            .into_iter()
            .map(|check| {
                let name = check.name().to_string();
                let critical = check.is_critical();
                let semaphore = Arc::clone(&self.semaphore);
                let handle = tokio::spawn(async move {
                    let _permit = match semaphore.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => {
                            return CheckResult::from_error(&ProbeError::internal(
                                "worker pool closed",
                            ))
                        }
                    };
                    execute_check(check).await
                });
                (name, critical, handle)
            })
            .collect();

        let mut entries = Vec::with_capacity(handles.len());
        for (name, critical, handle) in handles {
            let result = match tokio::time::timeout_at(deadline, handle).await {
                Ok(Ok(result)) => result,
                Ok(Err(join_error)) => {
                    crate::logging::log_error(
                        "orchestrator",
                        "run_all",
                        &join_error.to_string(),
                        Some(&name),
                    );
                    CheckResult::from_error(&ProbeError::internal(format!(
                        "check task failed: {join_error}"
                    )))
                    .with_duration(pass_start.elapsed())
                }
                Err(_) => self.pool_deadline_result(&name, pass_start),
            };
            entries.push((name, critical, result));
        }
        entries
    }

    async fn run_sequential(
        &self,
        checks: Vec<Arc<RegisteredCheck>>,
        deadline: Instant,
        pass_start: Instant,
    ) -> Vec<(String, bool, CheckResult)> {
        let mut entries = Vec::with_capacity(checks.len());
        for check in checks {
            let name = check.name().to_string();
            let critical = check.is_critical();
            let result = match tokio::time::timeout_at(deadline, execute_check(check)).await {
                Ok(result) => result,
                Err(_) => self.pool_deadline_result(&name, pass_start),
            };
            entries.push((name, critical, result));
        }
        entries
    }

    fn pool_deadline_result(&self, name: &str, pass_start: Instant) -> CheckResult {
        warn!(
            check = %name,
            pool_timeout_ms = self.pool_timeout.as_millis() as u64,
            "Check missed the pool deadline"
        );
        CheckResult::from_error(&ProbeError::timeout(format!(
            "timed out after {} s",
            self.pool_timeout.as_secs_f64()
        )))
        .with_detail("pool_deadline", true)
        .with_duration(pass_start.elapsed())
    }
}

/// Run one check under its guard, unless another pass already has it in flight
async fn execute_check(check: Arc<RegisteredCheck>) -> CheckResult {
    let Some(_claim) = check.try_claim() else {
        debug!(check = %check.name(), "Check already in flight, reporting last result");
        return check.last_result().unwrap_or_else(|| {
            CheckResult::from_error(&ProbeError::new(
                ErrorKind::InternalError,
                "check is still running from a previous pass and has no prior result",
            ))
            .with_detail("in_flight", true)
        });
    };

    let result = check.guard().run().await;
    check.record(&result);

    let labels = [KeyValue::new("check", check.name().to_string())];
    telemetry::check_runs_total().add(
        1,
        &[
            KeyValue::new("check", check.name().to_string()),
            KeyValue::new("status", result.status.as_str()),
        ],
    );
    telemetry::check_duration_ms().record(result.duration_ms, &labels);

    log_check_operation(
        check.name(),
        check.is_critical(),
        result.status,
        result.duration_ms,
        (!result.is_healthy()).then_some(result.message.as_str()),
    );

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::OverallStatus;
    use crate::probe::{CheckStatus, FnProbe, Probe};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config() -> OrchestratorConfig {
        OrchestratorConfig {
            max_concurrency: 4,
            ..OrchestratorConfig::default()
        }
    }

    fn fixed(status: CheckStatus) -> Arc<dyn Probe> {
        Arc::new(FnProbe::new(move || async move {
            Ok(CheckResult::new(status, status.as_str()))
        }))
    }

    #[tokio::test]
    async fn test_run_one_unknown_check() {
        let orchestrator = Orchestrator::new(Arc::new(CheckRegistry::default()), &config());
        let err = orchestrator.run_one("missing").await.unwrap_err();
        assert!(matches!(err, HealthError::CheckNotFound(_)));
    }

    #[tokio::test]
    async fn test_run_one_records_last_result() {
        let registry = Arc::new(CheckRegistry::default());
        registry
            .register("cache", fixed(CheckStatus::Degraded), true)
            .unwrap();
        let orchestrator = Orchestrator::new(Arc::clone(&registry), &config());

        let result = orchestrator.run_one("cache").await.unwrap();
        assert_eq!(result.status, CheckStatus::Degraded);
        assert!(result.duration_ms >= 0.0);

        let check = registry.get("cache").unwrap();
        assert_eq!(check.last_result().unwrap().status, CheckStatus::Degraded);
        assert!(check.last_run().is_some());
    }

    #[tokio::test]
    async fn test_sequential_pass_follows_registration_order() {
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let registry = Arc::new(CheckRegistry::default());
        for name in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            registry
                .register(
                    name,
                    Arc::new(FnProbe::new(move || {
                        let order = Arc::clone(&order);
                        async move {
                            order.lock().push(name);
                            Ok(CheckResult::healthy("ok"))
                        }
                    })),
                    false,
                )
                .unwrap();
        }

        let orchestrator = Orchestrator::new(registry, &config());
        let report = orchestrator.run_all(false).await;

        assert_eq!(report.overall_status, OverallStatus::Healthy);
        assert_eq!(*order.lock(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_pool_deadline_reports_timeout() {
        let registry = Arc::new(CheckRegistry::default());
        registry
            .register_with_timeout(
                "slow_scan",
                Arc::new(FnProbe::new(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(CheckResult::healthy("late"))
                })),
                false,
                Duration::from_secs(10),
            )
            .unwrap();
        registry
            .register("database", fixed(CheckStatus::Healthy), true)
            .unwrap();

        let orchestrator = Orchestrator::new(
            registry,
            &OrchestratorConfig {
                max_concurrency: 4,
                pool_timeout_ms: 100,
                ..OrchestratorConfig::default()
            },
        );
        let report = orchestrator.run_all(true).await;

        let slow = report.check("slow_scan").unwrap();
        assert_eq!(slow.error_kind, Some(ErrorKind::Timeout));
        assert_eq!(report.check("database").unwrap().status, CheckStatus::Healthy);
        assert_eq!(report.overall_status, OverallStatus::Degraded);
    }

    #[tokio::test]
    async fn test_overlapping_pass_reports_last_result() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = Arc::new(CheckRegistry::default());
        let probe_calls = Arc::clone(&calls);
        registry
            .register(
                "topology",
                Arc::new(FnProbe::new(move || {
                    let calls = Arc::clone(&probe_calls);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(200)).await;
                        Ok(CheckResult::healthy("quorum met"))
                    }
                })),
                false,
            )
            .unwrap();
        let orchestrator = Arc::new(Orchestrator::new(registry, &config()));

        let background = {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move { orchestrator.run_all(true).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let overlapping = orchestrator.run_all(true).await;
        let result = overlapping.check("topology").unwrap();
        assert_eq!(result.status, CheckStatus::Error);
        assert_eq!(result.detail("in_flight").unwrap(), true);

        let first = background.await.unwrap();
        assert_eq!(first.check("topology").unwrap().status, CheckStatus::Healthy);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
