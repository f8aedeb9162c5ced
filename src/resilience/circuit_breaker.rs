//! # Circuit Breaker Implementation
//!
//! Provides fault isolation for flaky external dependencies. This implementation
//! follows the classic circuit breaker pattern with three states: Closed (normal
//! operation), Open (failing fast), and Half-Open (a single trial call testing
//! recovery).
//!
//! The current state lives in an atomic so the fast-fail decision in the Closed
//! state never touches the mutex. The mutex guards transition logic only; the
//! protected operation always runs outside of it.

use chrono::{DateTime, Utc};
use opentelemetry::KeyValue;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::resilience::CircuitBreakerConfig;
use crate::telemetry;

/// Circuit breaker states representing the current operational mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation - all calls are allowed through
    Closed = 0,
    /// Failure mode - all calls fail fast without executing
    Open = 1,
    /// Testing recovery - exactly one trial call is allowed through
    HalfOpen = 2,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Open, // Default to safest state
        }
    }
}

/// Errors that can occur during circuit breaker operation
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    /// Circuit is open, the operation was not attempted
    #[error("circuit breaker open for {component}, retry after {}s", retry_after_secs(.retry_after))]
    CircuitOpen {
        component: String,
        retry_after: Duration,
    },

    /// Operation ran and failed
    #[error("Operation failed: {0}")]
    OperationFailed(E),

    /// Circuit breaker configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

/// Whole seconds a caller should wait, never reported as zero
pub(crate) fn retry_after_secs(retry_after: &Duration) -> u64 {
    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    secs.max(1)
}

/// Point-in-time view of a breaker's state machine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerState {
    pub name: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub failure_threshold: u32,
    pub open_duration_seconds: u64,
}

/// Call statistics for a breaker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerMetrics {
    pub current_state: CircuitState,
    pub total_calls: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub rejected_count: u64,
    pub trips: u64,
    pub failure_rate: f64,
    pub average_duration_ms: f64,
}

/// Lock-free counters updated on every call
#[derive(Debug, Default)]
struct AtomicCircuitBreakerMetrics {
    total_calls: AtomicU64,
    success_count: AtomicU64,
    failure_count: AtomicU64,
    rejected_count: AtomicU64,
    trips: AtomicU64,
    total_duration_nanos: AtomicU64,
}

impl AtomicCircuitBreakerMetrics {
    #[inline]
    fn record_success(&self, duration: Duration) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.success_count.fetch_add(1, Ordering::Relaxed);
        self.total_duration_nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    #[inline]
    fn record_failure(&self, duration: Duration) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.failure_count.fetch_add(1, Ordering::Relaxed);
        self.total_duration_nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    #[inline]
    fn record_rejection(&self) {
        self.rejected_count.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn record_trip(&self) {
        self.trips.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self, state: CircuitState) -> CircuitBreakerMetrics {
        let total_calls = self.total_calls.load(Ordering::Relaxed);
        let failure_count = self.failure_count.load(Ordering::Relaxed);
        let total_duration_nanos = self.total_duration_nanos.load(Ordering::Relaxed);

        let (failure_rate, average_duration_ms) = if total_calls > 0 {
            (
                failure_count as f64 / total_calls as f64,
                total_duration_nanos as f64 / total_calls as f64 / 1_000_000.0,
            )
        } else {
            (0.0, 0.0)
        };

        CircuitBreakerMetrics {
            current_state: state,
            total_calls,
            success_count: self.success_count.load(Ordering::Relaxed),
            failure_count,
            rejected_count: self.rejected_count.load(Ordering::Relaxed),
            trips: self.trips.load(Ordering::Relaxed),
            failure_rate,
            average_duration_ms,
        }
    }
}

/// State touched only while holding the transition lock
#[derive(Debug, Default)]
struct TransitionState {
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
    last_failure_utc: Option<DateTime<Utc>>,
    trial_in_flight: bool,
}

enum Admission {
    Pass,
    Trial,
    Reject { retry_after: Duration },
}

/// Core circuit breaker, shared by every caller targeting the same dependency
#[derive(Debug)]
pub struct CircuitBreaker {
    /// Component name for logging and metrics
    name: String,

    /// Current circuit state (atomic for cheap fast-fail reads)
    state: AtomicU8,

    config: CircuitBreakerConfig,

    metrics: AtomicCircuitBreakerMetrics,

    transitions: Mutex<TransitionState>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given name and configuration
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let name = name.into();
        info!(
            component = %name,
            failure_threshold = config.failure_threshold,
            open_duration_seconds = config.open_duration.as_secs(),
            "Circuit breaker initialized"
        );

        Self {
            name,
            state: AtomicU8::new(CircuitState::Closed as u8),
            config,
            metrics: AtomicCircuitBreakerMetrics::default(),
            transitions: Mutex::new(TransitionState::default()),
        }
    }

    /// Create a breaker after validating its configuration
    pub fn try_new(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
    ) -> Result<Self, CircuitBreakerError<std::convert::Infallible>> {
        config
            .validate()
            .map_err(CircuitBreakerError::ConfigurationError)?;
        Ok(Self::new(name, config))
    }

    /// Get current circuit state
    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::Acquire))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Execute an operation, counting every error as a failure
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.call_with(operation, |_| true).await
    }

    /// Execute an operation with circuit breaker protection.
    ///
    /// `counts_as_failure` decides whether an error reflects an unreachable
    /// dependency. Errors it rejects mean the dependency answered, so they are
    /// recorded as successful contact.
    pub async fn call_with<F, Fut, T, E, C>(
        &self,
        operation: F,
        counts_as_failure: C,
    ) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> bool,
    {
        let trial = match self.admit() {
            Admission::Pass => false,
            Admission::Trial => true,
            Admission::Reject { retry_after } => {
                self.metrics.record_rejection();
                debug!(
                    component = %self.name,
                    retry_after_ms = retry_after.as_millis() as u64,
                    "Call rejected by open circuit"
                );
                return Err(CircuitBreakerError::CircuitOpen {
                    component: self.name.clone(),
                    retry_after,
                });
            }
        };

        let mut permit = CallPermit {
            breaker: self,
            trial,
            settled: false,
        };

        let start_time = Instant::now();
        let result = operation().await;
        let duration = start_time.elapsed();

        match &result {
            Err(err) if counts_as_failure(err) => permit.settle_failure(duration),
            _ => permit.settle_success(duration),
        }

        result.map_err(CircuitBreakerError::OperationFailed)
    }

    /// Decide whether a call may proceed, moving Open to HalfOpen once the
    /// open window has elapsed
    fn admit(&self) -> Admission {
        if self.state() == CircuitState::Closed {
            return Admission::Pass;
        }

        let mut inner = self.transitions.lock();
        match self.state() {
            CircuitState::Closed => Admission::Pass,
            CircuitState::Open => {
                let elapsed = inner
                    .last_failure_at
                    .map(|at| at.elapsed())
                    .unwrap_or(self.config.open_duration);

                if elapsed >= self.config.open_duration {
                    inner.trial_in_flight = true;
                    self.transition_to_half_open();
                    Admission::Trial
                } else {
                    Admission::Reject {
                        retry_after: self.config.open_duration - elapsed,
                    }
                }
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    Admission::Reject {
                        retry_after: Duration::from_secs(1),
                    }
                } else {
                    inner.trial_in_flight = true;
                    Admission::Trial
                }
            }
        }
    }

    fn on_success(&self, trial: bool, duration: Duration) {
        self.metrics.record_success(duration);

        debug!(
            component = %self.name,
            duration_ms = duration.as_millis() as u64,
            "Operation succeeded"
        );

        let mut inner = self.transitions.lock();
        match self.state() {
            CircuitState::Closed => {
                inner.consecutive_failures = 0;
            }
            CircuitState::HalfOpen if trial => {
                inner.trial_in_flight = false;
                inner.consecutive_failures = 0;
                inner.last_failure_at = None;
                self.transition_to_closed();
            }
            // Stragglers admitted before the circuit opened do not close it
            CircuitState::HalfOpen | CircuitState::Open => {}
        }
    }

    fn on_failure(&self, trial: bool, duration: Duration) {
        self.metrics.record_failure(duration);

        warn!(
            component = %self.name,
            duration_ms = duration.as_millis() as u64,
            "Operation failed"
        );

        let mut inner = self.transitions.lock();
        match self.state() {
            CircuitState::Closed => {
                inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
                inner.last_failure_at = Some(Instant::now());
                inner.last_failure_utc = Some(Utc::now());
                if inner.consecutive_failures >= self.config.failure_threshold {
                    self.transition_to_open(&inner);
                }
            }
            CircuitState::HalfOpen if trial => {
                inner.trial_in_flight = false;
                inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
                inner.last_failure_at = Some(Instant::now());
                inner.last_failure_utc = Some(Utc::now());
                self.transition_to_open(&inner);
            }
            CircuitState::HalfOpen | CircuitState::Open => {}
        }
    }

    fn transition_to_closed(&self) {
        self.state
            .store(CircuitState::Closed as u8, Ordering::Release);
        self.record_transition(CircuitState::Closed);

        info!(
            component = %self.name,
            total_calls = self.metrics.total_calls.load(Ordering::Relaxed),
            "Circuit breaker closed (recovered)"
        );
    }

    fn transition_to_open(&self, inner: &TransitionState) {
        self.state.store(CircuitState::Open as u8, Ordering::Release);
        self.metrics.record_trip();
        self.record_transition(CircuitState::Open);

        error!(
            component = %self.name,
            consecutive_failures = inner.consecutive_failures,
            failure_threshold = self.config.failure_threshold,
            open_duration_seconds = self.config.open_duration.as_secs(),
            "Circuit breaker opened (failing fast)"
        );
    }

    fn transition_to_half_open(&self) {
        self.state
            .store(CircuitState::HalfOpen as u8, Ordering::Release);
        self.record_transition(CircuitState::HalfOpen);

        info!(
            component = %self.name,
            "Circuit breaker half-open (testing recovery)"
        );
    }

    fn record_transition(&self, to: CircuitState) {
        telemetry::circuit_breaker_transitions_total().add(
            1,
            &[
                KeyValue::new("breaker", self.name.clone()),
                KeyValue::new("to_state", to.as_str()),
            ],
        );
    }

    /// Force circuit to open state (operator action)
    pub fn force_open(&self) {
        warn!(component = %self.name, "Circuit breaker forced open");
        let mut inner = self.transitions.lock();
        inner.consecutive_failures = inner
            .consecutive_failures
            .max(self.config.failure_threshold);
        inner.last_failure_at = Some(Instant::now());
        inner.last_failure_utc = Some(Utc::now());
        inner.trial_in_flight = false;
        self.transition_to_open(&inner);
    }

    /// Force circuit to closed state (operator recovery)
    pub fn force_closed(&self) {
        warn!(component = %self.name, "Circuit breaker forced closed");
        let mut inner = self.transitions.lock();
        *inner = TransitionState::default();
        self.transition_to_closed();
    }

    /// Snapshot of the state machine
    pub fn snapshot(&self) -> CircuitBreakerState {
        let inner = self.transitions.lock();
        CircuitBreakerState {
            name: self.name.clone(),
            state: self.state(),
            consecutive_failures: inner.consecutive_failures,
            last_failure_at: inner.last_failure_utc,
            failure_threshold: self.config.failure_threshold,
            open_duration_seconds: self.config.open_duration.as_secs(),
        }
    }

    /// Get current metrics snapshot
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        self.metrics.snapshot(self.state())
    }

    /// Closed with a failure rate below 10% over at least 10 calls
    pub fn is_healthy(&self) -> bool {
        if self.state() != CircuitState::Closed {
            return false;
        }

        let metrics = self.metrics();
        metrics.total_calls < 10 || metrics.failure_rate < 0.1
    }
}

/// Tracks an admitted call until its outcome is recorded.
///
/// A half-open trial whose future is dropped before completing counts as a
/// failed trial, otherwise the breaker would stay half-open forever.
struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl CallPermit<'_> {
    fn settle_success(&mut self, duration: Duration) {
        self.settled = true;
        self.breaker.on_success(self.trial, duration);
    }

    fn settle_failure(&mut self, duration: Duration) {
        self.settled = true;
        self.breaker.on_failure(self.trial, duration);
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.trial {
            warn!(
                component = %self.breaker.name,
                "Half-open trial abandoned before completion"
            );
            self.breaker.on_failure(true, Duration::ZERO);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use tokio::time::sleep;

    fn config(failure_threshold: u32, open_ms: u64) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold,
            open_duration: Duration::from_millis(open_ms),
        }
    }

    #[tokio::test]
    async fn test_circuit_breaker_normal_operation() {
        let circuit = CircuitBreaker::new("test", config(3, 100));

        assert_eq!(circuit.state(), CircuitState::Closed);

        let result = circuit.call(|| async { Ok::<_, String>("success") }).await;
        assert!(result.is_ok());

        let metrics = circuit.metrics();
        assert_eq!(metrics.total_calls, 1);
        assert_eq!(metrics.success_count, 1);
        assert_eq!(metrics.failure_count, 0);
    }

    #[tokio::test]
    async fn test_circuit_breaker_opens_on_failures() {
        let circuit = CircuitBreaker::new("test", config(2, 100));

        let _ = circuit.call(|| async { Err::<String, _>("error") }).await;
        assert_eq!(circuit.state(), CircuitState::Closed);

        let _ = circuit.call(|| async { Err::<String, _>("error") }).await;
        assert_eq!(circuit.state(), CircuitState::Open);

        let result = circuit
            .call(|| async { Ok::<_, String>("should not execute") })
            .await;
        assert!(matches!(result, Err(CircuitBreakerError::CircuitOpen { .. })));
        assert_eq!(circuit.metrics().rejected_count, 1);
    }

    #[tokio::test]
    async fn test_success_resets_consecutive_failures() {
        let circuit = CircuitBreaker::new("test", config(2, 100));

        let _ = circuit.call(|| async { Err::<(), _>("error") }).await;
        let _ = circuit.call(|| async { Ok::<_, &str>(()) }).await;
        let _ = circuit.call(|| async { Err::<(), _>("error") }).await;

        assert_eq!(circuit.state(), CircuitState::Closed);
        assert_eq!(circuit.snapshot().consecutive_failures, 1);
    }

    #[tokio::test]
    async fn test_circuit_breaker_recovery() {
        let circuit = CircuitBreaker::new("test", config(1, 50));

        let _ = circuit.call(|| async { Err::<String, _>("error") }).await;
        assert_eq!(circuit.state(), CircuitState::Open);

        sleep(Duration::from_millis(60)).await;

        let result = circuit.call(|| async { Ok::<_, String>("success") }).await;
        assert!(result.is_ok());
        assert_eq!(circuit.state(), CircuitState::Closed);
        assert_eq!(circuit.snapshot().consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_failed_trial_reopens() {
        let circuit = CircuitBreaker::new("test", config(1, 50));

        let _ = circuit.call(|| async { Err::<(), _>("error") }).await;
        let first_failure = circuit.snapshot().last_failure_at;
        sleep(Duration::from_millis(60)).await;

        let _ = circuit.call(|| async { Err::<(), _>("still down") }).await;
        assert_eq!(circuit.state(), CircuitState::Open);
        assert!(circuit.snapshot().last_failure_at > first_failure);
        assert_eq!(circuit.metrics().trips, 2);
    }

    #[tokio::test]
    async fn test_half_open_allows_single_trial() {
        let circuit = Arc::new(CircuitBreaker::new("test", config(1, 20)));
        let invocations = Arc::new(AtomicUsize::new(0));

        let _ = circuit.call(|| async { Err::<(), _>("error") }).await;
        sleep(Duration::from_millis(30)).await;

        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let trial = {
            let circuit = Arc::clone(&circuit);
            let invocations = Arc::clone(&invocations);
            tokio::spawn(async move {
                circuit
                    .call(|| async move {
                        invocations.fetch_add(1, Ordering::SeqCst);
                        let _ = release_rx.await;
                        Ok::<_, &str>(())
                    })
                    .await
            })
        };

        // Wait for the trial to be admitted
        while invocations.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(circuit.state(), CircuitState::HalfOpen);

        let concurrent = circuit
            .call(|| async { Ok::<_, &str>(()) })
            .await;
        assert!(matches!(
            concurrent,
            Err(CircuitBreakerError::CircuitOpen { .. })
        ));

        release_tx.send(()).unwrap();
        assert!(trial.await.unwrap().is_ok());
        assert_eq!(circuit.state(), CircuitState::Closed);
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_non_counting_errors_do_not_trip() {
        let circuit = CircuitBreaker::new("test", config(1, 100));

        let result = circuit
            .call_with(|| async { Err::<(), _>("bad request") }, |_| false)
            .await;
        assert!(matches!(result, Err(CircuitBreakerError::OperationFailed(_))));
        assert_eq!(circuit.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_force_operations() {
        let circuit = CircuitBreaker::new("test", config(3, 1000));

        circuit.force_open();
        assert_eq!(circuit.state(), CircuitState::Open);
        assert!(circuit.snapshot().consecutive_failures >= 3);

        circuit.force_closed();
        assert_eq!(circuit.state(), CircuitState::Closed);
        assert_eq!(circuit.snapshot().consecutive_failures, 0);
    }

    #[test]
    fn test_try_new_validates() {
        assert!(CircuitBreaker::try_new("bad", config(0, 100)).is_err());
        assert!(CircuitBreaker::try_new("good", config(1, 100)).is_ok());
    }

    #[test]
    fn test_retry_after_rounds_up() {
        assert_eq!(retry_after_secs(&Duration::from_millis(1500)), 2);
        assert_eq!(retry_after_secs(&Duration::from_secs(30)), 30);
        assert_eq!(retry_after_secs(&Duration::ZERO), 1);
    }
}
