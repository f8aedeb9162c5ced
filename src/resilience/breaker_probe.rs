//! Circuit breaker composed around a probe.
//!
//! Composition order is explicit: callers build
//! `TimeoutGuard::new(Arc::new(CircuitBreakerProbe::new(probe, breaker)), timeout)`.
//! The outer guard stops waiting without cancelling, so the breaker bounds the
//! inner call itself and records a hang as a Timeout failure. The call timeout
//! defaults to the light-check bound; keep it at or below the guard's timeout
//! so the failure is counted before the guard gives up.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::circuit_breaker::{retry_after_secs, CircuitBreaker, CircuitBreakerError};
use super::timeout::timeout_message;
use crate::constants::timeouts;
use crate::probe::{Probe, ProbeError, ProbeResult};

pub struct CircuitBreakerProbe {
    probe: Arc<dyn Probe>,
    breaker: Arc<CircuitBreaker>,
    call_timeout: Duration,
}

impl CircuitBreakerProbe {
    pub fn new(probe: Arc<dyn Probe>, breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            probe,
            breaker,
            call_timeout: timeouts::LIGHT_CHECK,
        }
    }

    /// Override the bound on each wrapped call
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }
}

#[async_trait]
impl Probe for CircuitBreakerProbe {
    async fn check(&self) -> ProbeResult {
        let probe = &self.probe;
        let call_timeout = self.call_timeout;

        let outcome = self
            .breaker
            .call_with(
                || async move {
                    tokio::time::timeout(call_timeout, probe.check())
                        .await
                        .unwrap_or_else(|_| {
                            Err(ProbeError::timeout(timeout_message(call_timeout)))
                        })
                },
                |err: &ProbeError| err.kind.is_connectivity(),
            )
            .await;

        match outcome {
            Ok(result) => Ok(result),
            Err(CircuitBreakerError::CircuitOpen { retry_after, .. }) => {
                Err(ProbeError::circuit_open(format!(
                    "circuit breaker open, retry after {}s",
                    retry_after_secs(&retry_after)
                )))
            }
            Err(CircuitBreakerError::OperationFailed(err)) => Err(err),
            Err(CircuitBreakerError::ConfigurationError(msg)) => Err(ProbeError::internal(msg)),
        }
    }
}
