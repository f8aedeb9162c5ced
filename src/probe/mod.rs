//! # Probes
//!
//! A probe is a single self-contained check against one dependency. Probes are
//! leaf units: they know nothing about timeouts, circuit breakers or aggregation.
//! Those concerns are layered on explicitly by wrapping a probe in a
//! [`TimeoutGuard`](crate::resilience::TimeoutGuard) and optionally a
//! [`CircuitBreakerProbe`](crate::resilience::CircuitBreakerProbe).
//!
//! ## Contract
//!
//! - Return `Ok(CheckResult)` when the dependency answered, whatever its verdict
//!   (a slow but responsive cache may legitimately report `Degraded`).
//! - Return `Err(ProbeError)` when the probe could not complete. Connectivity and
//!   timeout failures must use [`ErrorKind::ConnectionFailure`] or
//!   [`ErrorKind::Timeout`] so circuit breakers can count them.
//! - Probes may block; wrap blocking code in [`BlockingProbe`] so it runs on the
//!   blocking thread pool.

mod error;
mod result;

pub use error::{ErrorKind, ProbeError};
pub use result::{CheckResult, CheckStatus};

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

pub type ProbeResult = Result<CheckResult, ProbeError>;

#[async_trait]
pub trait Probe: Send + Sync {
    async fn check(&self) -> ProbeResult;
}

#[async_trait]
impl<P> Probe for Arc<P>
where
    P: Probe + ?Sized,
{
    async fn check(&self) -> ProbeResult {
        (**self).check().await
    }
}

/// Adapts an async closure into a [`Probe`]
pub struct FnProbe<F> {
    func: F,
}

impl<F, Fut> FnProbe<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = ProbeResult> + Send,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F, Fut> Probe for FnProbe<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = ProbeResult> + Send,
{
    async fn check(&self) -> ProbeResult {
        (self.func)().await
    }
}

/// Runs a synchronous, possibly blocking, check on the blocking thread pool
pub struct BlockingProbe<F> {
    func: Arc<F>,
}

impl<F> BlockingProbe<F>
where
    F: Fn() -> ProbeResult + Send + Sync + 'static,
{
    pub fn new(func: F) -> Self {
        Self {
            func: Arc::new(func),
        }
    }
}

#[async_trait]
impl<F> Probe for BlockingProbe<F>
where
    F: Fn() -> ProbeResult + Send + Sync + 'static,
{
    async fn check(&self) -> ProbeResult {
        let func = Arc::clone(&self.func);
        match tokio::task::spawn_blocking(move || func()).await {
            Ok(result) => result,
            Err(join_error) if join_error.is_panic() => {
                Err(ProbeError::internal("blocking probe panicked"))
            }
            Err(join_error) => Err(ProbeError::internal(format!(
                "blocking probe was cancelled: {join_error}"
            ))),
        }
    }
}
