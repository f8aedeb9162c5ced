//! # Resilience Module
//!
//! Fault tolerance primitives wrapped around probes.
//!
//! ## Architecture
//!
//! - **Timeout Guard**: bounds how long a caller waits on any probe
//! - **Circuit Breakers**: fail fast against flaky external dependencies
//! - **Manager**: one shared breaker per protected dependency
//!
//! ## Usage
//!
//! ```rust,no_run
//! use healthwatch_core::probe::{CheckResult, FnProbe, Probe};
//! use healthwatch_core::resilience::{
//!     CircuitBreaker, CircuitBreakerConfig, CircuitBreakerProbe, TimeoutGuard,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let breaker = Arc::new(CircuitBreaker::new(
//!     "payments_api",
//!     CircuitBreakerConfig::for_external_api(),
//! ));
//! let probe: Arc<dyn Probe> = Arc::new(FnProbe::new(|| async {
//!     Ok(CheckResult::healthy("payments api reachable"))
//! }));
//!
//! let guarded = TimeoutGuard::new(
//!     Arc::new(CircuitBreakerProbe::new(probe, breaker)),
//!     Duration::from_secs(5),
//! );
//! let result = guarded.run().await;
//! # }
//! ```

pub mod breaker_probe;
pub mod circuit_breaker;
pub mod config;
pub mod manager;
pub mod timeout;

pub use breaker_probe::CircuitBreakerProbe;
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerError, CircuitBreakerMetrics, CircuitBreakerState, CircuitState,
};
pub use config::CircuitBreakerConfig;
pub use manager::CircuitBreakerManager;
pub use timeout::TimeoutGuard;
