#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Healthwatch Core
//!
//! Health check orchestration and resilience monitoring for services that sit
//! on a relational store, a replicated cache cluster and a handful of external
//! dependencies.
//!
//! ## Overview
//!
//! Checks are registered by name, executed concurrently on a bounded pool with
//! per-check and per-pass deadlines, and folded into a single Healthy, Degraded
//! or Unhealthy verdict. Critical checks decide readiness; non-critical checks
//! can only degrade it.
//!
//! Around that core sit the resilience and cluster pieces:
//!
//! - per-dependency circuit breakers that stop hammering a failing backend
//! - a topology monitor that discovers the cache primary, its replicas and
//!   whether enough coordinators are reachable to fail over
//! - a memory pressure manager with tiered alerts and rate-limited cleanup
//! - a bounded performance history with trend analysis and capacity advice
//!
//! ## Module Organization
//!
//! - [`probe`] - The `Probe` trait, check results and the failure taxonomy
//! - [`probes`] - Built-in probes for PostgreSQL, HTTP, caches and workers
//! - [`orchestration`] - Registry, orchestrator and aggregated reports
//! - [`resilience`] - Circuit breakers and timeout guards
//! - [`cluster`] - Cache cluster topology and quorum
//! - [`memory`] - Memory pressure alerts and cleanup
//! - [`metrics`] - Performance history and trends
//! - [`endpoints`] - Liveness, readiness and full health handlers
//! - [`admin`] - Operator queries and the advisory failover plan
//! - [`config`] - Layered configuration loading and validation
//! - [`logging`] / [`telemetry`] - Structured logs and OpenTelemetry instruments
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use healthwatch_core::config::OrchestratorConfig;
//! use healthwatch_core::endpoints::HealthEndpoints;
//! use healthwatch_core::orchestration::{CheckRegistry, Orchestrator};
//! use healthwatch_core::probe::{CheckResult, FnProbe};
//! use std::sync::Arc;
//!
//! # async fn example() -> healthwatch_core::Result<()> {
//! let registry = Arc::new(CheckRegistry::default());
//! registry.register(
//!     "database",
//!     Arc::new(FnProbe::new(|| async { Ok(CheckResult::healthy("reachable")) })),
//!     true,
//! )?;
//!
//! let orchestrator = Arc::new(Orchestrator::new(registry, &OrchestratorConfig::default()));
//! let endpoints = HealthEndpoints::new(orchestrator);
//!
//! let ready = endpoints.readiness().await;
//! println!("readiness: {} ({})", ready.verdict, ready.http_status);
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit and integration tests
//! ```

pub mod admin;
pub mod cluster;
pub mod config;
pub mod constants;
pub mod endpoints;
pub mod error;
pub mod logging;
pub mod memory;
pub mod metrics;
pub mod orchestration;
pub mod probe;
pub mod probes;
pub mod resilience;
pub mod telemetry;

pub use config::{ConfigManager, ConfigurationError, HealthwatchConfig};
pub use endpoints::{EndpointResponse, HealthEndpoints, LivenessResponse};
pub use error::{HealthError, Result};
pub use orchestration::{AggregatedReport, CheckRegistry, Orchestrator, OverallStatus};
pub use probe::{CheckResult, CheckStatus, ErrorKind, Probe, ProbeError};
pub use resilience::{CircuitBreaker, CircuitBreakerManager, CircuitBreakerProbe, TimeoutGuard};
