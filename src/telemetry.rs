//! # Health Telemetry
//!
//! OpenTelemetry instruments for the check pipeline, circuit breakers and the
//! memory pressure manager. Instruments are recorded against the global meter
//! provider; without an installed exporter they are no-ops.
//!
//! ## Usage
//!
//! ```rust
//! use healthwatch_core::telemetry::*;
//! use opentelemetry::KeyValue;
//!
//! check_runs_total().add(
//!     1,
//!     &[KeyValue::new("check", "database"), KeyValue::new("status", "healthy")],
//! );
//! check_duration_ms().record(12.5, &[KeyValue::new("check", "database")]);
//! ```

use opentelemetry::metrics::{Counter, Histogram, Meter};
use std::sync::OnceLock;

static HEALTHWATCH_METER: OnceLock<Meter> = OnceLock::new();

fn meter() -> &'static Meter {
    HEALTHWATCH_METER
        .get_or_init(|| opentelemetry::global::meter_provider().meter("healthwatch-core"))
}

// ============================================================================
// Counters - Check Pipeline
// ============================================================================

/// Total number of individual check executions
///
/// Labels:
/// - check: registered check name
/// - status: healthy, degraded, error
pub fn check_runs_total() -> Counter<u64> {
    meter()
        .u64_counter("healthwatch.check.runs.total")
        .with_description("Total number of health check executions")
        .build()
}

/// Total number of aggregated passes
///
/// Labels:
/// - overall_status: healthy, degraded, unhealthy
/// - scope: all, critical
pub fn check_passes_total() -> Counter<u64> {
    meter()
        .u64_counter("healthwatch.check.passes.total")
        .with_description("Total number of aggregated health check passes")
        .build()
}

// ============================================================================
// Counters - Resilience
// ============================================================================

/// Total number of circuit breaker state transitions
///
/// Labels:
/// - breaker: protected dependency name
/// - to_state: closed, open, half_open
pub fn circuit_breaker_transitions_total() -> Counter<u64> {
    meter()
        .u64_counter("healthwatch.circuit_breaker.transitions.total")
        .with_description("Total number of circuit breaker state transitions")
        .build()
}

// ============================================================================
// Counters - Memory Pressure
// ============================================================================

/// Total number of keys removed by memory optimization
///
/// Labels:
/// - pattern: key pattern class, e.g. `temp:*`
pub fn memory_keys_reclaimed_total() -> Counter<u64> {
    meter()
        .u64_counter("healthwatch.memory.keys_reclaimed.total")
        .with_description("Total number of cache keys removed by memory optimization")
        .build()
}

/// Total number of memory alerts raised
///
/// Labels:
/// - level: warning, critical, emergency
pub fn memory_alerts_total() -> Counter<u64> {
    meter()
        .u64_counter("healthwatch.memory.alerts.total")
        .with_description("Total number of memory pressure alerts raised")
        .build()
}

// ============================================================================
// Histograms
// ============================================================================

/// Wall-clock duration of individual check executions in milliseconds
///
/// Labels:
/// - check: registered check name
pub fn check_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("healthwatch.check.duration")
        .with_description("Health check execution duration in milliseconds")
        .with_unit("ms")
        .build()
}
