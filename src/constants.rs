//! # System Constants
//!
//! Operational boundaries shared by the orchestrator, the resilience layer and
//! the cache cluster monitors. Every value here is a default; the matching
//! configuration section can override it.

use std::time::Duration;

/// Timeouts applied when a check does not carry its own override
pub mod timeouts {
    use super::Duration;

    /// Light checks: pings, round-trips, `SELECT 1`
    pub const LIGHT_CHECK: Duration = Duration::from_secs(5);

    /// Heavy checks: performance scans, topology discovery
    pub const HEAVY_CHECK: Duration = Duration::from_secs(15);

    /// Upper bound on joining a whole pass, independent of per-check timeouts
    pub const POOL_JOIN: Duration = Duration::from_secs(30);

    /// Per-coordinator timeout during topology discovery
    pub const COORDINATOR_NODE: Duration = Duration::from_secs(2);
}

/// Memory pressure defaults
pub mod memory {
    pub const WARNING_THRESHOLD_PERCENT: f64 = 70.0;
    pub const CRITICAL_THRESHOLD_PERCENT: f64 = 85.0;
    pub const EMERGENCY_THRESHOLD_PERCENT: f64 = 95.0;

    /// Fragmentation above this ratio raises a supplementary alert
    pub const FRAGMENTATION_RATIO_LIMIT: f64 = 1.5;

    /// Hit ratio below this percentage raises a supplementary alert
    pub const MIN_HIT_RATIO_PERCENT: f64 = 80.0;

    /// Hit ratio is only judged once more lookups than this were observed
    pub const HIT_RATIO_MIN_SAMPLE_VOLUME: u64 = 1000;

    /// Minimum spacing between unforced optimization runs
    pub const OPTIMIZE_INTERVAL_SECONDS: u64 = 900;

    pub const CLEANUP_BATCH_SIZE: usize = 100;
    pub const MAX_KEYS_PER_CLASS: usize = 10_000;
}

/// Trend analysis defaults
pub mod trends {
    /// Samples retained in the metrics history (24h at 5-minute polling)
    pub const MAX_HISTORY: usize = 288;

    /// Minimum samples before a trend is classified
    pub const MIN_SAMPLES: usize = 3;

    /// Relative change across the window that still counts as stable
    pub const STABLE_BAND_PERCENT: f64 = 5.0;

    /// Memory usage that triggers a scale-up recommendation when rising
    pub const MEMORY_SCALE_PERCENT: f64 = 70.0;

    /// Operations per second that triggers an add-replica recommendation when rising
    pub const OPS_CEILING: f64 = 50_000.0;
}

/// Check names used by built-in monitors when registered with an orchestrator
pub mod check_names {
    pub const CLUSTER_TOPOLOGY: &str = "cluster_topology";
    pub const MEMORY_PRESSURE: &str = "memory_pressure";
    pub const PERFORMANCE_TRENDS: &str = "performance_trends";
}

/// Token an operator must supply before a failover plan is released
pub const FAILOVER_CONFIRMATION_TOKEN: &str = "CONFIRM_FAILOVER";
