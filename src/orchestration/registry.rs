//! # Check Registry
//!
//! Owns every registered check. Registration order is preserved so sequential
//! passes run checks in the order they were added.
//!
//! ```rust
//! use healthwatch_core::config::OrchestratorConfig;
//! use healthwatch_core::orchestration::{CheckRegistry, Orchestrator, OverallStatus};
//! use healthwatch_core::probe::{CheckResult, FnProbe, ProbeError};
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let registry = Arc::new(CheckRegistry::default());
//! registry
//!     .register(
//!         "database",
//!         Arc::new(FnProbe::new(|| async { Ok(CheckResult::healthy("reachable")) })),
//!         true,
//!     )
//!     .unwrap();
//! registry
//!     .register(
//!         "mqtt",
//!         Arc::new(FnProbe::new(|| async { Err(ProbeError::connection("refused")) })),
//!         false,
//!     )
//!     .unwrap();
//!
//! // Names are unique; the first registration wins
//! assert!(registry
//!     .register(
//!         "database",
//!         Arc::new(FnProbe::new(|| async { Ok(CheckResult::healthy("other")) })),
//!         false,
//!     )
//!     .is_err());
//!
//! let orchestrator = Orchestrator::new(registry, &OrchestratorConfig::default());
//! let report = orchestrator.run_all(true).await;
//! assert_eq!(report.overall_status, OverallStatus::Degraded);
//! assert_eq!(report.summary.errors, 1);
//! # });
//! ```

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::constants::timeouts;
use crate::error::{HealthError, Result};
use crate::probe::{CheckResult, Probe};
use crate::resilience::TimeoutGuard;

/// A probe plus its registration metadata and most recent outcome
pub struct RegisteredCheck {
    name: String,
    guard: TimeoutGuard,
    critical: bool,
    last_run: RwLock<Option<DateTime<Utc>>>,
    last_result: RwLock<Option<CheckResult>>,
    in_flight: AtomicBool,
}

impl std::fmt::Debug for RegisteredCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredCheck")
            .field("name", &self.name)
            .field("critical", &self.critical)
            .field("timeout", &self.guard.timeout())
            .field("in_flight", &self.in_flight.load(Ordering::Relaxed))
            .finish()
    }
}

impl RegisteredCheck {
    fn new(name: String, probe: Arc<dyn Probe>, critical: bool, timeout: Duration) -> Self {
        Self {
            name,
            guard: TimeoutGuard::new(probe, timeout),
            critical,
            last_run: RwLock::new(None),
            last_result: RwLock::new(None),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_critical(&self) -> bool {
        self.critical
    }

    pub fn timeout(&self) -> Duration {
        self.guard.timeout()
    }

    pub fn last_run(&self) -> Option<DateTime<Utc>> {
        *self.last_run.read()
    }

    pub fn last_result(&self) -> Option<CheckResult> {
        self.last_result.read().clone()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub(crate) fn guard(&self) -> &TimeoutGuard {
        &self.guard
    }

    /// Claim the check for one run; `None` when another pass already holds it
    pub(crate) fn try_claim(self: &Arc<Self>) -> Option<InFlightClaim> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightClaim {
                check: Arc::clone(self),
            })
    }

    pub(crate) fn record(&self, result: &CheckResult) {
        *self.last_result.write() = Some(result.clone());
        *self.last_run.write() = Some(result.timestamp);
    }
}

/// Releases the in-flight flag when the run ends, even if it was abandoned
pub(crate) struct InFlightClaim {
    check: Arc<RegisteredCheck>,
}

impl Drop for InFlightClaim {
    fn drop(&mut self) {
        self.check.in_flight.store(false, Ordering::Release);
    }
}

#[derive(Debug)]
pub struct CheckRegistry {
    checks: DashMap<String, Arc<RegisteredCheck>>,
    order: RwLock<Vec<String>>,
    default_timeout: Duration,
}

impl Default for CheckRegistry {
    fn default() -> Self {
        Self::new(timeouts::LIGHT_CHECK)
    }
}

impl CheckRegistry {
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            checks: DashMap::new(),
            order: RwLock::new(Vec::new()),
            default_timeout,
        }
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Register a probe under the default timeout
    pub fn register(
        &self,
        name: impl Into<String>,
        probe: Arc<dyn Probe>,
        critical: bool,
    ) -> Result<()> {
        self.register_with_timeout(name, probe, critical, self.default_timeout)
    }

    /// Register a probe with its own timeout
    ///
    /// Fails with [`HealthError::DuplicateCheck`] if the name is taken; the
    /// existing registration is left untouched.
    pub fn register_with_timeout(
        &self,
        name: impl Into<String>,
        probe: Arc<dyn Probe>,
        critical: bool,
        timeout: Duration,
    ) -> Result<()> {
        let name = name.into();
        if timeout.is_zero() {
            return Err(HealthError::ValidationFailure(format!(
                "check '{name}' must have a non-zero timeout"
            )));
        }

        match self.checks.entry(name.clone()) {
            Entry::Occupied(_) => return Err(HealthError::DuplicateCheck(name)),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(RegisteredCheck::new(
                    name.clone(),
                    probe,
                    critical,
                    timeout,
                )));
            }
        }
        self.order.write().push(name.clone());

        info!(
            check = %name,
            critical = critical,
            timeout_ms = timeout.as_millis() as u64,
            "Registered health check"
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<RegisteredCheck>> {
        self.checks.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.checks.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Check names in registration order
    pub fn names(&self) -> Vec<String> {
        self.order.read().clone()
    }

    /// Every check in registration order
    pub fn checks(&self) -> Vec<Arc<RegisteredCheck>> {
        self.order
            .read()
            .iter()
            .filter_map(|name| self.get(name))
            .collect()
    }

    pub fn critical_checks(&self) -> Vec<Arc<RegisteredCheck>> {
        self.checks()
            .into_iter()
            .filter(|check| check.is_critical())
            .collect()
    }
}
