//! # Administrative Surface
//!
//! Operator-facing queries over the cluster and memory subsystems. Nothing here
//! mutates topology. [`AdminSurface::trigger_failover`] only ever describes what
//! a failover would do; executing it is left to the coordinators themselves.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::cluster::{ClusterSnapshot, ClusterTopologyMonitor, FailoverAssessment, PrimaryInfo, ReplicaInfo};
use crate::config::{ConfigManager, HealthwatchConfig, SecurityCapabilities};
use crate::constants::FAILOVER_CONFIRMATION_TOKEN;
use crate::error::{HealthError, Result};
use crate::memory::{MemoryPressureManager, OptimizationReport};

/// Outcome of re-validating the active configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigValidationReport {
    pub valid: bool,
    pub environment: String,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub security: Option<SecurityCapabilities>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailoverDecision {
    /// No confirmation supplied; the plan is returned for review
    PlanOnly,
    /// Confirmed, but promotion must be carried out by the coordinators
    RequiresExternalConfirmation,
    /// The cluster cannot fail over right now
    NotPossible,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailoverPlan {
    pub decision: FailoverDecision,
    pub service_name: String,
    pub current_primary: Option<String>,
    pub candidate_replica: Option<String>,
    pub assessment: FailoverAssessment,
    pub steps: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

pub struct AdminSurface {
    config: Arc<ConfigManager>,
    topology: Option<Arc<ClusterTopologyMonitor>>,
    memory: Option<Arc<MemoryPressureManager>>,
}

impl std::fmt::Debug for AdminSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminSurface")
            .field("environment", &self.config.environment())
            .field("topology", &self.topology.is_some())
            .field("memory", &self.memory.is_some())
            .finish()
    }
}

impl AdminSurface {
    pub fn new(config: Arc<ConfigManager>) -> Self {
        Self {
            config,
            topology: None,
            memory: None,
        }
    }

    pub fn with_topology(mut self, topology: Arc<ClusterTopologyMonitor>) -> Self {
        self.topology = Some(topology);
        self
    }

    pub fn with_memory(mut self, memory: Arc<MemoryPressureManager>) -> Self {
        self.memory = Some(memory);
        self
    }

    fn topology(&self) -> Result<&ClusterTopologyMonitor> {
        self.topology
            .as_deref()
            .ok_or_else(|| HealthError::ValidationFailure("cluster monitoring is not configured".into()))
    }

    fn memory(&self) -> Result<&MemoryPressureManager> {
        self.memory
            .as_deref()
            .ok_or_else(|| HealthError::ValidationFailure("memory management is not configured".into()))
    }

    pub async fn cluster_status(&self) -> Result<ClusterSnapshot> {
        Ok(self.topology()?.cluster_health().await)
    }

    /// Re-run range and security validation, plus consistency checks that
    /// only make sense with the whole configuration in view
    pub fn validate_configuration(&self) -> ConfigValidationReport {
        let environment = self.config.environment().to_string();
        validate(self.config.config(), &environment)
    }

    pub async fn list_primaries(&self) -> Result<Vec<(String, Option<PrimaryInfo>)>> {
        Ok(self.topology()?.primaries().await)
    }

    pub async fn list_replicas(&self) -> Result<Vec<ReplicaInfo>> {
        let snapshot = self.topology()?.cluster_health().await;
        if snapshot.reachable_coordinators == 0 {
            return Err(HealthError::ConnectionFailure(format!(
                "none of {} coordinators reachable",
                snapshot.total_coordinators
            )));
        }
        Ok(snapshot.replicas)
    }

    pub async fn test_failover_capability(&self) -> Result<FailoverAssessment> {
        Ok(self.topology()?.failover_capability().await)
    }

    pub async fn optimize_memory_now(&self, force: bool) -> Result<OptimizationReport> {
        let report = self.memory()?.optimize(force).await?;
        info!(
            force,
            status = ?report.status,
            keys_removed = report.keys_removed,
            "Manual memory optimization requested"
        );
        Ok(report)
    }

    /// Describe a failover. Never promotes anything: a correct
    /// `confirmation` only changes the decision to
    /// [`FailoverDecision::RequiresExternalConfirmation`].
    pub async fn trigger_failover(&self, confirmation: Option<&str>) -> Result<FailoverPlan> {
        let topology = self.topology()?;
        let snapshot = topology.cluster_health().await;
        let assessment = FailoverAssessment::from_snapshot(&snapshot);

        let current_primary = snapshot.primary.as_ref().map(|p| p.address.clone());
        let candidate_replica = snapshot
            .replicas
            .iter()
            .filter(|r| r.is_healthy())
            .min_by_key(|r| r.last_ping_ms.unwrap_or(u64::MAX))
            .map(|r| r.address.clone());

        let confirmed = confirmation == Some(FAILOVER_CONFIRMATION_TOKEN);
        let decision = if !assessment.capable {
            FailoverDecision::NotPossible
        } else if confirmed {
            FailoverDecision::RequiresExternalConfirmation
        } else {
            FailoverDecision::PlanOnly
        };

        let mut steps = Vec::new();
        if assessment.capable {
            steps.push(format!(
                "ask the coordinator quorum ({} of {}) to fail over '{}'",
                snapshot.quorum_size,
                snapshot.total_coordinators,
                snapshot.service_name
            ));
            if let Some(candidate) = &candidate_replica {
                steps.push(format!("expect {candidate} to be promoted"));
            }
            steps.push("re-run cluster_status until the new primary is agreed".to_string());
        } else {
            steps.extend(assessment.blockers.iter().map(|b| format!("resolve: {b}")));
        }

        match decision {
            FailoverDecision::RequiresExternalConfirmation => warn!(
                service = %snapshot.service_name,
                primary = ?current_primary,
                "Failover confirmed by operator; execution must happen on the coordinators"
            ),
            FailoverDecision::NotPossible => warn!(
                service = %snapshot.service_name,
                blockers = ?assessment.blockers,
                "Failover requested but not possible"
            ),
            FailoverDecision::PlanOnly => info!(
                service = %snapshot.service_name,
                "Failover plan generated"
            ),
        }

        Ok(FailoverPlan {
            decision,
            service_name: snapshot.service_name,
            current_primary,
            candidate_replica,
            assessment,
            steps,
            generated_at: Utc::now(),
        })
    }
}

fn validate(config: &HealthwatchConfig, environment: &str) -> ConfigValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if let Err(e) = config.validate() {
        errors.push(e.to_string());
    }
    let security = match config.check_security(environment) {
        Ok(capabilities) => Some(capabilities),
        Err(e) => {
            errors.push(e.to_string());
            None
        }
    };

    let cluster = &config.cluster;
    if cluster.coordinators.is_empty() {
        warnings.push("no cluster coordinators configured; topology checks will fail".to_string());
    } else if cluster.coordinators.len() < 3 {
        warnings.push(format!(
            "{} coordinator(s) cannot tolerate a coordinator failure; use at least 3",
            cluster.coordinators.len()
        ));
    }

    let orchestrator = &config.orchestrator;
    if orchestrator.pool_timeout_ms < orchestrator.heavy_check_timeout_ms {
        warnings.push(format!(
            "orchestrator.pool_timeout_ms ({}) is shorter than heavy_check_timeout_ms ({})",
            orchestrator.pool_timeout_ms, orchestrator.heavy_check_timeout_ms
        ));
    }
    if !config.memory.auto_optimize && environment == "production" {
        warnings.push("memory.auto_optimize is disabled in production".to_string());
    }

    ConfigValidationReport {
        valid: errors.is_empty(),
        environment: environment.to_string(),
        errors,
        warnings,
        security,
    }
}
