//! Topology value types and quorum arithmetic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Smallest strict majority of `total` coordinators
pub fn majority(total: usize) -> usize {
    total / 2 + 1
}

/// Effective quorum: a configured value is honored only when it is at least a
/// strict majority of the configured coordinators
pub fn quorum_size(total: usize, configured: Option<usize>) -> usize {
    configured.unwrap_or(0).max(majority(total))
}

/// Zero configured coordinators never meet quorum
pub fn quorum_met(reachable: usize, total: usize, configured: Option<usize>) -> bool {
    total > 0 && reachable >= quorum_size(total, configured)
}

/// Primary as reported by a coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryInfo {
    pub address: String,
    /// Raw role flags, e.g. `master`, `s_down`
    pub flags: Vec<String>,
    pub replica_count: usize,
}

impl PrimaryInfo {
    pub fn is_down(&self) -> bool {
        self.flags
            .iter()
            .any(|flag| flag == "s_down" || flag == "o_down" || flag == "disconnected")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplicaStatus {
    Online,
    SubjectivelyDown,
    ObjectivelyDown,
    Disconnected,
}

/// Replication link between a replica and the primary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    Up,
    Down,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaInfo {
    pub address: String,
    pub status: ReplicaStatus,
    pub last_ping_ms: Option<u64>,
    pub link_state: LinkState,
}

impl ReplicaInfo {
    /// Usable as a promotion target
    pub fn is_healthy(&self) -> bool {
        self.status == ReplicaStatus::Online && self.link_state != LinkState::Down
    }
}

/// What one coordinator answered during a topology poll
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorReport {
    pub address: String,
    pub reachable: bool,
    pub latency_ms: Option<f64>,
    pub reported_primary: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuorumStatus {
    pub total_coordinators: usize,
    pub reachable_coordinators: usize,
    pub quorum_size: usize,
    pub quorum_met: bool,
    pub coordinators: Vec<CoordinatorReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    pub service_name: String,
    pub total_coordinators: usize,
    pub reachable_coordinators: usize,
    pub quorum_size: usize,
    pub quorum_met: bool,
    pub primary: Option<PrimaryInfo>,
    /// Coordinators that reported the winning primary address
    pub primary_agreement: usize,
    pub replicas: Vec<ReplicaInfo>,
    pub failover_ready: bool,
    pub coordinators: Vec<CoordinatorReport>,
    pub timestamp: DateTime<Utc>,
}

impl ClusterSnapshot {
    pub fn healthy_replicas(&self) -> usize {
        self.replicas.iter().filter(|r| r.is_healthy()).count()
    }

    /// Reachable coordinators that named a different primary than the winner
    pub fn primary_disagreement(&self) -> usize {
        let reporting = self
            .coordinators
            .iter()
            .filter(|c| c.reported_primary.is_some())
            .count();
        reporting.saturating_sub(self.primary_agreement)
    }
}

/// Itemized failover viability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailoverAssessment {
    pub capable: bool,
    pub primary_discoverable: bool,
    pub replicas_present: bool,
    pub healthy_replica_available: bool,
    pub quorum_met: bool,
    /// Human-readable reasons for every failed sub-check
    pub blockers: Vec<String>,
}

impl FailoverAssessment {
    pub fn from_snapshot(snapshot: &ClusterSnapshot) -> Self {
        let primary_discoverable = snapshot.primary.is_some();
        let replicas_present = !snapshot.replicas.is_empty();
        let healthy_replica_available = snapshot.healthy_replicas() > 0;
        let quorum_met = snapshot.quorum_met;

        let mut blockers = Vec::new();
        if !primary_discoverable {
            blockers.push("primary not discoverable".to_string());
        }
        if !replicas_present {
            blockers.push("no replicas registered".to_string());
        } else if !healthy_replica_available {
            blockers.push("every replica is flagged down".to_string());
        }
        if !quorum_met {
            blockers.push(format!(
                "coordinator quorum not met ({}/{} reachable, {} required)",
                snapshot.reachable_coordinators, snapshot.total_coordinators, snapshot.quorum_size
            ));
        }

        Self {
            capable: blockers.is_empty(),
            primary_discoverable,
            replicas_present,
            healthy_replica_available,
            quorum_met,
            blockers,
        }
    }
}
