//! # Cluster Topology
//!
//! High-availability readiness of a replicated cache deployment: primary
//! discovery, replica enumeration, coordinator quorum and failover viability.
//! Quorum is a strict majority of the configured coordinators, so three
//! coordinators need two reachable and five need three.

pub mod client;
pub mod topology;
pub mod types;

pub use client::CoordinatorClient;
pub use topology::ClusterTopologyMonitor;
pub use types::{
    majority, quorum_met, quorum_size, ClusterSnapshot, CoordinatorReport, FailoverAssessment,
    LinkState, PrimaryInfo, QuorumStatus, ReplicaInfo, ReplicaStatus,
};
