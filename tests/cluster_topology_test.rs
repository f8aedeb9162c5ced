//! Topology discovery, quorum and the administrative surface over it

mod common;

use common::*;
use healthwatch_core::admin::{AdminSurface, FailoverDecision};
use healthwatch_core::cluster::{ClusterTopologyMonitor, ReplicaStatus};
use healthwatch_core::config::{ClusterConfig, ConfigManager, HealthwatchConfig};
use healthwatch_core::constants::FAILOVER_CONFIRMATION_TOKEN;
use healthwatch_core::probe::{CheckStatus, ErrorKind, Probe};
use std::sync::Arc;

const PRIMARY: &str = "10.0.0.1:6379";

fn cluster_config(nodes: &[Arc<MockCoordinator>]) -> ClusterConfig {
    ClusterConfig {
        coordinators: nodes.iter().map(|n| n.address.clone()).collect(),
        ..ClusterConfig::default()
    }
}

fn monitor(nodes: Vec<Arc<MockCoordinator>>) -> ClusterTopologyMonitor {
    let config = cluster_config(&nodes);
    ClusterTopologyMonitor::new(&config, coordinators(nodes))
}

fn nodes(reachable: usize, total: usize) -> Vec<Arc<MockCoordinator>> {
    (0..total)
        .map(|i| {
            let address = format!("10.0.1.{i}:26379");
            if i < reachable {
                MockCoordinator::healthy(&address, PRIMARY, &["10.0.0.2:6379"])
            } else {
                MockCoordinator::unreachable(&address)
            }
        })
        .collect()
}

#[tokio::test]
async fn test_quorum_three_coordinators() {
    for (reachable, expected) in [(0, false), (1, false), (2, true), (3, true)] {
        let status = monitor(nodes(reachable, 3)).quorum_check().await;
        assert_eq!(status.quorum_size, 2);
        assert_eq!(status.reachable_coordinators, reachable);
        assert_eq!(status.quorum_met, expected, "reachable = {reachable}");
    }
}

#[tokio::test]
async fn test_quorum_five_coordinators() {
    for (reachable, expected) in [(2, false), (3, true), (5, true)] {
        let status = monitor(nodes(reachable, 5)).quorum_check().await;
        assert_eq!(status.quorum_size, 3);
        assert_eq!(status.quorum_met, expected, "reachable = {reachable}");
    }
}

#[tokio::test]
async fn test_unreachable_node_does_not_abort_discovery() {
    let snapshot = monitor(nodes(2, 3)).cluster_health().await;

    assert_eq!(snapshot.reachable_coordinators, 2);
    assert!(snapshot.quorum_met);
    assert_eq!(snapshot.primary.as_ref().unwrap().address, PRIMARY);
    assert_eq!(snapshot.replicas.len(), 1);
    assert!(snapshot.failover_ready);

    let unreachable = snapshot
        .coordinators
        .iter()
        .find(|c| !c.reachable)
        .unwrap();
    assert!(unreachable.error.is_some());
    assert!(unreachable.latency_ms.is_none());
}

#[tokio::test]
async fn test_probe_statuses() {
    let healthy = monitor(nodes(3, 3)).check().await.unwrap();
    assert_eq!(healthy.status, CheckStatus::Healthy);

    let no_quorum = monitor(nodes(1, 3)).check().await.unwrap();
    assert_eq!(no_quorum.status, CheckStatus::Error);

    let none = monitor(nodes(0, 3)).check().await.unwrap_err();
    assert_eq!(none.kind, ErrorKind::ConnectionFailure);

    let no_replicas = monitor(vec![
        MockCoordinator::healthy("10.0.1.0:26379", PRIMARY, &[]),
        MockCoordinator::healthy("10.0.1.1:26379", PRIMARY, &[]),
        MockCoordinator::healthy("10.0.1.2:26379", PRIMARY, &[]),
    ])
    .check()
    .await
    .unwrap();
    assert_eq!(no_replicas.status, CheckStatus::Degraded);
}

#[tokio::test]
async fn test_failover_blocked_when_every_replica_is_down() {
    let mut replica = online_replica("10.0.0.2:6379");
    replica.status = ReplicaStatus::ObjectivelyDown;
    let node = Arc::new(MockCoordinator {
        address: "10.0.1.0:26379".to_string(),
        reachable: true,
        primary: MockCoordinator::healthy("x", PRIMARY, &[]).primary.clone(),
        replicas: vec![replica],
    });

    let assessment = monitor(vec![node]).failover_capability().await;
    assert!(!assessment.capable);
    assert!(assessment.replicas_present);
    assert!(!assessment.healthy_replica_available);
    assert_eq!(assessment.blockers.len(), 1);
}

fn admin(nodes: Vec<Arc<MockCoordinator>>) -> AdminSurface {
    let mut config = HealthwatchConfig::default();
    config.cluster = cluster_config(&nodes);
    let manager = ConfigManager::from_config(config.clone(), "test").unwrap();
    let topology = Arc::new(ClusterTopologyMonitor::new(
        &config.cluster,
        coordinators(nodes),
    ));
    AdminSurface::new(manager).with_topology(topology)
}

#[tokio::test]
async fn test_admin_listings() {
    let admin = admin(nodes(2, 3));

    let primaries = admin.list_primaries().await.unwrap();
    assert_eq!(primaries.len(), 2);
    assert!(primaries
        .iter()
        .all(|(_, p)| p.as_ref().map(|p| p.address.as_str()) == Some(PRIMARY)));

    let replicas = admin.list_replicas().await.unwrap();
    assert_eq!(replicas.len(), 1);

    let status = admin.cluster_status().await.unwrap();
    assert_eq!(status.total_coordinators, 3);
}

#[tokio::test]
async fn test_failover_is_advisory() {
    let surface = admin(nodes(3, 3));

    let plan = surface.trigger_failover(None).await.unwrap();
    assert_eq!(plan.decision, FailoverDecision::PlanOnly);
    assert_eq!(plan.current_primary.as_deref(), Some(PRIMARY));
    assert_eq!(plan.candidate_replica.as_deref(), Some("10.0.0.2:6379"));
    assert!(!plan.steps.is_empty());

    let wrong = surface.trigger_failover(Some("yes")).await.unwrap();
    assert_eq!(wrong.decision, FailoverDecision::PlanOnly);

    let confirmed = surface
        .trigger_failover(Some(FAILOVER_CONFIRMATION_TOKEN))
        .await
        .unwrap();
    assert_eq!(
        confirmed.decision,
        FailoverDecision::RequiresExternalConfirmation
    );

    let blocked = admin(nodes(1, 3))
        .trigger_failover(Some(FAILOVER_CONFIRMATION_TOKEN))
        .await
        .unwrap();
    assert_eq!(blocked.decision, FailoverDecision::NotPossible);
    assert!(blocked.candidate_replica.is_some());
}
