//! # Cluster Topology Monitor
//!
//! Polls every configured coordinator concurrently, each under a short
//! per-node timeout. Unreachable coordinators are counted but never abort
//! discovery against the others.
//!
//! Coordinators can disagree on the primary during or shortly after a
//! failover. The address reported by most coordinators wins; ties go to the
//! coordinator listed first in configuration.

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::client::CoordinatorClient;
use super::types::{
    quorum_met, quorum_size, ClusterSnapshot, CoordinatorReport, FailoverAssessment, PrimaryInfo,
    QuorumStatus, ReplicaInfo,
};
use crate::config::ClusterConfig;
use crate::probe::{CheckResult, Probe, ProbeError, ProbeResult};

/// Everything learned from one coordinator in a single poll
struct NodePoll {
    report: CoordinatorReport,
    primary: Option<PrimaryInfo>,
    replicas: Option<Vec<ReplicaInfo>>,
}

pub struct ClusterTopologyMonitor {
    service_name: String,
    coordinators: Vec<Arc<dyn CoordinatorClient>>,
    configured_quorum: Option<usize>,
    node_timeout: Duration,
}

impl std::fmt::Debug for ClusterTopologyMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterTopologyMonitor")
            .field("service_name", &self.service_name)
            .field(
                "coordinators",
                &self
                    .coordinators
                    .iter()
                    .map(|c| c.address().to_string())
                    .collect::<Vec<_>>(),
            )
            .field("configured_quorum", &self.configured_quorum)
            .field("node_timeout", &self.node_timeout)
            .finish()
    }
}

impl ClusterTopologyMonitor {
    pub fn new(config: &ClusterConfig, coordinators: Vec<Arc<dyn CoordinatorClient>>) -> Self {
        if coordinators.len() != config.coordinators.len() {
            warn!(
                configured = config.coordinators.len(),
                clients = coordinators.len(),
                "Coordinator client count differs from configured addresses"
            );
        }

        Self {
            service_name: config.service_name.clone(),
            coordinators,
            configured_quorum: config.quorum,
            node_timeout: config.node_timeout(),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn total_coordinators(&self) -> usize {
        self.coordinators.len()
    }

    pub fn quorum_size(&self) -> usize {
        quorum_size(self.coordinators.len(), self.configured_quorum)
    }

    /// Full topology poll
    #[instrument(skip(self), fields(service = %self.service_name))]
    pub async fn cluster_health(&self) -> ClusterSnapshot {
        let polls = join_all(
            self.coordinators
                .iter()
                .map(|client| self.poll_coordinator(Arc::clone(client))),
        )
        .await;

        let total = self.coordinators.len();
        let reachable = polls.iter().filter(|p| p.report.reachable).count();
        let quorum_met = quorum_met(reachable, total, self.configured_quorum);

        let (primary, primary_agreement) = elect_primary(&polls);
        let replicas = primary
            .as_ref()
            .and_then(|winner| {
                polls
                    .iter()
                    .filter(|p| p.primary.as_ref().map(|pr| &pr.address) == Some(&winner.address))
                    .find_map(|p| p.replicas.clone())
            })
            .unwrap_or_default();

        let mut snapshot = ClusterSnapshot {
            service_name: self.service_name.clone(),
            total_coordinators: total,
            reachable_coordinators: reachable,
            quorum_size: self.quorum_size(),
            quorum_met,
            primary,
            primary_agreement,
            replicas,
            failover_ready: false,
            coordinators: polls.into_iter().map(|p| p.report).collect(),
            timestamp: Utc::now(),
        };
        snapshot.failover_ready = FailoverAssessment::from_snapshot(&snapshot).capable;

        if snapshot.primary_disagreement() > 0 {
            warn!(
                primary = ?snapshot.primary.as_ref().map(|p| &p.address),
                agreement = snapshot.primary_agreement,
                disagreement = snapshot.primary_disagreement(),
                "Coordinators disagree on the current primary"
            );
        }

        debug!(
            reachable = snapshot.reachable_coordinators,
            total = snapshot.total_coordinators,
            quorum_met = snapshot.quorum_met,
            replicas = snapshot.replicas.len(),
            failover_ready = snapshot.failover_ready,
            "Cluster topology polled"
        );

        snapshot
    }

    /// Ping-only quorum check
    #[instrument(skip(self), fields(service = %self.service_name))]
    pub async fn quorum_check(&self) -> QuorumStatus {
        let reports = join_all(self.coordinators.iter().map(|client| {
            let client = Arc::clone(client);
            let node_timeout = self.node_timeout;
            async move {
                let start = Instant::now();
                let outcome = ping_with_timeout(client.as_ref(), node_timeout).await;
                CoordinatorReport {
                    address: client.address().to_string(),
                    reachable: outcome.is_ok(),
                    latency_ms: outcome
                        .as_ref()
                        .ok()
                        .map(|_| start.elapsed().as_secs_f64() * 1000.0),
                    reported_primary: None,
                    error: outcome.err().map(|e| e.to_string()),
                }
            }
        }))
        .await;

        let total = self.coordinators.len();
        let reachable = reports.iter().filter(|r| r.reachable).count();

        QuorumStatus {
            total_coordinators: total,
            reachable_coordinators: reachable,
            quorum_size: self.quorum_size(),
            quorum_met: quorum_met(reachable, total, self.configured_quorum),
            coordinators: reports,
        }
    }

    /// Itemized failover viability from a fresh topology poll
    pub async fn failover_capability(&self) -> FailoverAssessment {
        let snapshot = self.cluster_health().await;
        let assessment = FailoverAssessment::from_snapshot(&snapshot);
        info!(
            capable = assessment.capable,
            blockers = ?assessment.blockers,
            "Failover capability assessed"
        );
        assessment
    }

    /// Primary as reported by each reachable coordinator
    pub async fn primaries(&self) -> Vec<(String, Option<PrimaryInfo>)> {
        join_all(
            self.coordinators
                .iter()
                .map(|client| self.poll_coordinator(Arc::clone(client))),
        )
        .await
        .into_iter()
        .filter(|poll| poll.report.reachable)
        .map(|poll| (poll.report.address, poll.primary))
        .collect()
    }

    async fn poll_coordinator(&self, client: Arc<dyn CoordinatorClient>) -> NodePoll {
        let address = client.address().to_string();
        let start = Instant::now();

        if let Err(e) = ping_with_timeout(client.as_ref(), self.node_timeout).await {
            debug!(coordinator = %address, error = %e, "Coordinator unreachable");
            return NodePoll {
                report: CoordinatorReport {
                    address,
                    reachable: false,
                    latency_ms: None,
                    reported_primary: None,
                    error: Some(e.to_string()),
                },
                primary: None,
                replicas: None,
            };
        }
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        let mut errors = Vec::new();
        let primary = match bounded(self.node_timeout, client.primary(&self.service_name)).await {
            Ok(primary) => primary,
            Err(e) => {
                errors.push(format!("primary lookup failed: {e}"));
                None
            }
        };
        let replicas = match bounded(self.node_timeout, client.replicas(&self.service_name)).await
        {
            Ok(replicas) => Some(replicas),
            Err(e) => {
                errors.push(format!("replica listing failed: {e}"));
                None
            }
        };

        NodePoll {
            report: CoordinatorReport {
                address,
                reachable: true,
                latency_ms: Some(latency_ms),
                reported_primary: primary.as_ref().map(|p| p.address.clone()),
                error: (!errors.is_empty()).then(|| errors.join("; ")),
            },
            primary,
            replicas,
        }
    }
}

async fn ping_with_timeout(
    client: &dyn CoordinatorClient,
    node_timeout: Duration,
) -> Result<(), ProbeError> {
    bounded(node_timeout, client.ping()).await
}

async fn bounded<T>(
    limit: Duration,
    fut: impl std::future::Future<Output = Result<T, ProbeError>>,
) -> Result<T, ProbeError> {
    tokio::time::timeout(limit, fut).await.unwrap_or_else(|_| {
        Err(ProbeError::timeout(format!(
            "coordinator did not answer within {} ms",
            limit.as_millis()
        )))
    })
}

/// Majority vote over the primaries reported by reachable coordinators
fn elect_primary(polls: &[NodePoll]) -> (Option<PrimaryInfo>, usize) {
    let mut votes: HashMap<&str, usize> = HashMap::new();
    for primary in polls.iter().filter_map(|p| p.primary.as_ref()) {
        *votes.entry(primary.address.as_str()).or_insert(0) += 1;
    }

    let mut winner: Option<(&PrimaryInfo, usize)> = None;
    for primary in polls.iter().filter_map(|p| p.primary.as_ref()) {
        let count = votes.get(primary.address.as_str()).copied().unwrap_or(0);
        if winner.map_or(true, |(_, best)| count > best) {
            winner = Some((primary, count));
        }
    }

    match winner {
        Some((primary, count)) => (Some(primary.clone()), count),
        None => (None, 0),
    }
}

#[async_trait]
impl Probe for ClusterTopologyMonitor {
    async fn check(&self) -> ProbeResult {
        if self.coordinators.is_empty() {
            return Err(ProbeError::validation("no cluster coordinators configured"));
        }

        let snapshot = self.cluster_health().await;
        if snapshot.reachable_coordinators == 0 {
            return Err(ProbeError::connection(format!(
                "none of {} coordinators reachable",
                snapshot.total_coordinators
            )));
        }

        let details = match serde_json::to_value(&snapshot) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        };

        let result = if !snapshot.quorum_met {
            CheckResult::error(format!(
                "coordinator quorum lost: {}/{} reachable, {} required",
                snapshot.reachable_coordinators, snapshot.total_coordinators, snapshot.quorum_size
            ))
        } else if snapshot.primary.is_none() {
            CheckResult::error(format!(
                "no primary discoverable for service '{}'",
                snapshot.service_name
            ))
        } else if !snapshot.failover_ready {
            CheckResult::degraded("primary reachable but failover is not possible")
        } else if snapshot.primary_disagreement() > 0 {
            CheckResult::degraded(format!(
                "coordinators disagree on the primary ({} of {} agree)",
                snapshot.primary_agreement,
                snapshot.primary_agreement + snapshot.primary_disagreement()
            ))
        } else {
            CheckResult::healthy(format!(
                "primary healthy with {} of {} replicas available",
                snapshot.healthy_replicas(),
                snapshot.replicas.len()
            ))
        };

        Ok(result.with_details(details))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{LinkState, ReplicaStatus};

    fn primary(address: &str) -> PrimaryInfo {
        PrimaryInfo {
            address: address.to_string(),
            flags: vec!["master".to_string()],
            replica_count: 1,
        }
    }

    fn poll(address: &str, reported: Option<&str>) -> NodePoll {
        NodePoll {
            report: CoordinatorReport {
                address: address.to_string(),
                reachable: true,
                latency_ms: Some(1.0),
                reported_primary: reported.map(str::to_string),
                error: None,
            },
            primary: reported.map(primary),
            replicas: Some(vec![ReplicaInfo {
                address: "10.0.0.9:6379".into(),
                status: ReplicaStatus::Online,
                last_ping_ms: Some(3),
                link_state: LinkState::Up,
            }]),
        }
    }

    #[test]
    fn test_majority_primary_wins() {
        let polls = vec![
            poll("c1", Some("10.0.0.1:6379")),
            poll("c2", Some("10.0.0.2:6379")),
            poll("c3", Some("10.0.0.2:6379")),
        ];
        let (winner, agreement) = elect_primary(&polls);
        assert_eq!(winner.unwrap().address, "10.0.0.2:6379");
        assert_eq!(agreement, 2);
    }

    #[test]
    fn test_tie_goes_to_first_listed() {
        let polls = vec![
            poll("c1", Some("10.0.0.1:6379")),
            poll("c2", Some("10.0.0.2:6379")),
            poll("c3", None),
        ];
        let (winner, agreement) = elect_primary(&polls);
        assert_eq!(winner.unwrap().address, "10.0.0.1:6379");
        assert_eq!(agreement, 1);
    }

    #[test]
    fn test_no_primary_reported() {
        let polls = vec![poll("c1", None)];
        assert_eq!(elect_primary(&polls), (None, 0));
    }
}
