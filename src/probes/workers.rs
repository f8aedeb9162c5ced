//! Background worker liveness via heartbeats.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::probe::{CheckResult, Probe, ProbeError, ProbeResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerHeartbeat {
    pub worker_id: String,
    pub last_seen: DateTime<Utc>,
    pub active_tasks: u64,
}

impl WorkerHeartbeat {
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.last_seen).to_std().unwrap_or(Duration::ZERO)
    }
}

#[async_trait]
pub trait HeartbeatSource: Send + Sync {
    async fn heartbeats(&self) -> Result<Vec<WorkerHeartbeat>, ProbeError>;
}

/// In-process heartbeat registry workers report into
#[derive(Debug, Default)]
pub struct HeartbeatBoard {
    workers: DashMap<String, WorkerHeartbeat>,
}

impl HeartbeatBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn beat(&self, worker_id: impl Into<String>, active_tasks: u64) {
        let worker_id = worker_id.into();
        self.workers.insert(
            worker_id.clone(),
            WorkerHeartbeat {
                worker_id,
                last_seen: Utc::now(),
                active_tasks,
            },
        );
    }

    pub fn record(&self, heartbeat: WorkerHeartbeat) {
        self.workers.insert(heartbeat.worker_id.clone(), heartbeat);
    }

    pub fn remove(&self, worker_id: &str) -> Option<WorkerHeartbeat> {
        self.workers.remove(worker_id).map(|(_, heartbeat)| heartbeat)
    }
}

#[async_trait]
impl HeartbeatSource for HeartbeatBoard {
    async fn heartbeats(&self) -> Result<Vec<WorkerHeartbeat>, ProbeError> {
        Ok(self
            .workers
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }
}

/// Degraded when fewer than `min_workers` reported inside the staleness
/// window, Error when none did
pub struct WorkerHeartbeatProbe {
    source: Arc<dyn HeartbeatSource>,
    min_workers: usize,
    staleness: Duration,
}

impl std::fmt::Debug for WorkerHeartbeatProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHeartbeatProbe")
            .field("min_workers", &self.min_workers)
            .field("staleness", &self.staleness)
            .finish()
    }
}

impl WorkerHeartbeatProbe {
    pub fn new(source: Arc<dyn HeartbeatSource>, min_workers: usize, staleness: Duration) -> Self {
        Self {
            source,
            min_workers: min_workers.max(1),
            staleness,
        }
    }
}

#[async_trait]
impl Probe for WorkerHeartbeatProbe {
    async fn check(&self) -> ProbeResult {
        let now = Utc::now();
        let heartbeats = self.source.heartbeats().await?;
        let (fresh, stale): (Vec<_>, Vec<_>) = heartbeats
            .iter()
            .partition(|hb| hb.age(now) <= self.staleness);
        let active_tasks: u64 = fresh.iter().map(|hb| hb.active_tasks).sum();

        let result = if fresh.is_empty() {
            CheckResult::error(format!(
                "no worker heartbeat within {} s",
                self.staleness.as_secs()
            ))
        } else if fresh.len() < self.min_workers {
            CheckResult::degraded(format!(
                "{} of {} required workers alive",
                fresh.len(),
                self.min_workers
            ))
        } else {
            CheckResult::healthy(format!("{} workers alive", fresh.len()))
        };

        Ok(result
            .with_detail("alive_workers", fresh.len())
            .with_detail("stale_workers", stale.len())
            .with_detail("min_workers", self.min_workers)
            .with_detail("active_tasks", active_tasks)
            .with_detail(
                "stale_worker_ids",
                stale
                    .iter()
                    .map(|hb| hb.worker_id.clone())
                    .collect::<Vec<_>>(),
            ))
    }
}
