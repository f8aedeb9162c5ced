use async_trait::async_trait;
use healthwatch_core::cluster::{
    CoordinatorClient, LinkState, PrimaryInfo, ReplicaInfo, ReplicaStatus,
};
use healthwatch_core::memory::{CacheAdminClient, MemorySample};
use healthwatch_core::metrics::{MetricsSource, PerformanceSnapshot};
use healthwatch_core::orchestration::ResultSink;
use healthwatch_core::probe::{CheckResult, CheckStatus, Probe, ProbeError, ProbeResult};
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Probe that replays a script of outcomes and counts invocations.
/// Once the script is exhausted the last outcome repeats.
pub struct CountingProbe {
    script: Mutex<VecDeque<ProbeResult>>,
    last: Mutex<ProbeResult>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl CountingProbe {
    pub fn always(outcome: ProbeResult) -> Arc<Self> {
        Self::scripted(vec![outcome])
    }

    pub fn scripted(outcomes: Vec<ProbeResult>) -> Arc<Self> {
        let last = outcomes
            .last()
            .cloned()
            .unwrap_or_else(|| Ok(CheckResult::healthy("ok")));
        Arc::new(Self {
            script: Mutex::new(outcomes.into()),
            last: Mutex::new(last),
            delay: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn slow(delay: Duration, outcome: ProbeResult) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            last: Mutex::new(outcome),
            delay: Some(delay),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Probe for CountingProbe {
    async fn check(&self) -> ProbeResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.script.lock().pop_front();
        match next {
            Some(outcome) => {
                *self.last.lock() = outcome.clone();
                outcome
            }
            None => self.last.lock().clone(),
        }
    }
}

pub fn healthy() -> ProbeResult {
    Ok(CheckResult::healthy("ok"))
}

pub fn refused() -> ProbeResult {
    Err(ProbeError::connection("connection refused"))
}

/// Coordinator node with a fixed view of the service
pub struct MockCoordinator {
    pub address: String,
    pub reachable: bool,
    pub primary: Option<PrimaryInfo>,
    pub replicas: Vec<ReplicaInfo>,
}

impl MockCoordinator {
    pub fn healthy(address: &str, primary: &str, replicas: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            address: address.to_string(),
            reachable: true,
            primary: Some(PrimaryInfo {
                address: primary.to_string(),
                flags: vec!["master".to_string()],
                replica_count: replicas.len(),
            }),
            replicas: replicas.iter().map(|r| online_replica(r)).collect(),
        })
    }

    pub fn unreachable(address: &str) -> Arc<Self> {
        Arc::new(Self {
            address: address.to_string(),
            reachable: false,
            primary: None,
            replicas: Vec::new(),
        })
    }
}

pub fn online_replica(address: &str) -> ReplicaInfo {
    ReplicaInfo {
        address: address.to_string(),
        status: ReplicaStatus::Online,
        last_ping_ms: Some(10),
        link_state: LinkState::Up,
    }
}

#[async_trait]
impl CoordinatorClient for MockCoordinator {
    fn address(&self) -> &str {
        &self.address
    }

    async fn ping(&self) -> Result<(), ProbeError> {
        if self.reachable {
            Ok(())
        } else {
            Err(ProbeError::connection(format!("{} refused", self.address)))
        }
    }

    async fn primary(&self, _service_name: &str) -> Result<Option<PrimaryInfo>, ProbeError> {
        Ok(self.primary.clone())
    }

    async fn replicas(&self, _service_name: &str) -> Result<Vec<ReplicaInfo>, ProbeError> {
        Ok(self.replicas.clone())
    }
}

pub fn coordinators(nodes: Vec<Arc<MockCoordinator>>) -> Vec<Arc<dyn CoordinatorClient>> {
    nodes
        .into_iter()
        .map(|node| node as Arc<dyn CoordinatorClient>)
        .collect()
}

/// Cache whose used memory is a fixed baseline plus the size of every key
pub struct MockCacheAdmin {
    pub baseline: u64,
    pub max_bytes: u64,
    pub keys: Mutex<BTreeMap<String, (u64, u64)>>,
    pub scan_delay: Option<Duration>,
    pub deletes: AtomicUsize,
}

impl MockCacheAdmin {
    /// `keys` are `(name, size_bytes, idle_seconds)`
    pub fn new(baseline: u64, max_bytes: u64, keys: &[(&str, u64, u64)]) -> Self {
        Self {
            baseline,
            max_bytes,
            keys: Mutex::new(
                keys.iter()
                    .map(|(k, size, idle)| (k.to_string(), (*size, *idle)))
                    .collect(),
            ),
            scan_delay: None,
            deletes: AtomicUsize::new(0),
        }
    }

    pub fn with_scan_delay(mut self, delay: Duration) -> Self {
        self.scan_delay = Some(delay);
        self
    }

    pub fn key_count(&self) -> usize {
        self.keys.lock().len()
    }
}

fn glob_matches(pattern: &str, key: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => key.starts_with(prefix),
        None => key == pattern,
    }
}

#[async_trait]
impl CacheAdminClient for MockCacheAdmin {
    async fn memory_stats(&self) -> Result<MemorySample, ProbeError> {
        let used: u64 = self.keys.lock().values().map(|(size, _)| size).sum();
        Ok(MemorySample {
            used_bytes: self.baseline + used,
            max_bytes: self.max_bytes,
            fragmentation_ratio: 1.0,
            ..Default::default()
        })
    }

    async fn host_memory_bytes(&self) -> Result<Option<u64>, ProbeError> {
        Ok(None)
    }

    async fn scan(&self, pattern: &str, limit: usize) -> Result<Vec<String>, ProbeError> {
        if let Some(delay) = self.scan_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self
            .keys
            .lock()
            .keys()
            .filter(|k| glob_matches(pattern, k))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn memory_usage(&self, key: &str) -> Result<Option<u64>, ProbeError> {
        Ok(self.keys.lock().get(key).map(|(size, _)| *size))
    }

    async fn idle_seconds(&self, key: &str) -> Result<Option<u64>, ProbeError> {
        Ok(self.keys.lock().get(key).map(|(_, idle)| *idle))
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, ProbeError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        let mut map = self.keys.lock();
        Ok(keys.iter().filter(|k| map.remove(*k).is_some()).count() as u64)
    }
}

/// Sink that keeps everything it was handed
#[derive(Default)]
pub struct RecordingSink {
    pub results: Mutex<Vec<(String, CheckResult)>>,
    pub statuses: Mutex<Vec<(String, CheckStatus)>>,
}

#[async_trait]
impl ResultSink for RecordingSink {
    async fn record_result(
        &self,
        check_name: &str,
        result: &CheckResult,
    ) -> healthwatch_core::Result<()> {
        self.results
            .lock()
            .push((check_name.to_string(), result.clone()));
        Ok(())
    }

    async fn record_status(
        &self,
        check_name: &str,
        status: CheckStatus,
    ) -> healthwatch_core::Result<()> {
        self.statuses.lock().push((check_name.to_string(), status));
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Hands out queued snapshots, then fails
#[derive(Default)]
pub struct MockMetricsSource {
    pub snapshots: Mutex<VecDeque<PerformanceSnapshot>>,
}

impl MockMetricsSource {
    pub fn new(snapshots: Vec<PerformanceSnapshot>) -> Self {
        Self {
            snapshots: Mutex::new(snapshots.into()),
        }
    }
}

#[async_trait]
impl MetricsSource for MockMetricsSource {
    async fn snapshot(&self) -> Result<PerformanceSnapshot, ProbeError> {
        self.snapshots
            .lock()
            .pop_front()
            .ok_or_else(|| ProbeError::connection("metrics source exhausted"))
    }
}

pub fn snapshot(memory_usage_percent: f64, p99_latency_ms: f64) -> PerformanceSnapshot {
    PerformanceSnapshot {
        timestamp: chrono::Utc::now(),
        memory_usage_percent,
        ops_per_sec: 1_000.0,
        connected_clients: 10,
        hit_ratio_percent: 95.0,
        p99_latency_ms,
        keyspace_size: 10_000,
    }
}
