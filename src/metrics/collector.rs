//! # Metrics Collector
//!
//! Samples performance counters into a bounded in-memory history. The history
//! is the only state in the crate that outlives a single poll; the oldest
//! sample is dropped once the buffer is full.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

use super::trend::{
    analyze, recommend, CapacityRecommendation, MetricKind, PerformanceSnapshot, Priority,
    RecommendationThresholds, TrendAnalysis,
};
use crate::config::MetricsConfig;
use crate::probe::{CheckResult, Probe, ProbeError, ProbeResult};

/// Where performance snapshots come from
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn snapshot(&self) -> Result<PerformanceSnapshot, ProbeError>;
}

const TRENDED_METRICS: [MetricKind; 4] = [
    MetricKind::MemoryUsage,
    MetricKind::P99Latency,
    MetricKind::OpsPerSec,
    MetricKind::HitRatio,
];

pub struct MetricsCollector {
    source: Arc<dyn MetricsSource>,
    config: MetricsConfig,
    history: RwLock<VecDeque<PerformanceSnapshot>>,
}

impl std::fmt::Debug for MetricsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsCollector")
            .field("config", &self.config)
            .field("samples", &self.history.read().len())
            .finish()
    }
}

impl MetricsCollector {
    pub fn new(source: Arc<dyn MetricsSource>, config: MetricsConfig) -> Self {
        let capacity = config.max_history.max(1);
        Self {
            source,
            config,
            history: RwLock::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Sample the source and append to the history
    pub async fn collect(&self) -> Result<PerformanceSnapshot, ProbeError> {
        let snapshot = self.source.snapshot().await?;
        self.record(snapshot.clone());
        Ok(snapshot)
    }

    /// Append an externally obtained snapshot
    pub fn record(&self, snapshot: PerformanceSnapshot) {
        let mut history = self.history.write();
        while history.len() >= self.config.max_history.max(1) {
            history.pop_front();
        }
        history.push_back(snapshot);
        debug!(samples = history.len(), "Performance snapshot recorded");
    }

    pub fn history(&self) -> Vec<PerformanceSnapshot> {
        self.history.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.history.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.read().is_empty()
    }

    pub fn latest(&self) -> Option<PerformanceSnapshot> {
        self.history.read().back().cloned()
    }

    /// Trend over the most recent `window` samples (the whole history when
    /// `window` is 0 or larger than it)
    pub fn trend(&self, metric: MetricKind, window: usize) -> TrendAnalysis {
        let values: Vec<f64> = {
            let history = self.history.read();
            let skip = if window == 0 {
                0
            } else {
                history.len().saturating_sub(window)
            };
            history.iter().skip(skip).map(|s| metric.extract(s)).collect()
        };
        analyze(metric, &values, self.config.stable_band_percent)
    }

    pub fn capacity_recommendations(&self) -> Vec<CapacityRecommendation> {
        let trends: Vec<TrendAnalysis> = TRENDED_METRICS
            .iter()
            .map(|metric| self.trend(*metric, 0))
            .collect();

        recommend(
            &trends,
            RecommendationThresholds {
                memory_scale_percent: self.config.memory_scale_percent,
                ops_ceiling: self.config.ops_ceiling,
            },
        )
    }
}

/// Registers trend analysis as a non-critical health check
///
/// Each run collects one sample. The check is Degraded when any recommendation
/// carries High priority.
#[derive(Debug, Clone)]
pub struct PerformanceTrendProbe {
    collector: Arc<MetricsCollector>,
}

impl PerformanceTrendProbe {
    pub fn new(collector: Arc<MetricsCollector>) -> Self {
        Self { collector }
    }
}

#[async_trait]
impl Probe for PerformanceTrendProbe {
    async fn check(&self) -> ProbeResult {
        let snapshot = self.collector.collect().await?;
        let recommendations = self.collector.capacity_recommendations();
        let high = recommendations
            .iter()
            .filter(|r| r.priority == Priority::High)
            .count();

        let result = if high > 0 {
            CheckResult::degraded(format!(
                "{high} high-priority capacity recommendation(s) pending"
            ))
        } else {
            CheckResult::healthy(format!(
                "{} samples analysed, {} recommendation(s)",
                self.collector.len(),
                recommendations.len()
            ))
        };

        Ok(result
            .with_detail("samples", self.collector.len())
            .with_detail("ops_per_sec", snapshot.ops_per_sec)
            .with_detail("p99_latency_ms", snapshot.p99_latency_ms)
            .with_detail("memory_usage_percent", snapshot.memory_usage_percent)
            .with_detail(
                "recommendations",
                serde_json::to_value(&recommendations).unwrap_or(serde_json::Value::Null),
            ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parking_lot::Mutex;

    struct ScriptedSource {
        memory: Mutex<Vec<f64>>,
    }

    #[async_trait]
    impl MetricsSource for ScriptedSource {
        async fn snapshot(&self) -> Result<PerformanceSnapshot, ProbeError> {
            let mut memory = self.memory.lock();
            if memory.is_empty() {
                return Err(ProbeError::connection("metrics endpoint unreachable"));
            }
            Ok(snapshot(memory.remove(0)))
        }
    }

    fn snapshot(memory_usage_percent: f64) -> PerformanceSnapshot {
        PerformanceSnapshot {
            timestamp: Utc::now(),
            memory_usage_percent,
            ops_per_sec: 1_000.0,
            connected_clients: 10,
            hit_ratio_percent: 95.0,
            p99_latency_ms: 2.0,
            keyspace_size: 5_000,
        }
    }

    fn config(max_history: usize) -> MetricsConfig {
        MetricsConfig {
            max_history,
            ..MetricsConfig::default()
        }
    }

    #[test]
    fn test_history_is_bounded() {
        let collector = MetricsCollector::new(
            Arc::new(ScriptedSource {
                memory: Mutex::new(Vec::new()),
            }),
            config(3),
        );
        for usage in [10.0, 20.0, 30.0, 40.0] {
            collector.record(snapshot(usage));
        }

        let kept: Vec<f64> = collector
            .history()
            .iter()
            .map(|s| s.memory_usage_percent)
            .collect();
        assert_eq!(kept, vec![20.0, 30.0, 40.0]);
    }

    #[test]
    fn test_trend_window() {
        let collector = MetricsCollector::new(
            Arc::new(ScriptedSource {
                memory: Mutex::new(Vec::new()),
            }),
            config(10),
        );
        for usage in [90.0, 50.0, 50.0, 50.0] {
            collector.record(snapshot(usage));
        }

        assert_eq!(
            collector.trend(MetricKind::MemoryUsage, 0).direction,
            crate::metrics::TrendDirection::Decreasing
        );
        assert_eq!(
            collector.trend(MetricKind::MemoryUsage, 3).direction,
            crate::metrics::TrendDirection::Stable
        );
    }

    #[tokio::test]
    async fn test_probe_degrades_on_high_priority() {
        let collector = Arc::new(MetricsCollector::new(
            Arc::new(ScriptedSource {
                memory: Mutex::new(vec![80.0, 86.0, 92.0]),
            }),
            config(10),
        ));
        let probe = PerformanceTrendProbe::new(Arc::clone(&collector));

        assert!(probe.check().await.unwrap().is_healthy());
        assert!(probe.check().await.unwrap().is_healthy());
        let third = probe.check().await.unwrap();
        assert_eq!(third.status, crate::probe::CheckStatus::Degraded);

        let err = probe.check().await.unwrap_err();
        assert_eq!(err.kind, crate::probe::ErrorKind::ConnectionFailure);
        assert_eq!(collector.len(), 3);
    }
}
