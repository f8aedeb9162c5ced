//! # Trend Analysis
//!
//! Least-squares trend classification over the metrics history and the
//! capacity-planning rules built on top of it.
//!
//! The fitted slope is projected across the whole window and compared with the
//! window mean. A projected change within the stable band (5% by default) is
//! Stable; anything larger is Increasing or Decreasing.

use serde::{Deserialize, Serialize};

use crate::constants::trends::MIN_SAMPLES;

/// Performance counters sampled at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub memory_usage_percent: f64,
    pub ops_per_sec: f64,
    pub connected_clients: u64,
    pub hit_ratio_percent: f64,
    pub p99_latency_ms: f64,
    pub keyspace_size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    MemoryUsage,
    OpsPerSec,
    ConnectedClients,
    HitRatio,
    P99Latency,
    KeyspaceSize,
}

impl MetricKind {
    pub fn extract(&self, snapshot: &PerformanceSnapshot) -> f64 {
        match self {
            MetricKind::MemoryUsage => snapshot.memory_usage_percent,
            MetricKind::OpsPerSec => snapshot.ops_per_sec,
            MetricKind::ConnectedClients => snapshot.connected_clients as f64,
            MetricKind::HitRatio => snapshot.hit_ratio_percent,
            MetricKind::P99Latency => snapshot.p99_latency_ms,
            MetricKind::KeyspaceSize => snapshot.keyspace_size as f64,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::MemoryUsage => "memory_usage_percent",
            MetricKind::OpsPerSec => "ops_per_sec",
            MetricKind::ConnectedClients => "connected_clients",
            MetricKind::HitRatio => "hit_ratio_percent",
            MetricKind::P99Latency => "p99_latency_ms",
            MetricKind::KeyspaceSize => "keyspace_size",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
    InsufficientData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub metric: MetricKind,
    pub direction: TrendDirection,
    pub samples: usize,
    pub slope_per_sample: f64,
    pub mean: f64,
    /// Projected change across the window relative to the mean
    pub change_percent: f64,
    pub latest: Option<f64>,
}

/// Classify a series of values, oldest first
pub fn analyze(metric: MetricKind, values: &[f64], stable_band_percent: f64) -> TrendAnalysis {
    let samples = values.len();
    let latest = values.last().copied();

    if samples < MIN_SAMPLES {
        return TrendAnalysis {
            metric,
            direction: TrendDirection::InsufficientData,
            samples,
            slope_per_sample: 0.0,
            mean: values.iter().sum::<f64>() / samples.max(1) as f64,
            change_percent: 0.0,
            latest,
        };
    }

    let n = samples as f64;
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = values.iter().sum::<f64>() / n;

    let (num, den) = values
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(num, den), (i, y)| {
            let dx = i as f64 - mean_x;
            (num + dx * (y - mean_y), den + dx * dx)
        });
    let slope = if den == 0.0 { 0.0 } else { num / den };

    let projected_change = slope * (n - 1.0);
    let change_percent = if mean_y.abs() > f64::EPSILON {
        projected_change / mean_y.abs() * 100.0
    } else if projected_change.abs() > f64::EPSILON {
        projected_change.signum() * f64::INFINITY
    } else {
        0.0
    };

    let direction = if change_percent.abs() <= stable_band_percent {
        TrendDirection::Stable
    } else if change_percent > 0.0 {
        TrendDirection::Increasing
    } else {
        TrendDirection::Decreasing
    };

    TrendAnalysis {
        metric,
        direction,
        samples,
        slope_per_sample: slope,
        mean: mean_y,
        change_percent,
        latest,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    ScaleMemory,
    InvestigateLatency,
    AddReplicas,
    TuneEviction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityRecommendation {
    pub kind: RecommendationKind,
    pub priority: Priority,
    pub metric: MetricKind,
    pub current_value: f64,
    pub message: String,
}

/// Thresholds the recommendation rules compare against
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecommendationThresholds {
    pub memory_scale_percent: f64,
    pub ops_ceiling: f64,
}

/// Derive recommendations from per-metric trends
///
/// - memory rising above the scale threshold: scale memory
/// - p99 latency rising: investigate latency
/// - ops/sec rising above the ceiling: add replicas
/// - hit ratio falling: tune eviction
pub fn recommend(
    trends: &[TrendAnalysis],
    thresholds: RecommendationThresholds,
) -> Vec<CapacityRecommendation> {
    let mut recommendations = Vec::new();

    for trend in trends {
        let Some(current) = trend.latest else {
            continue;
        };

        match (trend.metric, trend.direction) {
            (MetricKind::MemoryUsage, TrendDirection::Increasing)
                if current > thresholds.memory_scale_percent =>
            {
                let priority = if current >= 85.0 {
                    Priority::High
                } else {
                    Priority::Medium
                };
                recommendations.push(CapacityRecommendation {
                    kind: RecommendationKind::ScaleMemory,
                    priority,
                    metric: trend.metric,
                    current_value: current,
                    message: format!(
                        "memory usage {current:.1}% and rising; increase maxmemory or add shards"
                    ),
                });
            }
            (MetricKind::P99Latency, TrendDirection::Increasing) => {
                let priority = if trend.change_percent > 50.0 {
                    Priority::High
                } else {
                    Priority::Medium
                };
                recommendations.push(CapacityRecommendation {
                    kind: RecommendationKind::InvestigateLatency,
                    priority,
                    metric: trend.metric,
                    current_value: current,
                    message: format!(
                        "p99 latency {current:.1} ms rising {:.0}% across the window",
                        trend.change_percent
                    ),
                });
            }
            (MetricKind::OpsPerSec, TrendDirection::Increasing)
                if current > thresholds.ops_ceiling =>
            {
                let priority = if current > thresholds.ops_ceiling * 1.5 {
                    Priority::High
                } else {
                    Priority::Medium
                };
                recommendations.push(CapacityRecommendation {
                    kind: RecommendationKind::AddReplicas,
                    priority,
                    metric: trend.metric,
                    current_value: current,
                    message: format!(
                        "{current:.0} ops/sec exceeds ceiling {:.0} and rising; add read replicas",
                        thresholds.ops_ceiling
                    ),
                });
            }
            (MetricKind::HitRatio, TrendDirection::Decreasing) => {
                let priority = if current < 80.0 {
                    Priority::Medium
                } else {
                    Priority::Low
                };
                recommendations.push(CapacityRecommendation {
                    kind: RecommendationKind::TuneEviction,
                    priority,
                    metric: trend.metric,
                    current_value: current,
                    message: format!(
                        "hit ratio {current:.1}% falling; review TTLs and eviction policy"
                    ),
                });
            }
            _ => {}
        }
    }

    recommendations
}
