//! # Performance Metrics
//!
//! Bounded performance history, trend classification and capacity planning.

pub mod collector;
pub mod trend;

pub use collector::{MetricsCollector, MetricsSource, PerformanceTrendProbe};
pub use trend::{
    analyze, recommend, CapacityRecommendation, MetricKind, PerformanceSnapshot, Priority,
    RecommendationKind, RecommendationThresholds, TrendAnalysis, TrendDirection,
};
