//! # Memory Pressure
//!
//! Cache memory sampling, tiered alerting and keyspace cleanup.

pub mod alert;
pub mod client;
pub mod manager;
pub mod patterns;
pub mod sample;

pub use alert::{AlertKind, AlertLevel, MemoryAlert};
pub use client::CacheAdminClient;
pub use manager::{
    ClassCleanup, MemoryPressureManager, MemoryPressureProbe, OptimizationReport,
    OptimizationStatus,
};
pub use patterns::{default_pattern_classes, PatternClass};
pub use sample::MemorySample;
