//! # Memory Pressure Manager
//!
//! Samples cache memory counters, raises tiered alerts and runs a
//! priority-ordered keyspace cleanup.
//!
//! Cleanup is single-flight: a call made while another is running is rejected
//! immediately. Unforced calls are rate limited to one per optimize interval
//! (15 minutes by default) and return a `skipped` report inside the window.

use async_trait::async_trait;
use opentelemetry::KeyValue;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::alert::{AlertKind, AlertLevel, MemoryAlert};
use super::client::CacheAdminClient;
use super::patterns::{default_pattern_classes, PatternClass};
use super::sample::MemorySample;
use crate::config::MemoryConfig;
use crate::probe::{CheckResult, Probe, ProbeError, ProbeResult};
use crate::telemetry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationStatus {
    Completed,
    /// Inside the rate-limit window; nothing was touched
    Skipped,
    /// Another optimization was already running
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCleanup {
    pub pattern: String,
    pub keys_removed: u64,
    pub bytes_reclaimed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationReport {
    pub status: OptimizationStatus,
    pub keys_removed: u64,
    pub bytes_reclaimed: u64,
    pub classes: Vec<ClassCleanup>,
    pub usage_before_percent: Option<f64>,
    pub usage_after_percent: Option<f64>,
    pub reason: Option<String>,
}

impl OptimizationReport {
    fn not_run(status: OptimizationStatus, reason: impl Into<String>) -> Self {
        Self {
            status,
            keys_removed: 0,
            bytes_reclaimed: 0,
            classes: Vec::new(),
            usage_before_percent: None,
            usage_after_percent: None,
            reason: Some(reason.into()),
        }
    }
}

/// Clears the single-flight flag when an optimization ends
struct OptimizeFlight<'a>(&'a AtomicBool);

impl Drop for OptimizeFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct MemoryPressureManager {
    client: Arc<dyn CacheAdminClient>,
    config: MemoryConfig,
    patterns: Vec<PatternClass>,
    optimizing: AtomicBool,
    last_optimized: Mutex<Option<Instant>>,
}

impl std::fmt::Debug for MemoryPressureManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPressureManager")
            .field("config", &self.config)
            .field("patterns", &self.patterns.len())
            .field("optimizing", &self.optimizing.load(Ordering::Relaxed))
            .finish()
    }
}

impl MemoryPressureManager {
    pub fn new(client: Arc<dyn CacheAdminClient>, config: MemoryConfig) -> Self {
        Self::with_patterns(client, config, default_pattern_classes())
    }

    pub fn with_patterns(
        client: Arc<dyn CacheAdminClient>,
        config: MemoryConfig,
        patterns: Vec<PatternClass>,
    ) -> Self {
        Self {
            client,
            config,
            patterns,
            optimizing: AtomicBool::new(false),
            last_optimized: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub fn patterns(&self) -> &[PatternClass] {
        &self.patterns
    }

    pub fn is_optimizing(&self) -> bool {
        self.optimizing.load(Ordering::Acquire)
    }

    /// Read current counters, filling host memory for unbounded caches
    pub async fn sample(&self) -> Result<MemorySample, ProbeError> {
        let mut sample = self.client.memory_stats().await?;
        if sample.max_bytes == 0 && sample.host_memory_bytes.is_none() {
            sample.host_memory_bytes = self.client.host_memory_bytes().await?;
        }
        Ok(sample)
    }

    /// At most one usage alert (the highest crossed level) plus fragmentation
    /// and hit-ratio alerts
    pub fn evaluate(&self, sample: &MemorySample) -> Vec<MemoryAlert> {
        let mut alerts = Vec::new();

        if let Some(usage) = sample.usage_percent() {
            let crossed = [
                (
                    AlertLevel::Emergency,
                    self.config.emergency_threshold_percent,
                    "Run forced memory optimization now and add capacity",
                ),
                (
                    AlertLevel::Critical,
                    self.config.critical_threshold_percent,
                    "Run memory optimization and review eviction policy",
                ),
                (
                    AlertLevel::Warning,
                    self.config.warning_threshold_percent,
                    "Monitor growth and schedule cleanup of disposable keys",
                ),
            ]
            .into_iter()
            .find(|(_, threshold, _)| usage >= *threshold);

            if let Some((level, threshold, action)) = crossed {
                alerts.push(MemoryAlert::new(
                    AlertKind::MemoryUsage,
                    level,
                    format!("memory usage {usage:.1}% crossed {level} threshold {threshold:.1}%"),
                    threshold,
                    usage,
                    action,
                ));
            }
        }

        if sample.fragmentation_ratio > self.config.fragmentation_ratio_limit {
            alerts.push(MemoryAlert::new(
                AlertKind::Fragmentation,
                AlertLevel::Warning,
                format!(
                    "fragmentation ratio {:.2} exceeds {:.2}",
                    sample.fragmentation_ratio, self.config.fragmentation_ratio_limit
                ),
                self.config.fragmentation_ratio_limit,
                sample.fragmentation_ratio,
                "Enable active defragmentation or schedule a restart during low traffic",
            ));
        }

        if sample.lookups() > self.config.hit_ratio_min_sample_volume {
            let hit_ratio = sample.hit_ratio_percent();
            if hit_ratio < self.config.min_hit_ratio_percent {
                alerts.push(MemoryAlert::new(
                    AlertKind::HitRatio,
                    AlertLevel::Warning,
                    format!(
                        "hit ratio {hit_ratio:.1}% below {:.1}%",
                        self.config.min_hit_ratio_percent
                    ),
                    self.config.min_hit_ratio_percent,
                    hit_ratio,
                    "Review TTLs and eviction policy; the working set may exceed memory",
                ));
            }
        }

        for alert in &alerts {
            telemetry::memory_alerts_total()
                .add(1, &[KeyValue::new("level", alert.level.as_str())]);
        }
        alerts
    }

    /// Walk the pattern classes until usage drops below the Warning threshold
    #[instrument(skip(self))]
    pub async fn optimize(&self, force: bool) -> Result<OptimizationReport, ProbeError> {
        if self
            .optimizing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            info!("Memory optimization already running, rejecting concurrent request");
            return Ok(OptimizationReport::not_run(
                OptimizationStatus::Rejected,
                "optimization already in progress",
            ));
        }
        let _flight = OptimizeFlight(&self.optimizing);

        if !force {
            let last = *self.last_optimized.lock();
            if let Some(last) = last {
                let elapsed = last.elapsed();
                let interval = self.config.optimize_interval();
                if elapsed < interval {
                    let remaining = (interval - elapsed).as_secs();
                    debug!(remaining_seconds = remaining, "Memory optimization rate limited");
                    return Ok(OptimizationReport::not_run(
                        OptimizationStatus::Skipped,
                        format!("rate limited, next unforced run allowed in {remaining}s"),
                    ));
                }
            }
        }

        let before = self.sample().await?;
        let Some(usage_before) = before.usage_percent() else {
            warn!("Memory usage cannot be measured, skipping optimization");
            return Ok(OptimizationReport::not_run(
                OptimizationStatus::Skipped,
                "memory usage unavailable: no maxmemory limit or host memory reported",
            ));
        };
        let mut usage_now = Some(usage_before);
        let mut classes = Vec::new();

        for class in &self.patterns {
            if self.cleanup_done(usage_now) {
                break;
            }
            let (cleanup, usage_after_class) = self.clean_class(class, usage_now).await?;
            usage_now = usage_after_class;
            if cleanup.keys_removed > 0 {
                telemetry::memory_keys_reclaimed_total().add(
                    cleanup.keys_removed,
                    &[KeyValue::new("pattern", cleanup.pattern.clone())],
                );
            }
            classes.push(cleanup);
        }

        *self.last_optimized.lock() = Some(Instant::now());

        let keys_removed = classes.iter().map(|c| c.keys_removed).sum();
        let bytes_reclaimed = classes.iter().map(|c| c.bytes_reclaimed).sum();

        info!(
            force = force,
            keys_removed = keys_removed,
            bytes_reclaimed = bytes_reclaimed,
            usage_before = usage_before,
            usage_after = ?usage_now,
            "Memory optimization completed"
        );

        Ok(OptimizationReport {
            status: OptimizationStatus::Completed,
            keys_removed,
            bytes_reclaimed,
            classes,
            usage_before_percent: Some(usage_before),
            usage_after_percent: usage_now,
            reason: None,
        })
    }

    /// Cleanup stops below the Warning threshold or once usage can no longer
    /// be measured
    fn cleanup_done(&self, usage: Option<f64>) -> bool {
        usage.map_or(true, |u| u < self.config.warning_threshold_percent)
    }

    async fn clean_class(
        &self,
        class: &PatternClass,
        mut usage: Option<f64>,
    ) -> Result<(ClassCleanup, Option<f64>), ProbeError> {
        let mut cleanup = ClassCleanup {
            pattern: class.pattern.clone(),
            keys_removed: 0,
            bytes_reclaimed: 0,
        };

        let candidates = self
            .client
            .scan(&class.pattern, self.config.max_keys_per_class)
            .await?;

        let mut eligible = Vec::with_capacity(candidates.len());
        for key in candidates {
            if class.min_idle_seconds.is_none()
                || class.accepts_idle(self.client.idle_seconds(&key).await?)
            {
                eligible.push(key);
            }
        }

        for batch in eligible.chunks(self.config.cleanup_batch_size.max(1)) {
            let mut sizes = Vec::with_capacity(batch.len());
            for key in batch {
                sizes.push(self.client.memory_usage(key).await?.unwrap_or(0));
            }

            let removed = match self.client.delete(batch).await {
                Ok(removed) => removed,
                Err(e) => {
                    warn!(pattern = %class.pattern, error = %e, "Batch delete failed, moving to next class");
                    break;
                }
            };
            cleanup.keys_removed += removed;
            cleanup.bytes_reclaimed += if removed as usize >= batch.len() {
                sizes.iter().sum()
            } else {
                self.reclaimed_bytes(batch, &sizes).await?
            };

            usage = self.sample().await?.usage_percent();
            if self.cleanup_done(usage) {
                break;
            }
        }

        debug!(
            pattern = %class.pattern,
            keys_removed = cleanup.keys_removed,
            bytes_reclaimed = cleanup.bytes_reclaimed,
            "Pattern class cleaned"
        );
        Ok((cleanup, usage))
    }

    /// Bytes held by the keys of a partially deleted batch that are now gone
    async fn reclaimed_bytes(&self, batch: &[String], sizes: &[u64]) -> Result<u64, ProbeError> {
        let mut reclaimed = 0;
        for (key, size) in batch.iter().zip(sizes) {
            if self.client.memory_usage(key).await?.is_none() {
                reclaimed += size;
            }
        }
        Ok(reclaimed)
    }
}

/// Registers memory pressure as a health check
///
/// Warning alerts report Degraded; Critical and Emergency report Error. With
/// `auto_optimize` enabled, a Critical or worse reading also starts an unforced
/// cleanup in the background.
#[derive(Debug, Clone)]
pub struct MemoryPressureProbe {
    manager: Arc<MemoryPressureManager>,
}

impl MemoryPressureProbe {
    pub fn new(manager: Arc<MemoryPressureManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Probe for MemoryPressureProbe {
    async fn check(&self) -> ProbeResult {
        let sample = self.manager.sample().await?;
        let alerts = self.manager.evaluate(&sample);
        let worst = alerts.iter().map(|a| a.level).max();

        if self.manager.config().auto_optimize
            && worst >= Some(AlertLevel::Critical)
            && !self.manager.is_optimizing()
        {
            let manager = Arc::clone(&self.manager);
            tokio::spawn(async move {
                if let Err(e) = manager.optimize(false).await {
                    warn!(error = %e, "Automatic memory optimization failed");
                }
            });
        }

        let usage = sample.usage_percent();
        let message = match (&worst, alerts.first()) {
            (None, _) => match usage {
                Some(u) => format!("memory usage {u:.1}%"),
                None => "memory usage within limits (no ceiling configured)".to_string(),
            },
            (Some(_), Some(first)) => first.message.clone(),
            (Some(_), None) => "memory alerts raised".to_string(),
        };

        let result = match worst {
            None => CheckResult::healthy(message),
            Some(AlertLevel::Warning) => CheckResult::degraded(message),
            Some(_) => CheckResult::error(message),
        };

        Ok(result
            .with_detail("used_bytes", sample.used_bytes)
            .with_detail("max_bytes", sample.max_bytes)
            .with_detail("usage_percent", usage)
            .with_detail("fragmentation_ratio", sample.fragmentation_ratio)
            .with_detail("hit_ratio_percent", sample.hit_ratio_percent())
            .with_detail("evicted_keys", sample.evicted_keys)
            .with_detail(
                "alerts",
                serde_json::to_value(&alerts).unwrap_or(serde_json::Value::Null),
            ))
    }
}
