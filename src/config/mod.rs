//! # Configuration
//!
//! Typed configuration for the health core. Every section has serde defaults so
//! a missing file, or a file that only overrides a few keys, still produces a
//! complete [`HealthwatchConfig`].
//!
//! ## Layering
//!
//! [`ConfigManager`] merges, lowest precedence first:
//!
//! 1. Built-in defaults
//! 2. `{config_dir}/healthwatch.{toml,yaml,json}` (optional)
//! 3. `{config_dir}/healthwatch.{environment}.{toml,yaml,json}` (optional)
//! 4. `HEALTHWATCH__SECTION__KEY` environment variables
//!
//! ```toml
//! [orchestrator]
//! max_concurrency = 8
//! default_check_timeout_ms = 5000
//!
//! [circuit_breakers.default]
//! failure_threshold = 5
//! open_duration_seconds = 60
//!
//! [circuit_breakers.component_configs.payments_api]
//! failure_threshold = 3
//! open_duration_seconds = 30
//!
//! [cluster]
//! service_name = "cache-primary"
//! coordinators = ["10.0.0.1:26379", "10.0.0.2:26379", "10.0.0.3:26379"]
//! ```

pub mod error;
pub mod loader;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::constants::{memory, timeouts, trends};
use crate::resilience::{CircuitBreakerConfig, CircuitBreakerManager};

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthwatchConfig {
    pub orchestrator: OrchestratorConfig,
    pub circuit_breakers: CircuitBreakersConfig,
    pub cluster: ClusterConfig,
    pub memory: MemoryConfig,
    pub metrics: MetricsConfig,
    pub security: SecurityConfig,
}

impl HealthwatchConfig {
    /// Range checks across every section
    pub fn validate(&self) -> ConfigResult<()> {
        self.orchestrator.validate()?;
        self.circuit_breakers.validate()?;
        self.cluster.validate()?;
        self.memory.validate()?;
        self.metrics.validate()?;
        Ok(())
    }

    /// Startup security checks
    ///
    /// In production a missing TLS certificate, key or credentials file aborts
    /// startup. Elsewhere the problem is logged and the affected capability is
    /// reported as disabled.
    pub fn check_security(&self, environment: &str) -> ConfigResult<SecurityCapabilities> {
        let strict = environment == "production";
        let mut capabilities = SecurityCapabilities {
            tls: self.security.tls_enabled,
            credentials: self.security.require_credentials,
        };

        if self.security.tls_enabled {
            let missing = [
                ("TLS certificate", &self.security.tls_cert_path),
                ("TLS private key", &self.security.tls_key_path),
            ]
            .into_iter()
            .find(|(_, path)| !path_exists(path.as_deref()));

            if let Some((asset, path)) = missing {
                if strict {
                    return Err(ConfigurationError::missing_security_asset(
                        asset,
                        environment,
                        path.clone(),
                    ));
                }
                warn!(
                    environment = %environment,
                    asset = asset,
                    path = ?path,
                    "Security asset missing, continuing with TLS disabled"
                );
                capabilities.tls = false;
            }
        }

        if self.security.require_credentials
            && !path_exists(self.security.credentials_path.as_deref())
        {
            if strict {
                return Err(ConfigurationError::missing_security_asset(
                    "credentials file",
                    environment,
                    self.security.credentials_path.clone(),
                ));
            }
            warn!(
                environment = %environment,
                path = ?self.security.credentials_path,
                "Credentials file missing, continuing without authenticated coordinator access"
            );
            capabilities.credentials = false;
        }

        Ok(capabilities)
    }
}

fn path_exists(path: Option<&Path>) -> bool {
    path.map(|p| p.is_file()).unwrap_or(false)
}

/// Which security-dependent capabilities survived the startup checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityCapabilities {
    pub tls: bool,
    pub credentials: bool,
}

/// Check execution settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Maximum probes in flight per pass; 0 uses the number of available cores
    pub max_concurrency: usize,
    pub default_check_timeout_ms: u64,
    pub heavy_check_timeout_ms: u64,
    /// Deadline for joining a whole pass
    pub pool_timeout_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 0,
            default_check_timeout_ms: timeouts::LIGHT_CHECK.as_millis() as u64,
            heavy_check_timeout_ms: timeouts::HEAVY_CHECK.as_millis() as u64,
            pool_timeout_ms: timeouts::POOL_JOIN.as_millis() as u64,
        }
    }
}

impl OrchestratorConfig {
    pub fn effective_concurrency(&self) -> usize {
        if self.max_concurrency == 0 {
            num_cpus::get().max(1)
        } else {
            self.max_concurrency
        }
    }

    pub fn default_check_timeout(&self) -> Duration {
        Duration::from_millis(self.default_check_timeout_ms)
    }

    pub fn heavy_check_timeout(&self) -> Duration {
        Duration::from_millis(self.heavy_check_timeout_ms)
    }

    pub fn pool_timeout(&self) -> Duration {
        Duration::from_millis(self.pool_timeout_ms)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.default_check_timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "orchestrator.default_check_timeout_ms",
                self.default_check_timeout_ms,
                "must be greater than 0",
            ));
        }
        if self.heavy_check_timeout_ms < self.default_check_timeout_ms {
            return Err(ConfigurationError::invalid_value(
                "orchestrator.heavy_check_timeout_ms",
                self.heavy_check_timeout_ms,
                "must not be shorter than default_check_timeout_ms",
            ));
        }
        if self.pool_timeout_ms < self.default_check_timeout_ms {
            return Err(ConfigurationError::invalid_value(
                "orchestrator.pool_timeout_ms",
                self.pool_timeout_ms,
                "must not be shorter than default_check_timeout_ms",
            ));
        }
        Ok(())
    }
}

/// File-level settings for one circuit breaker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    pub failure_threshold: u32,
    pub open_duration_seconds: u64,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        let defaults = CircuitBreakerConfig::default();
        Self {
            failure_threshold: defaults.failure_threshold,
            open_duration_seconds: defaults.open_duration.as_secs(),
        }
    }
}

impl From<&CircuitBreakerSettings> for CircuitBreakerConfig {
    fn from(settings: &CircuitBreakerSettings) -> Self {
        Self {
            failure_threshold: settings.failure_threshold,
            open_duration: Duration::from_secs(settings.open_duration_seconds),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakersConfig {
    pub default: CircuitBreakerSettings,
    /// Per-dependency overrides keyed by breaker name
    pub component_configs: HashMap<String, CircuitBreakerSettings>,
}

impl CircuitBreakersConfig {
    pub fn config_for_component(&self, component: &str) -> CircuitBreakerConfig {
        self.component_configs
            .get(component)
            .unwrap_or(&self.default)
            .into()
    }

    /// Build a manager seeded with these settings
    pub fn build_manager(&self) -> CircuitBreakerManager {
        let overrides: HashMap<String, CircuitBreakerConfig> = self
            .component_configs
            .iter()
            .map(|(name, settings)| (name.clone(), settings.into()))
            .collect();
        CircuitBreakerManager::new((&self.default).into(), overrides)
    }

    fn validate(&self) -> ConfigResult<()> {
        CircuitBreakerConfig::from(&self.default)
            .validate()
            .map_err(|e| ConfigurationError::invalid_value("circuit_breakers.default", "", e))?;

        for (name, settings) in &self.component_configs {
            CircuitBreakerConfig::from(settings).validate().map_err(|e| {
                ConfigurationError::invalid_value(
                    format!("circuit_breakers.component_configs.{name}"),
                    "",
                    e,
                )
            })?;
        }
        Ok(())
    }
}

/// Replicated cache deployment reached through its coordinator layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Logical service name the coordinators track
    pub service_name: String,
    /// Coordinator addresses, `host:port`
    pub coordinators: Vec<String>,
    /// Explicit quorum; never allowed below a strict majority of coordinators
    pub quorum: Option<usize>,
    pub node_timeout_ms: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            service_name: "mymaster".to_string(),
            coordinators: Vec::new(),
            quorum: None,
            node_timeout_ms: timeouts::COORDINATOR_NODE.as_millis() as u64,
        }
    }
}

impl ClusterConfig {
    pub fn node_timeout(&self) -> Duration {
        Duration::from_millis(self.node_timeout_ms)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.service_name.trim().is_empty() {
            return Err(ConfigurationError::validation_error(
                "cluster.service_name must not be empty",
            ));
        }
        if self.node_timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "cluster.node_timeout_ms",
                self.node_timeout_ms,
                "must be greater than 0",
            ));
        }
        if let Some(quorum) = self.quorum {
            if quorum == 0 || quorum > self.coordinators.len() {
                return Err(ConfigurationError::invalid_value(
                    "cluster.quorum",
                    quorum,
                    format!(
                        "must be between 1 and the number of coordinators ({})",
                        self.coordinators.len()
                    ),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub warning_threshold_percent: f64,
    pub critical_threshold_percent: f64,
    pub emergency_threshold_percent: f64,
    pub fragmentation_ratio_limit: f64,
    pub min_hit_ratio_percent: f64,
    pub hit_ratio_min_sample_volume: u64,
    pub cleanup_batch_size: usize,
    pub max_keys_per_class: usize,
    pub optimize_interval_seconds: u64,
    /// Let the memory probe start a cleanup when it reports Critical or worse
    pub auto_optimize: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            warning_threshold_percent: memory::WARNING_THRESHOLD_PERCENT,
            critical_threshold_percent: memory::CRITICAL_THRESHOLD_PERCENT,
            emergency_threshold_percent: memory::EMERGENCY_THRESHOLD_PERCENT,
            fragmentation_ratio_limit: memory::FRAGMENTATION_RATIO_LIMIT,
            min_hit_ratio_percent: memory::MIN_HIT_RATIO_PERCENT,
            hit_ratio_min_sample_volume: memory::HIT_RATIO_MIN_SAMPLE_VOLUME,
            cleanup_batch_size: memory::CLEANUP_BATCH_SIZE,
            max_keys_per_class: memory::MAX_KEYS_PER_CLASS,
            optimize_interval_seconds: memory::OPTIMIZE_INTERVAL_SECONDS,
            auto_optimize: false,
        }
    }
}

impl MemoryConfig {
    pub fn optimize_interval(&self) -> Duration {
        Duration::from_secs(self.optimize_interval_seconds)
    }

    fn validate(&self) -> ConfigResult<()> {
        for (field, value) in [
            ("memory.warning_threshold_percent", self.warning_threshold_percent),
            ("memory.critical_threshold_percent", self.critical_threshold_percent),
            ("memory.emergency_threshold_percent", self.emergency_threshold_percent),
            ("memory.min_hit_ratio_percent", self.min_hit_ratio_percent),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigurationError::invalid_value(
                    field,
                    value,
                    "must be between 0 and 100",
                ));
            }
        }

        if !(self.warning_threshold_percent < self.critical_threshold_percent
            && self.critical_threshold_percent < self.emergency_threshold_percent)
        {
            return Err(ConfigurationError::validation_error(
                "memory thresholds must satisfy warning < critical < emergency",
            ));
        }

        if self.cleanup_batch_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "memory.cleanup_batch_size",
                self.cleanup_batch_size,
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub max_history: usize,
    pub stable_band_percent: f64,
    pub memory_scale_percent: f64,
    pub ops_ceiling: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            max_history: trends::MAX_HISTORY,
            stable_band_percent: trends::STABLE_BAND_PERCENT,
            memory_scale_percent: trends::MEMORY_SCALE_PERCENT,
            ops_ceiling: trends::OPS_CEILING,
        }
    }
}

impl MetricsConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.max_history < trends::MIN_SAMPLES {
            return Err(ConfigurationError::invalid_value(
                "metrics.max_history",
                self.max_history,
                format!("must retain at least {} samples", trends::MIN_SAMPLES),
            ));
        }
        if self.stable_band_percent < 0.0 {
            return Err(ConfigurationError::invalid_value(
                "metrics.stable_band_percent",
                self.stable_band_percent,
                "must not be negative",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub tls_enabled: bool,
    pub tls_cert_path: Option<PathBuf>,
    pub tls_key_path: Option<PathBuf>,
    pub credentials_path: Option<PathBuf>,
    pub require_credentials: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = HealthwatchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.memory.optimize_interval(), Duration::from_secs(900));
        assert!(config.orchestrator.effective_concurrency() >= 1);
    }

    #[test]
    fn test_unordered_memory_thresholds_rejected() {
        let mut config = HealthwatchConfig::default();
        config.memory.critical_threshold_percent = 60.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_quorum_bounds() {
        let mut config = HealthwatchConfig::default();
        config.cluster.coordinators = vec!["a:1".into(), "b:1".into(), "c:1".into()];
        config.cluster.quorum = Some(4);
        assert!(config.validate().is_err());
        config.cluster.quorum = Some(2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_breaker_overrides() {
        let mut config = CircuitBreakersConfig::default();
        config.component_configs.insert(
            "broker".to_string(),
            CircuitBreakerSettings {
                failure_threshold: 3,
                open_duration_seconds: 30,
            },
        );

        assert_eq!(
            config.config_for_component("broker"),
            CircuitBreakerConfig::for_broker()
        );
        assert_eq!(
            config.config_for_component("unknown"),
            CircuitBreakerConfig::default()
        );
        assert_eq!(
            config
                .build_manager()
                .get_circuit_breaker("broker")
                .config()
                .failure_threshold,
            3
        );
    }

    #[test]
    fn test_production_security_aborts_on_missing_cert() {
        let mut config = HealthwatchConfig::default();
        config.security.tls_enabled = true;
        config.security.tls_cert_path = Some(PathBuf::from("/nonexistent/tls.crt"));

        assert!(matches!(
            config.check_security("production"),
            Err(ConfigurationError::MissingSecurityAsset { .. })
        ));

        let capabilities = config.check_security("development").unwrap();
        assert!(!capabilities.tls);
    }

    #[test]
    fn test_missing_credentials_disable_capability_outside_production() {
        let mut config = HealthwatchConfig::default();
        config.security.require_credentials = true;

        let capabilities = config.check_security("test").unwrap();
        assert!(!capabilities.credentials);
        assert!(config.check_security("production").is_err());
    }
}
