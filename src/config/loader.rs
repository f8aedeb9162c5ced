//! Configuration Loader
//!
//! Environment-aware configuration loading built on the `config` crate. Handles
//! environment detection, layered file discovery, environment variable
//! overrides, validation and the startup security checks.

use super::error::{ConfigResult, ConfigurationError};
use super::{HealthwatchConfig, SecurityCapabilities};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const CONFIG_FILE_STEM: &str = "healthwatch";
const ENV_PREFIX: &str = "HEALTHWATCH";

/// Loaded, validated configuration plus the environment it was loaded for
#[derive(Debug)]
pub struct ConfigManager {
    config: HealthwatchConfig,
    environment: String,
    config_directory: PathBuf,
    security: SecurityCapabilities,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    ///
    /// Useful for testing without modifying global environment variables.
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(|| PathBuf::from("config"));

        debug!(
            environment = %environment,
            config_directory = %config_directory.display(),
            "Loading configuration"
        );

        let config = Self::load_and_merge_config(&config_directory, environment)?;
        Self::build(config, environment, config_directory)
    }

    /// Wrap an already constructed configuration, running the same validation
    /// and security checks as a file load
    pub fn from_config(
        config: HealthwatchConfig,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        Self::build(config, environment, PathBuf::from("config"))
    }

    fn build(
        config: HealthwatchConfig,
        environment: &str,
        config_directory: PathBuf,
    ) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        let security = config.check_security(environment)?;

        let sanitized_config = Self::sanitize_config_for_logging(&config);
        debug!(
            "Configuration loaded successfully: {}",
            serde_json::to_string_pretty(&sanitized_config)
                .unwrap_or_else(|_| "[serialization error]".to_string())
        );

        info!(
            environment = %environment,
            coordinators = config.cluster.coordinators.len(),
            breaker_overrides = config.circuit_breakers.component_configs.len(),
            tls = security.tls,
            "Configuration loaded"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
            security,
        }))
    }

    fn load_and_merge_config(
        config_directory: &Path,
        environment: &str,
    ) -> ConfigResult<HealthwatchConfig> {
        let base = config_directory.join(CONFIG_FILE_STEM);
        let overlay = config_directory.join(format!("{CONFIG_FILE_STEM}.{environment}"));

        let merged = config::Config::builder()
            .add_source(config::File::with_name(&base.to_string_lossy()).required(false))
            .add_source(config::File::with_name(&overlay.to_string_lossy()).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigurationError::load_error(environment, e))?;

        merged
            .try_deserialize::<HealthwatchConfig>()
            .map_err(ConfigurationError::parse_error)
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &HealthwatchConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Security-dependent capabilities that passed the startup checks
    pub fn security_capabilities(&self) -> SecurityCapabilities {
        self.security
    }

    /// Sanitized configuration for debugging and logging
    pub fn debug_config(&self) -> serde_json::Value {
        Self::sanitize_config_for_logging(&self.config)
    }

    /// Detect current environment: `HEALTHWATCH_ENV`, then `APP_ENV`, then development
    pub fn detect_environment() -> String {
        env::var("HEALTHWATCH_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    fn sanitize_config_for_logging(config: &HealthwatchConfig) -> serde_json::Value {
        let mut config_json = serde_json::json!(config);
        let sensitive_patterns = ["password", "secret", "key", "token", "credential", "auth"];
        Self::sanitize_json_recursive(&mut config_json, &sensitive_patterns);
        config_json
    }

    /// Mask string values whose key names look sensitive
    fn sanitize_json_recursive(value: &mut serde_json::Value, sensitive_patterns: &[&str]) {
        match value {
            serde_json::Value::Object(map) => {
                for (key, val) in map.iter_mut() {
                    let key_lower = key.to_lowercase();
                    let is_sensitive = sensitive_patterns
                        .iter()
                        .any(|pattern| key_lower.contains(pattern));

                    if is_sensitive {
                        match val {
                            serde_json::Value::Null | serde_json::Value::Bool(_) => {}
                            serde_json::Value::String(s) if s.is_empty() => {
                                *val = serde_json::Value::String("[EMPTY]".to_string());
                            }
                            serde_json::Value::String(s) => {
                                let masked = if s.len() > 4 && s.is_char_boundary(2) {
                                    let tail = s.len() - 2;
                                    if s.is_char_boundary(tail) {
                                        format!("{}***{}", &s[..2], &s[tail..])
                                    } else {
                                        "***".to_string()
                                    }
                                } else {
                                    "***".to_string()
                                };
                                *val = serde_json::Value::String(format!("[MASKED: {masked}]"));
                            }
                            _ => {
                                *val = serde_json::Value::String("[MASKED]".to_string());
                            }
                        }
                    } else {
                        Self::sanitize_json_recursive(val, sensitive_patterns);
                    }
                }
            }
            serde_json::Value::Array(arr) => {
                for item in arr.iter_mut() {
                    Self::sanitize_json_recursive(item, sensitive_patterns);
                }
            }
            _ => {}
        }
    }
}
