//! # Structured Logging Module
//!
//! Environment-aware structured logging. Development and test environments get
//! human-readable console output; production emits JSON lines for log shippers.

use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::ConfigManager;
use crate::probe::CheckStatus;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
///
/// `RUST_LOG` overrides the per-environment default level. Safe to call more
/// than once; only the first call installs a subscriber.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));

        let layer = if environment == "production" {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed()
        };

        // Another component may already own the global subscriber
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            "Structured logging initialized"
        );
    });
}

/// Current environment, detected the same way configuration loading does
pub fn get_environment() -> String {
    ConfigManager::detect_environment()
}

fn get_log_level(environment: &str) -> String {
    match environment {
        "test" => "debug".to_string(),
        "development" => "debug".to_string(),
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log structured data for a single check execution
pub fn log_check_operation(
    check_name: &str,
    critical: bool,
    status: CheckStatus,
    duration_ms: f64,
    details: Option<&str>,
) {
    match status {
        CheckStatus::Healthy => tracing::debug!(
            check = %check_name,
            critical = critical,
            status = %status,
            duration_ms = duration_ms,
            details = details,
            timestamp = %Utc::now().to_rfc3339(),
            "CHECK_OPERATION"
        ),
        CheckStatus::Degraded => tracing::info!(
            check = %check_name,
            critical = critical,
            status = %status,
            duration_ms = duration_ms,
            details = details,
            timestamp = %Utc::now().to_rfc3339(),
            "CHECK_OPERATION"
        ),
        CheckStatus::Error => tracing::warn!(
            check = %check_name,
            critical = critical,
            status = %status,
            duration_ms = duration_ms,
            details = details,
            timestamp = %Utc::now().to_rfc3339(),
            "CHECK_OPERATION"
        ),
    }
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "ERROR"
    );
}
