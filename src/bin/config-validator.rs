//! # Healthwatch Configuration Validator
//!
//! Command-line tool for validating Healthwatch configuration files for a given
//! environment before a service starts with them.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use healthwatch_core::admin::{AdminSurface, ConfigValidationReport};
use healthwatch_core::config::ConfigManager;
use std::path::PathBuf;
use std::process;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "config-validator")]
#[command(about = "Validate Healthwatch configuration files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Environment to validate (development, test, production)
    #[arg(short, long, default_value = "development")]
    environment: String,

    /// Configuration directory path (default: config)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format (table, json)
    #[arg(long, default_value = "table")]
    format: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load and validate the configuration
    Validate,

    /// Print the merged configuration with secrets masked
    Show,
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    // A global subscriber may already be set when embedded in a test harness
    let _ = tracing::subscriber::set_global_default(subscriber);

    let outcome = match cli.command.as_ref().unwrap_or(&Commands::Validate) {
        Commands::Validate => validate(&cli),
        Commands::Show => show(&cli),
    };

    match outcome {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("❌ {e:#}");
            process::exit(2);
        }
    }
}

fn load(cli: &Cli) -> Result<std::sync::Arc<ConfigManager>> {
    ConfigManager::load_from_directory_with_env(cli.config_dir.clone(), &cli.environment)
        .with_context(|| format!("failed to load configuration for '{}'", cli.environment))
}

fn validate(cli: &Cli) -> Result<bool> {
    let manager = load(cli)?;
    let report = AdminSurface::new(manager.clone()).validate_configuration();

    if cli.format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(report.valid);
    }

    println!("🔧 Validating Healthwatch Configuration");
    println!("Environment: {}", report.environment);
    println!("Config Directory: {}", manager.config_directory().display());
    println!();
    print_summary(&manager);
    print_report(&report);

    Ok(report.valid)
}

fn show(cli: &Cli) -> Result<bool> {
    let manager = load(cli)?;
    println!("{}", serde_json::to_string_pretty(&manager.debug_config())?);
    Ok(true)
}

fn print_summary(manager: &ConfigManager) {
    let config = manager.config();
    println!("Orchestrator:");
    println!(
        "  • concurrency: {} (configured {})",
        config.orchestrator.effective_concurrency(),
        config.orchestrator.max_concurrency
    );
    println!(
        "  • timeouts: light {} ms, heavy {} ms, pool {} ms",
        config.orchestrator.default_check_timeout_ms,
        config.orchestrator.heavy_check_timeout_ms,
        config.orchestrator.pool_timeout_ms
    );
    println!("Circuit breakers:");
    println!(
        "  • default: {} failures, {} s open",
        config.circuit_breakers.default.failure_threshold,
        config.circuit_breakers.default.open_duration_seconds
    );
    for (component, settings) in &config.circuit_breakers.component_configs {
        println!(
            "  • {component}: {} failures, {} s open",
            settings.failure_threshold, settings.open_duration_seconds
        );
    }
    println!("Cluster:");
    println!(
        "  • service '{}' with {} coordinator(s)",
        config.cluster.service_name,
        config.cluster.coordinators.len()
    );
    println!("Memory:");
    println!(
        "  • thresholds {}/{}/{} %, auto-optimize {}",
        config.memory.warning_threshold_percent,
        config.memory.critical_threshold_percent,
        config.memory.emergency_threshold_percent,
        config.memory.auto_optimize
    );
    println!();
}

fn print_report(report: &ConfigValidationReport) {
    if let Some(security) = report.security {
        println!(
            "🔐 Security: tls {}, credentials {}",
            enabled(security.tls),
            enabled(security.credentials)
        );
    }
    for warning in &report.warnings {
        println!("⚠️  {warning}");
    }
    for error in &report.errors {
        println!("❌ {error}");
    }

    if report.valid {
        println!("\n🎉 All configuration validation checks passed!");
    } else {
        println!("\n❌ Configuration validation failed with {} error(s)", report.errors.len());
    }
}

fn enabled(flag: bool) -> &'static str {
    if flag {
        "enabled"
    } else {
        "disabled"
    }
}
