//! # Check Orchestration
//!
//! Registration, execution and aggregation of health checks.
//!
//! ## Components
//!
//! - [`CheckRegistry`]: owns registered checks and their last outcomes
//! - [`Orchestrator`]: runs checks on a bounded worker pool
//! - [`AggregatedReport`]: one verdict plus per-check results and a summary
//! - [`ResultSink`]: persistence hook fed after every run

pub mod orchestrator;
pub mod registry;
pub mod report;
pub mod sink;

pub use orchestrator::Orchestrator;
pub use registry::{CheckRegistry, RegisteredCheck};
pub use report::{aggregate_status, AggregatedReport, OverallStatus, Summary};
pub use sink::{LoggingSink, ResultSink};
