//! # Built-in Probes
//!
//! Ready-made adapters for common dependencies. Each one maps its driver's
//! failures onto [`ErrorKind`](crate::probe::ErrorKind) so circuit breakers and
//! reports treat them uniformly.

pub mod cache;
pub mod http;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod workers;

pub use cache::{CacheClient, CacheRoundTripProbe};
pub use http::HttpProbe;
#[cfg(feature = "postgres")]
pub use postgres::PostgresProbe;
pub use workers::{HeartbeatBoard, HeartbeatSource, WorkerHeartbeat, WorkerHeartbeatProbe};
