//! Relational store connectivity via `SELECT 1` against a pool.

use async_trait::async_trait;
use sqlx::PgPool;
use std::time::{Duration, Instant};

use crate::probe::{CheckResult, Probe, ProbeError, ProbeResult};

#[derive(Debug, Clone)]
pub struct PostgresProbe {
    pool: PgPool,
    slow_threshold: Duration,
}

impl PostgresProbe {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            slow_threshold: Duration::from_millis(500),
        }
    }

    /// Round-trips slower than this report Degraded
    pub fn with_slow_threshold(mut self, slow_threshold: Duration) -> Self {
        self.slow_threshold = slow_threshold;
        self
    }
}

/// Classify driver errors into the probe taxonomy
pub(crate) fn classify_sqlx_error(error: &sqlx::Error) -> ProbeError {
    match error {
        sqlx::Error::PoolTimedOut => ProbeError::timeout("timed out acquiring a pooled connection"),
        sqlx::Error::Io(e) => ProbeError::connection(format!("database I/O error: {e}")),
        sqlx::Error::Tls(e) => ProbeError::connection(format!("database TLS error: {e}")),
        sqlx::Error::PoolClosed => ProbeError::connection("connection pool is closed"),
        sqlx::Error::Configuration(e) => {
            ProbeError::validation(format!("invalid database configuration: {e}"))
        }
        sqlx::Error::Database(db) => match db.code().as_deref() {
            // invalid_authorization_specification, invalid_password
            Some("28000") | Some("28P01") => {
                ProbeError::validation(format!("database rejected credentials: {db}"))
            }
            _ => ProbeError::connection(format!("database error: {db}")),
        },
        other => ProbeError::internal(format!("unexpected database error: {other}")),
    }
}

#[async_trait]
impl Probe for PostgresProbe {
    async fn check(&self) -> ProbeResult {
        let start = Instant::now();
        sqlx::query("SELECT 1 as health")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| classify_sqlx_error(&e))?;
        let elapsed = start.elapsed();

        let result = if elapsed > self.slow_threshold {
            CheckResult::degraded(format!(
                "database responded slowly ({} ms)",
                elapsed.as_millis()
            ))
        } else {
            CheckResult::healthy("database reachable")
        };

        Ok(result
            .with_detail("response_time_ms", elapsed.as_millis() as u64)
            .with_detail("pool_size", self.pool.size())
            .with_detail("idle_connections", self.pool.num_idle() as u64))
    }
}
