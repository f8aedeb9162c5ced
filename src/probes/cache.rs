//! Distributed cache write/read/delete round-trip.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;
use uuid::Uuid;

use crate::probe::{CheckResult, Probe, ProbeError, ProbeResult};

/// Minimal key/value operations needed for a round-trip check
#[async_trait]
pub trait CacheClient: Send + Sync {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), ProbeError>;

    async fn get(&self, key: &str) -> Result<Option<String>, ProbeError>;

    async fn delete(&self, key: &str) -> Result<(), ProbeError>;
}

pub struct CacheRoundTripProbe {
    client: Arc<dyn CacheClient>,
    key_prefix: String,
    sentinel_ttl: Duration,
    slow_threshold: Duration,
}

impl std::fmt::Debug for CacheRoundTripProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheRoundTripProbe")
            .field("key_prefix", &self.key_prefix)
            .field("slow_threshold", &self.slow_threshold)
            .finish()
    }
}

impl CacheRoundTripProbe {
    pub fn new(client: Arc<dyn CacheClient>) -> Self {
        Self {
            client,
            key_prefix: "healthwatch:probe".to_string(),
            sentinel_ttl: Duration::from_secs(30),
            slow_threshold: Duration::from_millis(250),
        }
    }

    pub fn with_key_prefix(mut self, key_prefix: impl Into<String>) -> Self {
        self.key_prefix = key_prefix.into();
        self
    }

    pub fn with_slow_threshold(mut self, slow_threshold: Duration) -> Self {
        self.slow_threshold = slow_threshold;
        self
    }
}

#[async_trait]
impl Probe for CacheRoundTripProbe {
    async fn check(&self) -> ProbeResult {
        let start = Instant::now();
        let token = Uuid::new_v4().to_string();
        let key = format!("{}:{}", self.key_prefix, token);

        self.client.set(&key, &token, self.sentinel_ttl).await?;
        let read_back = self.client.get(&key).await?;

        // The sentinel expires on its own; a failed delete is not a health problem
        if let Err(e) = self.client.delete(&key).await {
            warn!(key = %key, error = %e, "Failed to delete cache probe sentinel");
        }
        let elapsed = start.elapsed();

        let result = match read_back {
            Some(value) if value == token => {
                if elapsed > self.slow_threshold {
                    CheckResult::degraded(format!(
                        "cache round-trip slow ({} ms)",
                        elapsed.as_millis()
                    ))
                } else {
                    CheckResult::healthy("cache round-trip succeeded")
                }
            }
            Some(_) => CheckResult::error("cache returned a different value than written"),
            None => CheckResult::error("cache lost the sentinel key immediately after write"),
        };

        Ok(result.with_detail("round_trip_ms", elapsed.as_millis() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{CheckStatus, ErrorKind};
    use dashmap::DashMap;

    #[derive(Default)]
    struct InMemoryCache {
        entries: DashMap<String, String>,
        drop_writes: bool,
    }

    #[async_trait]
    impl CacheClient for InMemoryCache {
        async fn set(&self, key: &str, value: &str, _ttl: Duration) -> Result<(), ProbeError> {
            if !self.drop_writes {
                self.entries.insert(key.to_string(), value.to_string());
            }
            Ok(())
        }

        async fn get(&self, key: &str) -> Result<Option<String>, ProbeError> {
            Ok(self.entries.get(key).map(|v| v.value().clone()))
        }

        async fn delete(&self, key: &str) -> Result<(), ProbeError> {
            self.entries.remove(key);
            Ok(())
        }
    }

    struct DownCache;

    #[async_trait]
    impl CacheClient for DownCache {
        async fn set(&self, _: &str, _: &str, _: Duration) -> Result<(), ProbeError> {
            Err(ProbeError::connection("connection refused"))
        }

        async fn get(&self, _: &str) -> Result<Option<String>, ProbeError> {
            Err(ProbeError::connection("connection refused"))
        }

        async fn delete(&self, _: &str) -> Result<(), ProbeError> {
            Err(ProbeError::connection("connection refused"))
        }
    }

    #[tokio::test]
    async fn test_round_trip_cleans_up() {
        let cache = Arc::new(InMemoryCache::default());
        let probe = CacheRoundTripProbe::new(cache.clone());

        let result = probe.check().await.unwrap();
        assert_eq!(result.status, CheckStatus::Healthy);
        assert!(cache.entries.is_empty());
    }

    #[tokio::test]
    async fn test_lost_write_is_error() {
        let probe = CacheRoundTripProbe::new(Arc::new(InMemoryCache {
            drop_writes: true,
            ..Default::default()
        }));
        let result = probe.check().await.unwrap();
        assert_eq!(result.status, CheckStatus::Error);
    }

    #[tokio::test]
    async fn test_unreachable_cache_is_connection_failure() {
        let probe = CacheRoundTripProbe::new(Arc::new(DownCache));
        let err = probe.check().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::ConnectionFailure);
    }
}
