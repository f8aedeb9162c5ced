//! Administrative boundary to the cache for memory management.

use async_trait::async_trait;

use super::sample::MemorySample;
use crate::probe::ProbeError;

/// Memory and keyspace operations the pressure manager needs
///
/// Transport failures map to
/// [`ErrorKind::ConnectionFailure`](crate::probe::ErrorKind::ConnectionFailure).
#[async_trait]
pub trait CacheAdminClient: Send + Sync {
    /// Memory, eviction and keyspace-hit counters. `host_memory_bytes` may be
    /// left empty; the manager fills it through [`Self::host_memory_bytes`].
    async fn memory_stats(&self) -> Result<MemorySample, ProbeError>;

    /// Physical memory of the cache host, when known
    async fn host_memory_bytes(&self) -> Result<Option<u64>, ProbeError>;

    /// Up to `limit` keys matching a glob pattern
    async fn scan(&self, pattern: &str, limit: usize) -> Result<Vec<String>, ProbeError>;

    /// Approximate bytes held by a key; `None` if the key is gone
    async fn memory_usage(&self, key: &str) -> Result<Option<u64>, ProbeError>;

    /// Seconds since the key was last touched; `None` if unknown
    async fn idle_seconds(&self, key: &str) -> Result<Option<u64>, ProbeError>;

    /// Delete keys, returning how many were actually removed
    async fn delete(&self, keys: &[String]) -> Result<u64, ProbeError>;
}
