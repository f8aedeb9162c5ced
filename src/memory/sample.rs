//! Point-in-time memory counters of the cache.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemorySample {
    pub used_bytes: u64,
    pub peak_used_bytes: u64,
    /// Configured memory ceiling; 0 means unbounded
    pub max_bytes: u64,
    pub fragmentation_ratio: f64,
    pub evicted_keys: u64,
    pub expired_keys: u64,
    pub hits: u64,
    pub misses: u64,
    /// Physical memory of the host, used as the denominator when `max_bytes` is 0
    pub host_memory_bytes: Option<u64>,
}

impl MemorySample {
    pub fn lookups(&self) -> u64 {
        self.hits.saturating_add(self.misses)
    }

    /// Percentage of lookups that hit; 100 when nothing was looked up yet
    pub fn hit_ratio_percent(&self) -> f64 {
        let lookups = self.lookups();
        if lookups == 0 {
            100.0
        } else {
            self.hits as f64 * 100.0 / lookups as f64
        }
    }

    /// Denominator for usage percentages
    pub fn capacity_bytes(&self) -> Option<u64> {
        if self.max_bytes > 0 {
            Some(self.max_bytes)
        } else {
            self.host_memory_bytes.filter(|bytes| *bytes > 0)
        }
    }

    /// Used memory as a percentage of `max_bytes`, falling back to host memory
    pub fn usage_percent(&self) -> Option<f64> {
        self.capacity_bytes()
            .map(|capacity| self.used_bytes as f64 * 100.0 / capacity as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_prefers_configured_ceiling() {
        let sample = MemorySample {
            used_bytes: 950,
            max_bytes: 1000,
            host_memory_bytes: Some(10_000),
            ..Default::default()
        };
        assert_eq!(sample.usage_percent(), Some(95.0));
    }

    #[test]
    fn test_unbounded_falls_back_to_host_memory() {
        let sample = MemorySample {
            used_bytes: 500,
            max_bytes: 0,
            host_memory_bytes: Some(2000),
            ..Default::default()
        };
        assert_eq!(sample.usage_percent(), Some(25.0));

        let unknown = MemorySample {
            used_bytes: 500,
            ..Default::default()
        };
        assert_eq!(unknown.usage_percent(), None);
    }

    #[test]
    fn test_hit_ratio() {
        let sample = MemorySample {
            hits: 750,
            misses: 250,
            ..Default::default()
        };
        assert_eq!(sample.hit_ratio_percent(), 75.0);
        assert_eq!(MemorySample::default().hit_ratio_percent(), 100.0);
    }
}
