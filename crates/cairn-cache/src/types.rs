//! Cache entry and statistics types.

use cairn_core::cache::CompressionType;
use cairn_core::metrics::CacheMetrics;
use std::time::Duration;
use tokio::time::Instant;

/// A cached value in its stored representation.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    /// Serialized value, compressed when `compression` is not `None`.
    pub value: Vec<u8>,
    /// Byte length of `value`, used for accounting.
    pub size: u64,
    /// Time of the last write.
    pub created_at: Instant,
    pub ttl: Duration,
    pub compression: CompressionType,
    /// Successful reads since the last write.
    pub hit_count: u64,
    /// Write order, used to break hit-count ties.
    pub(crate) sequence: u64,
}

impl CacheEntry {
    pub fn is_compressed(&self) -> bool {
        self.compression != CompressionType::None
    }

    /// An entry is stale once its age strictly exceeds its TTL.
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) > self.ttl
    }
}

/// Result of a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    Stored { size: u64, compressed: bool },
    /// The stored form exceeded the per-entry or total limit.
    Rejected { size: u64, limit: u64 },
}

impl SetOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, SetOutcome::Stored { .. })
    }
}

/// Aggregate cache counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub total_bytes: u64,
    pub max_total_bytes: u64,
    pub evictions: u64,
    pub rejections: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        CacheMetrics::hit_rate(self.hits, self.misses)
    }
}

impl From<&CacheStats> for CacheMetrics {
    fn from(stats: &CacheStats) -> Self {
        CacheMetrics {
            hits: stats.hits,
            misses: stats.misses,
            hit_rate: stats.hit_rate(),
            entries: stats.entries,
            bytes: stats.total_bytes,
        }
    }
}
