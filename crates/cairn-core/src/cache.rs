//! Cache vocabulary shared between the store and its observers.

use serde::{Deserialize, Serialize};

/// Compression algorithm applied to stored values.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CompressionType {
    None,
    Zstd,
    #[default]
    Gzip,
    Lz4,
}

/// Why entries left the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionReason {
    /// TTL elapsed.
    Expired,
    /// Room was needed for a write or a tighter limit.
    Capacity,
    /// Emergency relief after a memory warning.
    Pressure,
    /// The stored value failed to decode.
    Corrupt,
    /// Removed by an explicit caller request.
    Manual,
}

/// Per-write options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Overrides the configured default TTL.
    pub ttl_seconds: Option<u64>,
    /// Overrides the configured compression switch.
    pub compress: Option<bool>,
}

impl SetOptions {
    pub fn ttl(ttl_seconds: u64) -> Self {
        Self {
            ttl_seconds: Some(ttl_seconds),
            ..Default::default()
        }
    }

    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = Some(compress);
        self
    }
}
