//! Point-in-time metrics records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable sample produced once per collector tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Monotonically increasing sample number.
    pub sequence: u64,
    pub taken_at: DateTime<Utc>,
    pub memory: MemoryStats,
    pub cpu: CpuStats,
    pub cache: CacheMetrics,
    pub network: NetworkMetrics,
    pub graphics: GraphicsMetrics,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub used_bytes: u64,
    pub total_bytes: u64,
    pub percent: f64,
    /// Resident size of this process.
    pub heap_used_bytes: u64,
    /// Virtual size of this process.
    pub heap_total_bytes: u64,
}

impl MemoryStats {
    pub fn new(
        used_bytes: u64,
        total_bytes: u64,
        heap_used_bytes: u64,
        heap_total_bytes: u64,
    ) -> Self {
        let percent = if total_bytes == 0 {
            0.0
        } else {
            used_bytes as f64 / total_bytes as f64 * 100.0
        };
        Self {
            used_bytes,
            total_bytes,
            percent,
            heap_used_bytes,
            heap_total_bytes,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuStats {
    pub usage_percent: f64,
    pub cores: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub entries: usize,
    pub bytes: u64,
}

impl CacheMetrics {
    /// `hits / (hits + misses)`, or 0 when nothing has been observed yet.
    pub fn hit_rate(hits: u64, misses: u64) -> f64 {
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkMetrics {
    /// Mean observed latency of completed fetches.
    pub latency_ms: f64,
    /// Bytes per second across completed fetches.
    pub bandwidth_bps: f64,
    pub errors: u64,
    pub requests: u64,
}

/// Frame statistics as last reported by the host renderer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GraphicsMetrics {
    pub fps: f64,
    pub frame_time_ms: f64,
    pub draw_calls: u32,
}

impl Default for GraphicsMetrics {
    fn default() -> Self {
        // Nominal frame rate until the renderer reports.
        Self {
            fps: 60.0,
            frame_time_ms: 1000.0 / 60.0,
            draw_calls: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate_arithmetic() {
        assert_eq!(CacheMetrics::hit_rate(0, 0), 0.0);
        assert_eq!(CacheMetrics::hit_rate(3, 1), 0.75);
        assert_eq!(CacheMetrics::hit_rate(0, 5), 0.0);
    }

    #[test]
    fn test_memory_percent() {
        let stats = MemoryStats::new(512, 2048, 10, 20);
        assert_eq!(stats.percent, 25.0);
        assert_eq!(MemoryStats::new(1, 0, 0, 0).percent, 0.0);
    }
}
