//! Accumulated network counters.

use cairn_core::metrics::NetworkMetrics;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::time::Instant;

/// Counters for resource fetches.
#[derive(Debug, Default)]
pub struct NetworkStats {
    /// Fetch attempts issued, retries included.
    pub requests: AtomicU64,
    /// Loads that ended in failure.
    pub errors: AtomicU64,
    /// Loads that completed over the network.
    pub completed: AtomicU64,
    /// Body bytes received by completed loads.
    pub bytes_received: AtomicU64,
    /// Wall time spent on completed loads.
    pub latency_ms_total: AtomicU64,
}

impl NetworkStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Record a fetch attempt.
    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed load.
    pub fn record_success(&self, bytes: u64, latency_ms: u64) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
        self.latency_ms_total.fetch_add(latency_ms, Ordering::Relaxed);
    }

    /// Record a failed load.
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of current counters.
    pub fn snapshot(&self) -> NetworkMetrics {
        let completed = self.completed.load(Ordering::Relaxed);
        let latency_total = self.latency_ms_total.load(Ordering::Relaxed);
        let bytes = self.bytes_received.load(Ordering::Relaxed);

        let latency_ms = if completed == 0 {
            0.0
        } else {
            latency_total as f64 / completed as f64
        };
        let bandwidth_bps = if latency_total == 0 {
            0.0
        } else {
            bytes as f64 / (latency_total as f64 / 1000.0)
        };

        NetworkMetrics {
            latency_ms,
            bandwidth_bps,
            errors: self.errors.load(Ordering::Relaxed),
            requests: self.requests.load(Ordering::Relaxed),
        }
    }
}

/// Timer for measuring fetch latency.
pub struct LatencyTimer {
    start: Instant,
}

impl LatencyTimer {
    /// Start a new latency timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration in milliseconds.
    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot() {
        let stats = NetworkStats::new();
        assert_eq!(stats.snapshot(), NetworkMetrics::default());
    }

    #[test]
    fn test_latency_and_bandwidth() {
        let stats = NetworkStats::new();
        stats.record_request();
        stats.record_success(4_000, 100);
        stats.record_request();
        stats.record_success(6_000, 300);
        stats.record_request();
        stats.record_error();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.requests, 3);
        assert_eq!(snapshot.errors, 1);
        assert_eq!(snapshot.latency_ms, 200.0);
        assert_eq!(snapshot.bandwidth_bps, 25_000.0);
    }
}
