//! Metrics sampling.

use cairn_cache::SharedCache;
use cairn_core::config::EngineConfig;
use cairn_core::events::{EngineEvent, MemoryWarningPayload};
use cairn_core::metrics::{
    CacheMetrics, CpuStats, GraphicsMetrics, MemoryStats, MetricsSnapshot, NetworkMetrics,
};
use cairn_core::ports::{EventBus, SystemProbe};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Produces one [`MetricsSnapshot`] per call to [`collect`](Self::collect).
///
/// Graphics counters are pushed in by the host through
/// [`report_frame`](Self::report_frame) and carried into every later sample.
pub struct MetricsCollector {
    probe: Box<dyn SystemProbe>,
    cache: SharedCache,
    events: Arc<dyn EventBus>,
    config: watch::Receiver<EngineConfig>,
    graphics: GraphicsMetrics,
    sequence: u64,
    latest: Option<MetricsSnapshot>,
}

impl MetricsCollector {
    pub fn new(
        probe: Box<dyn SystemProbe>,
        cache: SharedCache,
        events: Arc<dyn EventBus>,
        config: watch::Receiver<EngineConfig>,
    ) -> Self {
        Self {
            probe,
            cache,
            events,
            config,
            graphics: GraphicsMetrics::default(),
            sequence: 0,
            latest: None,
        }
    }

    /// Record the renderer's latest frame statistics.
    ///
    /// A missing frame time is derived from `fps`.
    pub fn report_frame(&mut self, fps: f64, frame_time_ms: Option<f64>, draw_calls: u32) {
        let fps = if fps.is_finite() { fps.max(0.0) } else { 0.0 };
        let frame_time_ms = frame_time_ms.unwrap_or(if fps > 0.0 { 1000.0 / fps } else { 0.0 });
        self.graphics = GraphicsMetrics {
            fps,
            frame_time_ms,
            draw_calls,
        };
    }

    pub fn graphics(&self) -> GraphicsMetrics {
        self.graphics
    }

    /// Most recent snapshot, if any sample has been taken.
    pub fn latest(&self) -> Option<&MetricsSnapshot> {
        self.latest.as_ref()
    }

    /// Take a sample, publish it and raise a memory warning when usage
    /// exceeds `memory.warning_percent`.
    pub fn collect(&mut self, network: NetworkMetrics) -> MetricsSnapshot {
        let sample = self.probe.sample();
        let cache = CacheMetrics::from(&self.cache.lock().stats());
        let threshold = self.config.borrow().memory.warning_percent;

        self.sequence += 1;
        let snapshot = MetricsSnapshot {
            sequence: self.sequence,
            taken_at: Utc::now(),
            memory: MemoryStats::new(
                sample.memory_used_bytes,
                sample.memory_total_bytes,
                sample.process_resident_bytes,
                sample.process_virtual_bytes,
            ),
            cpu: CpuStats {
                usage_percent: sample.cpu_percent,
                cores: sample.cpu_cores,
            },
            cache,
            network,
            graphics: self.graphics,
        };

        debug!(
            sequence = snapshot.sequence,
            memory_percent = snapshot.memory.percent,
            fps = snapshot.graphics.fps,
            hit_rate = snapshot.cache.hit_rate,
            "Metrics sampled"
        );

        self.events.publish(EngineEvent::Metrics(snapshot.clone()));

        if snapshot.memory.percent > threshold {
            warn!(
                percent = snapshot.memory.percent,
                threshold, "Memory usage above warning threshold"
            );
            self.events.publish(EngineEvent::MemoryWarning(MemoryWarningPayload {
                percent: snapshot.memory.percent,
                threshold,
            }));
        }

        self.latest = Some(snapshot.clone());
        snapshot
    }
}
