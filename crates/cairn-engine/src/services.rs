//! Background loops driven by the engine.

use cairn_core::config::EngineConfig;
use cairn_core::events::EngineEvent;
use cairn_core::metrics::MetricsSnapshot;
use cairn_core::ports::EventStream;
use cairn_loader::ResourceLoader;
use cairn_monitor::{MemoryManager, MetricsCollector, QualityController};
use futures::StreamExt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::{debug, info};

pub(crate) fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Take one sample and run the quality rule against it.
pub(crate) fn sample(
    collector: &Mutex<MetricsCollector>,
    quality: &Mutex<QualityController>,
    loader: &ResourceLoader,
) -> MetricsSnapshot {
    let snapshot = locked(collector).collect(loader.network());
    locked(quality).evaluate(&snapshot);
    snapshot
}

enum Tick {
    Elapsed,
    Reconfigured,
    Stop,
}

/// Fixed-rate ticker whose first tick lands one `period` from now.
fn fixed_rate(period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Wait for the next tick, waking early on a config change or shutdown.
/// The ticker keeps its schedule across early wakeups.
async fn wait_tick(
    ticker: &mut Interval,
    config: &mut watch::Receiver<EngineConfig>,
    shutdown: &mut watch::Receiver<bool>,
) -> Tick {
    tokio::select! {
        _ = ticker.tick() => Tick::Elapsed,
        changed = config.changed() => {
            if changed.is_err() { Tick::Stop } else { Tick::Reconfigured }
        }
        changed = shutdown.changed() => {
            if changed.is_err() || *shutdown.borrow() { Tick::Stop } else { Tick::Reconfigured }
        }
    }
}

/// Rebuild `ticker` only if the configured period differs from `period`.
fn retune(ticker: &mut Interval, period: &mut Duration, configured: Duration, name: &str) {
    if configured != *period {
        debug!(
            service = name,
            from_ms = period.as_millis() as u64,
            to_ms = configured.as_millis() as u64,
            "Interval changed"
        );
        *period = configured;
        *ticker = fixed_rate(configured);
    }
}

/// Samples metrics every `monitoring.sample_interval_ms` and feeds each
/// snapshot to the quality controller.
pub struct SamplingService {
    collector: Arc<Mutex<MetricsCollector>>,
    quality: Arc<Mutex<QualityController>>,
    loader: ResourceLoader,
    config: watch::Receiver<EngineConfig>,
}

impl SamplingService {
    pub fn new(
        collector: Arc<Mutex<MetricsCollector>>,
        quality: Arc<Mutex<QualityController>>,
        loader: ResourceLoader,
        config: watch::Receiver<EngineConfig>,
    ) -> Self {
        Self {
            collector,
            quality,
            loader,
            config,
        }
    }

    /// Run the sampling loop until shutdown.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_ms = self.config.borrow().monitoring.sample_interval_ms,
            "Starting metrics sampling"
        );

        let mut period = self.config.borrow().monitoring.sample_interval();
        let mut ticker = fixed_rate(period);
        loop {
            match wait_tick(&mut ticker, &mut self.config, &mut shutdown).await {
                Tick::Elapsed => self.tick(),
                Tick::Reconfigured => {
                    let configured = self.config.borrow().monitoring.sample_interval();
                    retune(&mut ticker, &mut period, configured, "sampling");
                }
                Tick::Stop => break,
            }
        }

        info!("Metrics sampling stopped");
    }

    fn tick(&self) {
        if !self.config.borrow().monitoring.enabled {
            debug!("Monitoring disabled, skipping sample");
            return;
        }

        sample(&self.collector, &self.quality, &self.loader);
    }
}

/// Sweeps expired cache entries every `memory.gc_interval_seconds`.
pub struct SweepService {
    memory: Arc<MemoryManager>,
    config: watch::Receiver<EngineConfig>,
}

impl SweepService {
    pub fn new(memory: Arc<MemoryManager>, config: watch::Receiver<EngineConfig>) -> Self {
        Self { memory, config }
    }

    /// Run the sweep loop until shutdown.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.config.borrow().memory.gc_interval_seconds,
            "Starting memory sweeps"
        );

        let mut period = self.config.borrow().memory.gc_interval();
        let mut ticker = fixed_rate(period);
        loop {
            match wait_tick(&mut ticker, &mut self.config, &mut shutdown).await {
                Tick::Elapsed => {
                    self.memory.sweep();
                }
                Tick::Reconfigured => {
                    let configured = self.config.borrow().memory.gc_interval();
                    retune(&mut ticker, &mut period, configured, "sweep");
                }
                Tick::Stop => break,
            }
        }

        info!("Memory sweeps stopped");
    }
}

/// Relieves memory pressure whenever a `memory-warning` is published.
pub struct PressureService {
    memory: Arc<MemoryManager>,
    events: EventStream,
}

impl PressureService {
    /// `events` must be subscribed before the first sample is taken.
    pub fn new(memory: Arc<MemoryManager>, events: EventStream) -> Self {
        Self { memory, events }
    }

    /// Run the pressure listener until shutdown or the bus closes.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                event = self.events.next() => match event {
                    Some(EngineEvent::MemoryWarning(warning)) => {
                        self.memory.relieve_pressure(warning.percent);
                    }
                    Some(_) => {}
                    None => break,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        debug!("Pressure listener stopped");
    }
}
