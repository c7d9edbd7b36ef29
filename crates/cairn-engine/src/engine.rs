//! The engine facade.

use crate::services::{PressureService, SamplingService, SweepService, locked, sample};
use cairn_cache::{CacheStats, CacheStore, SetOutcome, SharedCache};
use cairn_core::cache::SetOptions;
use cairn_core::config::EngineConfig;
use cairn_core::events::{ConfigUpdatedPayload, EngineEvent};
use cairn_core::metrics::MetricsSnapshot;
use cairn_core::ports::{EventBus, EventStream, GcHint, ResourceFetcher, SystemProbe};
use cairn_core::quality::QualityTier;
use cairn_core::resource::ResourceDescriptor;
use cairn_core::{Error, InMemoryBus, Result};
use cairn_loader::{HttpFetcher, ResourceLoader};
use cairn_monitor::{
    MemoryManager, MetricsCollector, QualityController, ReclaimReport, SysinfoProbe,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Assembles an [`Engine`] from a configuration and optional host
/// capabilities. Anything not supplied falls back to the built-in
/// implementation.
pub struct EngineBuilder {
    config: EngineConfig,
    events: Option<Arc<dyn EventBus>>,
    fetcher: Option<Arc<dyn ResourceFetcher>>,
    probe: Option<Box<dyn SystemProbe>>,
    gc_hint: Option<Arc<dyn GcHint>>,
}

impl EngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            events: None,
            fetcher: None,
            probe: None,
            gc_hint: None,
        }
    }

    pub fn with_event_bus(mut self, events: Arc<dyn EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn ResourceFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn with_probe(mut self, probe: Box<dyn SystemProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn with_gc_hint(mut self, gc_hint: Arc<dyn GcHint>) -> Self {
        self.gc_hint = Some(gc_hint);
        self
    }

    /// Validate the configuration and wire the components. Background
    /// loops are not running until [`Engine::start`] is called.
    pub fn build(self) -> Result<Engine> {
        self.config.validate()?;

        let events = self
            .events
            .unwrap_or_else(|| Arc::new(InMemoryBus::new()));
        let fetcher = self
            .fetcher
            .unwrap_or_else(|| Arc::new(HttpFetcher::new()));
        let probe = self
            .probe
            .unwrap_or_else(|| Box::new(SysinfoProbe::new()));

        let (config_tx, config_rx) = watch::channel(self.config);
        let cache = SharedCache::new(CacheStore::new(
            config_rx.borrow().cache.clone(),
            events.clone(),
        ));
        let loader = ResourceLoader::new(
            cache.clone(),
            fetcher,
            events.clone(),
            config_tx.subscribe(),
        );
        let collector = MetricsCollector::new(
            probe,
            cache.clone(),
            events.clone(),
            config_tx.subscribe(),
        );
        let quality = QualityController::new(events.clone(), config_tx.subscribe());
        let memory = MemoryManager::new(cache.clone(), events.clone(), self.gc_hint);
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Engine {
            config_tx,
            config_rx,
            events,
            cache,
            loader,
            collector: Arc::new(Mutex::new(collector)),
            quality: Arc::new(Mutex::new(quality)),
            memory: Arc::new(memory),
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
            shut_down: AtomicBool::new(false),
        })
    }
}

/// Single entry point for collaborators.
///
/// Normal-operation conditions (misses, rejected writes, failed loads) are
/// reported through return values and events, never as errors.
pub struct Engine {
    config_tx: watch::Sender<EngineConfig>,
    config_rx: watch::Receiver<EngineConfig>,
    events: Arc<dyn EventBus>,
    cache: SharedCache,
    loader: ResourceLoader,
    collector: Arc<Mutex<MetricsCollector>>,
    quality: Arc<Mutex<QualityController>>,
    memory: Arc<MemoryManager>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shut_down: AtomicBool,
}

impl Engine {
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    /// Build an engine with the built-in fetcher, probe and event bus.
    pub fn new(config: EngineConfig) -> Result<Self> {
        EngineBuilder::new(config).build()
    }

    /// Spawn the sampling, sweep and pressure loops. Calling it again is a
    /// no-op. Must be called from within a Tokio runtime.
    pub fn start(&self) -> Result<()> {
        if self.is_shut_down() {
            return Err(Error::ShutDown);
        }

        let mut tasks = locked(&self.tasks);
        if !tasks.is_empty() {
            return Ok(());
        }

        let sampling = SamplingService::new(
            self.collector.clone(),
            self.quality.clone(),
            self.loader.clone(),
            self.config_tx.subscribe(),
        );
        let sweep = SweepService::new(self.memory.clone(), self.config_tx.subscribe());
        let pressure = PressureService::new(self.memory.clone(), self.events.subscribe());

        tasks.push(tokio::spawn(sampling.run(self.shutdown_tx.subscribe())));
        tasks.push(tokio::spawn(sweep.run(self.shutdown_tx.subscribe())));
        tasks.push(tokio::spawn(pressure.run(self.shutdown_tx.subscribe())));

        info!("Engine started");
        Ok(())
    }

    // === Cache ===

    /// Store a value. A write that cannot fit is reported as
    /// [`SetOutcome::Rejected`]; only unserializable values are errors.
    pub fn cache_set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        options: SetOptions,
    ) -> Result<SetOutcome> {
        if self.is_shut_down() {
            return Err(Error::ShutDown);
        }
        self.cache.lock().set(key, value, options)
    }

    pub fn cache_get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.cache.lock().get(key)
    }

    /// Remove every entry, returning how many were removed.
    pub fn cache_clear(&self) -> usize {
        self.cache.lock().clear()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.lock().stats()
    }

    // === Resources ===

    /// Queue a resource load. Completion is reported through
    /// `resource-loaded` or `resource-error`.
    pub fn enqueue_resource(&self, descriptor: ResourceDescriptor) {
        if self.is_shut_down() {
            warn!(id = %descriptor.id, "Engine shut down, ignoring resource");
            return;
        }
        self.loader.enqueue(descriptor);
    }

    pub fn pending_loads(&self) -> usize {
        self.loader.pending()
    }

    pub fn in_flight_loads(&self) -> usize {
        self.loader.in_flight()
    }

    // === Monitoring ===

    /// Latest snapshot, sampling now if none has been taken yet.
    pub fn get_metrics(&self) -> MetricsSnapshot {
        let latest = locked(&self.collector).latest().cloned();
        match latest {
            Some(snapshot) => snapshot,
            None => self.sample_metrics(),
        }
    }

    /// Take a fresh sample immediately and feed it to the quality rule.
    pub fn sample_metrics(&self) -> MetricsSnapshot {
        sample(&self.collector, &self.quality, &self.loader)
    }

    /// Push the renderer's frame statistics into the next samples.
    pub fn report_frame(&self, fps: f64, frame_time_ms: Option<f64>, draw_calls: u32) {
        locked(&self.collector).report_frame(fps, frame_time_ms, draw_calls);
    }

    /// Host-signalled memory pressure.
    pub fn relieve_memory_pressure(&self) -> ReclaimReport {
        let percent = self.get_metrics().memory.percent;
        self.memory.relieve_pressure(percent)
    }

    /// Run a sweep now instead of waiting for the next interval.
    pub fn sweep_memory(&self) -> ReclaimReport {
        self.memory.sweep()
    }

    // === Quality ===

    pub fn quality_tier(&self) -> QualityTier {
        locked(&self.quality).tier()
    }

    /// Manual override of the adaptive tier.
    pub fn set_quality_tier(&self, tier: QualityTier) {
        locked(&self.quality).set_tier(tier);
    }

    // === Configuration ===

    pub fn get_configuration(&self) -> EngineConfig {
        self.config_rx.borrow().clone()
    }

    /// Deep-merge `partial` into the current configuration. An invalid
    /// result is rejected and the current configuration stays in effect.
    pub fn update_configuration(&self, partial: &serde_json::Value) -> Result<EngineConfig> {
        let updated = match self.get_configuration().merged(partial) {
            Ok(updated) => updated,
            Err(e) => {
                warn!(error = %e, "Rejected configuration update");
                return Err(e);
            }
        };

        self.cache.lock().reconfigure(updated.cache.clone());
        self.config_tx.send_replace(updated.clone());

        info!("Configuration updated");
        self.events.publish(EngineEvent::ConfigUpdated(ConfigUpdatedPayload {
            config: updated.clone(),
        }));
        Ok(updated)
    }

    // === Events ===

    pub fn subscribe(&self) -> EventStream {
        self.events.subscribe()
    }

    // === Lifecycle ===

    /// Stop every loop, drop the load backlog and clear the cache.
    ///
    /// Safe to call more than once. Loads already in flight are not
    /// awaited and their results are discarded.
    pub fn shutdown(&self) {
        if !self.shut_down.swap(true, Ordering::SeqCst) {
            info!("Shutting down engine");
            self.shutdown_tx.send_replace(true);
            for task in locked(&self.tasks).drain(..) {
                task.abort();
            }
            self.loader.close();
        }

        let cleared = self.cache.lock().clear();
        info!(cleared, "Engine shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown_tx.send_replace(true);
    }
}
