//! Memory reclamation.

use cairn_cache::SharedCache;
use cairn_core::cache::EvictionReason;
use cairn_core::events::{EngineEvent, GcCompletedPayload};
use cairn_core::ports::{EventBus, GcHint};
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of one reclamation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReclaimReport {
    pub removed_entries: usize,
    pub freed_bytes: u64,
    pub host_gc: bool,
}

/// Reclaims cache memory on a schedule and under pressure.
///
/// Two policies coexist. The periodic sweep only drops expired entries.
/// Pressure relief drops the lowest-hit half of the store regardless of TTL.
pub struct MemoryManager {
    cache: SharedCache,
    events: Arc<dyn EventBus>,
    gc_hint: Option<Arc<dyn GcHint>>,
}

impl MemoryManager {
    pub fn new(
        cache: SharedCache,
        events: Arc<dyn EventBus>,
        gc_hint: Option<Arc<dyn GcHint>>,
    ) -> Self {
        Self {
            cache,
            events,
            gc_hint,
        }
    }

    /// Remove every expired entry, then ask the host to collect.
    pub fn sweep(&self) -> ReclaimReport {
        let (removed_entries, freed_bytes) = self.cache.lock().purge_expired();
        let report = self.finish(EvictionReason::Expired, removed_entries, freed_bytes);

        info!(
            removed = report.removed_entries,
            freed_bytes = report.freed_bytes,
            host_gc = report.host_gc,
            "Memory sweep completed"
        );
        report
    }

    /// Emergency eviction of the lowest-hit half of the cache.
    pub fn relieve_pressure(&self, percent: f64) -> ReclaimReport {
        let (removed_entries, freed_bytes) = self.cache.lock().evict_lowest_half();
        let report = self.finish(EvictionReason::Pressure, removed_entries, freed_bytes);

        warn!(
            percent,
            removed = report.removed_entries,
            freed_bytes = report.freed_bytes,
            "Relieved memory pressure"
        );
        report
    }

    fn finish(
        &self,
        reason: EvictionReason,
        removed_entries: usize,
        freed_bytes: u64,
    ) -> ReclaimReport {
        let host_gc = match &self.gc_hint {
            Some(hint) => {
                hint.collect();
                true
            }
            None => false,
        };

        self.events.publish(EngineEvent::GcCompleted(GcCompletedPayload {
            reason,
            removed_entries,
            freed_bytes,
            host_gc,
        }));

        ReclaimReport {
            removed_entries,
            freed_bytes,
            host_gc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_cache::CacheStore;
    use cairn_core::InMemoryBus;
    use cairn_core::cache::SetOptions;
    use cairn_core::config::CacheConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::broadcast;

    #[derive(Default)]
    struct CountingHint {
        calls: AtomicUsize,
    }

    impl GcHint for CountingHint {
        fn collect(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn setup(
        hint: Option<Arc<dyn GcHint>>,
    ) -> (MemoryManager, SharedCache, broadcast::Receiver<EngineEvent>) {
        let bus = InMemoryBus::new();
        let rx = bus.receiver();
        let bus: Arc<dyn EventBus> = Arc::new(bus);
        let config = CacheConfig {
            compression_enabled: false,
            ..CacheConfig::default()
        };
        let cache = SharedCache::new(CacheStore::new(config, bus.clone()));
        (MemoryManager::new(cache.clone(), bus, hint), cache, rx)
    }

    fn last_gc(rx: &mut broadcast::Receiver<EngineEvent>) -> GcCompletedPayload {
        let mut found = None;
        while let Ok(event) = rx.try_recv() {
            if let EngineEvent::GcCompleted(payload) = event {
                found = Some(payload);
            }
        }
        found.expect("no gc-completed event")
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_only_expired() {
        let (manager, cache, mut rx) = setup(None);
        {
            let mut store = cache.lock();
            store.set("short", "x", SetOptions::ttl(1)).unwrap();
            store.set("long", "y", SetOptions::ttl(600)).unwrap();
        }

        tokio::time::advance(Duration::from_millis(1_100)).await;
        let report = manager.sweep();

        assert_eq!(report.removed_entries, 1);
        assert!(report.freed_bytes > 0);
        assert!(!report.host_gc);
        assert!(cache.lock().contains("long"));
        assert!(!cache.lock().contains("short"));

        let event = last_gc(&mut rx);
        assert_eq!(event.reason, EvictionReason::Expired);
        assert_eq!(event.removed_entries, 1);
    }

    #[tokio::test]
    async fn test_sweep_invokes_host_hint() {
        let hint = Arc::new(CountingHint::default());
        let (manager, _cache, mut rx) = setup(Some(hint.clone() as Arc<dyn GcHint>));

        let report = manager.sweep();

        assert_eq!(report.removed_entries, 0);
        assert!(report.host_gc);
        assert_eq!(hint.calls.load(Ordering::SeqCst), 1);
        assert!(last_gc(&mut rx).host_gc);
    }

    #[tokio::test]
    async fn test_pressure_drops_lowest_hit_half() {
        let (manager, cache, mut rx) = setup(None);
        {
            let mut store = cache.lock();
            for (key, hits) in [("a", 0), ("b", 5), ("c", 1), ("d", 3), ("e", 2)] {
                store.set(key, key, SetOptions::ttl(3600)).unwrap();
                for _ in 0..hits {
                    store.get::<String>(key);
                }
            }
        }

        let report = manager.relieve_pressure(91.0);

        assert_eq!(report.removed_entries, 3);
        let store = cache.lock();
        assert!(store.contains("b"));
        assert!(store.contains("d"));
        assert_eq!(store.len(), 2);
        drop(store);

        assert_eq!(last_gc(&mut rx).reason, EvictionReason::Pressure);
    }
}
