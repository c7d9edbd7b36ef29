//! Self-driving resource loader.

use crate::network::{LatencyTimer, NetworkStats};
use crate::queue::LoadQueue;
use cairn_cache::SharedCache;
use cairn_core::cache::SetOptions;
use cairn_core::config::EngineConfig;
use cairn_core::events::{EngineEvent, ResourceErrorPayload, ResourceLoadedPayload};
use cairn_core::metrics::NetworkMetrics;
use cairn_core::ports::{EventBus, ResourceFetcher};
use cairn_core::resource::{ResourceDescriptor, ResourcePayload};
use cairn_core::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Loads resources in priority order with at most
/// `loader.max_concurrent_loads` fetches in flight.
///
/// Every admitted descriptor ends in exactly one `resource-loaded` or
/// `resource-error` event, unless the loader is closed first.
#[derive(Clone)]
pub struct ResourceLoader {
    inner: Arc<LoaderInner>,
}

struct LoaderInner {
    queue: Mutex<LoadQueue>,
    cache: SharedCache,
    fetcher: Arc<dyn ResourceFetcher>,
    events: Arc<dyn EventBus>,
    network: Arc<NetworkStats>,
    config: watch::Receiver<EngineConfig>,
    closed: AtomicBool,
}

impl ResourceLoader {
    pub fn new(
        cache: SharedCache,
        fetcher: Arc<dyn ResourceFetcher>,
        events: Arc<dyn EventBus>,
        config: watch::Receiver<EngineConfig>,
    ) -> Self {
        Self {
            inner: Arc::new(LoaderInner {
                queue: Mutex::new(LoadQueue::new()),
                cache,
                fetcher,
                events,
                network: NetworkStats::new(),
                config,
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Queue a descriptor and admit whatever fits. Must be called from
    /// within a Tokio runtime.
    pub fn enqueue(&self, descriptor: ResourceDescriptor) {
        if self.inner.is_closed() {
            warn!(id = %descriptor.id, "Loader closed, dropping descriptor");
            return;
        }

        debug!(
            id = %descriptor.id,
            priority = ?descriptor.priority,
            "Queueing resource"
        );
        self.inner.queue().enqueue(descriptor);
        LoaderInner::schedule(&self.inner);
    }

    /// Descriptors waiting for a slot.
    pub fn pending(&self) -> usize {
        self.inner.queue().len()
    }

    /// Descriptors currently being loaded.
    pub fn in_flight(&self) -> usize {
        self.inner.queue().in_flight()
    }

    pub fn network(&self) -> NetworkMetrics {
        self.inner.network.snapshot()
    }

    /// Stop admitting work and drop the backlog. Results of loads already
    /// in flight are discarded.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let dropped = self.inner.queue().clear_backlog();
        info!(dropped, "Resource loader closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

impl LoaderInner {
    fn queue(&self) -> MutexGuard<'_, LoadQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn schedule(inner: &Arc<Self>) {
        if inner.is_closed() {
            return;
        }

        let max = inner.config.borrow().loader.max_concurrent_loads;
        let admitted = inner.queue().admit(max);

        for descriptor in admitted {
            let slot = Slot { inner: inner.clone() };
            tokio::spawn(async move {
                slot.inner.load(descriptor).await;
                drop(slot);
            });
        }
    }

    async fn load(&self, descriptor: ResourceDescriptor) {
        let key = descriptor.cache_key();

        if descriptor.use_cache {
            let mut cache = self.cache.lock();
            if let Some(payload) = cache.get::<ResourcePayload>(&key) {
                if self.is_closed() {
                    debug!(id = %descriptor.id, "Discarding cache hit after close");
                } else {
                    debug!(id = %descriptor.id, "Resource served from cache");
                    self.publish_loaded(&descriptor, payload, true, 0);
                }
                return;
            }
        }

        let timer = LatencyTimer::start();
        let result = self
            .fetch_with_retry(&descriptor)
            .await
            .and_then(|body| {
                let size = body.len() as u64;
                ResourcePayload::decode(descriptor.kind, body).map(|payload| (payload, size))
            });

        // Checked under the cache lock so no result lands after the clear
        // that follows `close`.
        let mut cache = self.cache.lock();
        if self.is_closed() {
            debug!(id = %descriptor.id, "Discarding result after close");
            return;
        }

        match result {
            Ok((payload, size)) => {
                let elapsed = timer.elapsed_ms();
                self.network.record_success(size, elapsed);

                if descriptor.use_cache {
                    let stored = cache.set(&key, &payload, SetOptions::default());
                    if let Err(e) = stored {
                        warn!(id = %descriptor.id, error = %e, "Failed to cache resource");
                    }
                }

                info!(
                    id = %descriptor.id,
                    size,
                    duration_ms = elapsed,
                    "Resource loaded"
                );
                self.publish_loaded(&descriptor, payload, false, elapsed);
            }
            Err(e) => {
                self.network.record_error();
                warn!(
                    id = %descriptor.id,
                    locator = %descriptor.locator,
                    error = %e,
                    "Resource load failed"
                );
                self.events.publish(EngineEvent::ResourceError(ResourceErrorPayload {
                    descriptor,
                    error: e.to_string(),
                }));
            }
        }
    }

    async fn fetch_with_retry(&self, descriptor: &ResourceDescriptor) -> Result<Vec<u8>> {
        let config = self.config.borrow().loader.clone();
        let mut attempt = 1;

        loop {
            self.network.record_request();
            let result = match tokio::time::timeout(
                config.fetch_timeout(),
                self.fetcher.fetch(descriptor),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(Error::FetchTimeout {
                    locator: descriptor.locator.clone(),
                    timeout_ms: config.fetch_timeout_ms,
                }),
            };

            match result {
                Err(e)
                    if e.is_retryable()
                        && attempt < config.retry_attempts
                        && !self.is_closed() =>
                {
                    debug!(
                        id = %descriptor.id,
                        attempt,
                        error = %e,
                        "Fetch failed, retrying"
                    );
                    attempt += 1;
                    tokio::time::sleep(config.retry_delay()).await;
                }
                other => return other,
            }
        }
    }

    fn publish_loaded(
        &self,
        descriptor: &ResourceDescriptor,
        payload: ResourcePayload,
        from_cache: bool,
        duration_ms: u64,
    ) {
        self.events.publish(EngineEvent::ResourceLoaded(ResourceLoadedPayload {
            id: descriptor.id.clone(),
            kind: descriptor.kind,
            locator: descriptor.locator.clone(),
            from_cache,
            duration_ms,
            size: payload.len() as u64,
            payload,
        }));
    }
}

/// In-flight slot held by a spawned load. Dropping it frees the slot and
/// admits more work, including when the load panics.
struct Slot {
    inner: Arc<LoaderInner>,
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.inner.queue().complete();
        if tokio::runtime::Handle::try_current().is_ok() {
            LoaderInner::schedule(&self.inner);
        }
    }
}
