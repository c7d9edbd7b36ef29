//! Cloneable handle to a cache store shared between components.

use crate::store::CacheStore;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Shared cache handle.
///
/// The guard must never be held across an `.await`.
#[derive(Clone)]
pub struct SharedCache {
    inner: Arc<Mutex<CacheStore>>,
}

impl SharedCache {
    pub fn new(store: CacheStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// Lock the store, recovering from poisoning.
    pub fn lock(&self) -> MutexGuard<'_, CacheStore> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
