//! TTL cache store with size accounting and frequency-based eviction.

use crate::compression::{compress, decompress};
use crate::types::{CacheEntry, CacheStats, SetOutcome};
use cairn_core::cache::{CompressionType, EvictionReason, SetOptions};
use cairn_core::config::CacheConfig;
use cairn_core::events::{
    CacheClearedPayload, CacheEvictedPayload, CacheRejectedPayload, CacheSetPayload, EngineEvent,
};
use cairn_core::ports::EventBus;
use cairn_core::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Key/value store with per-entry TTL, optional compression and hit counting.
///
/// The sum of `size` over live entries never exceeds
/// `CacheConfig::max_total_bytes` once a call returns.
pub struct CacheStore {
    entries: HashMap<String, CacheEntry>,
    config: CacheConfig,
    events: Arc<dyn EventBus>,
    total_bytes: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
    rejections: u64,
    next_sequence: u64,
}

enum Lookup<T> {
    Absent,
    Expired,
    Corrupt(Error),
    Hit(T),
}

impl CacheStore {
    pub fn new(config: CacheConfig, events: Arc<dyn EventBus>) -> Self {
        Self {
            entries: HashMap::new(),
            config,
            events,
            total_bytes: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
            rejections: 0,
            next_sequence: 0,
        }
    }

    /// Serialize and store `value` under `key`, replacing any previous entry.
    ///
    /// Oversized values are rejected with a `cache-rejected` event rather
    /// than an error; only a value that cannot be serialized returns `Err`.
    pub fn set<T: Serialize + ?Sized>(
        &mut self,
        key: &str,
        value: &T,
        options: SetOptions,
    ) -> Result<SetOutcome> {
        let raw = serde_json::to_vec(value)?;
        let raw_len = raw.len();
        let ttl_seconds = options.ttl_seconds.unwrap_or(self.config.default_ttl_seconds);
        let want_compression = options.compress.unwrap_or(self.config.compression_enabled);

        let (stored, compression) = self.maybe_compress(key, raw, want_compression);
        let size = stored.len() as u64;

        if size > self.config.max_entry_bytes {
            return Ok(self.reject(key, size, self.config.max_entry_bytes));
        }

        // Overwrites release the old entry's bytes before accounting.
        if let Some(previous) = self.entries.remove(key) {
            self.total_bytes -= previous.size;
        }

        if self.total_bytes + size > self.config.max_total_bytes {
            self.evict_ordered(size, EvictionReason::Capacity);
            if self.total_bytes + size > self.config.max_total_bytes {
                return Ok(self.reject(key, size, self.config.max_total_bytes));
            }
        }

        let entry = CacheEntry {
            key: key.to_string(),
            value: stored,
            size,
            created_at: Instant::now(),
            ttl: Duration::from_secs(ttl_seconds),
            compression,
            hit_count: 0,
            sequence: self.next_sequence,
        };
        self.next_sequence += 1;
        let compressed = entry.is_compressed();
        self.total_bytes += size;
        self.entries.insert(key.to_string(), entry);

        debug!(
            key = %key,
            size,
            raw_size = raw_len,
            compressed,
            ttl_seconds,
            "Cache entry stored"
        );
        self.events.publish(EngineEvent::CacheSet(CacheSetPayload {
            key: key.to_string(),
            size,
            compressed,
            ttl_seconds,
        }));

        Ok(SetOutcome::Stored { size, compressed })
    }

    /// Read and deserialize the value under `key`.
    ///
    /// Absent, expired and undecodable entries are all misses; the latter two
    /// are removed on the way out.
    pub fn get<T: DeserializeOwned>(&mut self, key: &str) -> Option<T> {
        let now = Instant::now();
        let lookup = match self.entries.get(key) {
            None => Lookup::Absent,
            Some(entry) if entry.is_expired(now) => Lookup::Expired,
            Some(entry) => match decode::<T>(entry) {
                Ok(value) => Lookup::Hit(value),
                Err(e) => Lookup::Corrupt(e),
            },
        };

        match lookup {
            Lookup::Hit(value) => {
                if let Some(entry) = self.entries.get_mut(key) {
                    entry.hit_count += 1;
                }
                self.hits += 1;
                Some(value)
            }
            Lookup::Absent => {
                self.misses += 1;
                None
            }
            Lookup::Expired => {
                self.misses += 1;
                self.remove_with_reason(key, EvictionReason::Expired);
                None
            }
            Lookup::Corrupt(error) => {
                self.misses += 1;
                warn!(key = %key, error = %error, "Evicting corrupt cache entry");
                self.remove_with_reason(key, EvictionReason::Corrupt);
                None
            }
        }
    }

    /// Whether a live entry exists for `key`. Does not count as a read.
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(Instant::now()))
    }

    /// Remove a single entry.
    pub fn remove(&mut self, key: &str) -> bool {
        self.remove_with_reason(key, EvictionReason::Manual)
    }

    /// Remove every entry unconditionally.
    pub fn clear(&mut self) -> usize {
        let entries = self.entries.len();
        let freed_bytes = self.total_bytes;
        self.entries.clear();
        self.total_bytes = 0;

        info!(entries, freed_bytes, "Cache cleared");
        self.events
            .publish(EngineEvent::CacheCleared(CacheClearedPayload { entries, freed_bytes }));
        entries
    }

    /// Evict the least-read entries until `target_bytes` are freed or the
    /// store is empty. Returns the bytes freed.
    pub fn evict_least_valuable(&mut self, target_bytes: u64) -> u64 {
        self.evict_ordered(target_bytes, EvictionReason::Capacity)
    }

    /// Emergency relief: drop the least-read half of all entries, ignoring TTL.
    ///
    /// Returns the number of entries removed and the bytes freed.
    pub fn evict_lowest_half(&mut self) -> (usize, u64) {
        let count = self.entries.len().div_ceil(2);
        let victims: Vec<String> = self.by_value().into_iter().take(count).collect();
        self.remove_batch(victims, EvictionReason::Pressure)
    }

    /// Remove every entry whose TTL has elapsed.
    ///
    /// Returns the number of entries removed and the bytes freed.
    pub fn purge_expired(&mut self) -> (usize, u64) {
        let now = Instant::now();
        let expired: Vec<String> = self
            .entries
            .values()
            .filter(|entry| entry.is_expired(now))
            .map(|entry| entry.key.clone())
            .collect();
        self.remove_batch(expired, EvictionReason::Expired)
    }

    /// Apply new limits, evicting down to a shrunken total if needed.
    pub fn reconfigure(&mut self, config: CacheConfig) {
        self.config = config;
        if self.total_bytes > self.config.max_total_bytes {
            let excess = self.total_bytes - self.config.max_total_bytes;
            info!(excess, "Cache limit lowered, evicting");
            self.evict_ordered(excess, EvictionReason::Capacity);
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Inspect an entry without counting a read.
    pub fn entry(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.entries.len(),
            total_bytes: self.total_bytes,
            max_total_bytes: self.config.max_total_bytes,
            evictions: self.evictions,
            rejections: self.rejections,
        }
    }

    fn maybe_compress(
        &self,
        key: &str,
        raw: Vec<u8>,
        want_compression: bool,
    ) -> (Vec<u8>, CompressionType) {
        let algorithm = self.config.compression;
        if !want_compression
            || algorithm == CompressionType::None
            || (raw.len() as u64) <= self.config.compression_threshold_bytes
        {
            return (raw, CompressionType::None);
        }

        match compress(&raw, algorithm) {
            Ok(compressed) if compressed.len() < raw.len() => (compressed, algorithm),
            Ok(_) => (raw, CompressionType::None),
            Err(e) => {
                debug!(key = %key, error = %e, "Compression failed, storing raw");
                (raw, CompressionType::None)
            }
        }
    }

    fn reject(&mut self, key: &str, size: u64, limit: u64) -> SetOutcome {
        self.rejections += 1;
        warn!(key = %key, size, limit, "Cache write rejected");
        self.events.publish(EngineEvent::CacheRejected(CacheRejectedPayload {
            key: key.to_string(),
            size,
            limit,
        }));
        SetOutcome::Rejected { size, limit }
    }

    /// Keys ordered from least to most valuable: ascending hit count, then
    /// oldest write first.
    fn by_value(&self) -> Vec<String> {
        let mut ranked: Vec<&CacheEntry> = self.entries.values().collect();
        ranked.sort_by_key(|entry| (entry.hit_count, entry.sequence));
        ranked.into_iter().map(|entry| entry.key.clone()).collect()
    }

    fn evict_ordered(&mut self, target_bytes: u64, reason: EvictionReason) -> u64 {
        let mut victims = Vec::new();
        let mut planned = 0u64;
        for key in self.by_value() {
            if planned >= target_bytes {
                break;
            }
            if let Some(entry) = self.entries.get(&key) {
                planned += entry.size;
            }
            victims.push(key);
        }
        self.remove_batch(victims, reason).1
    }

    /// Remove `keys` and publish one eviction event for the batch.
    fn remove_batch(&mut self, keys: Vec<String>, reason: EvictionReason) -> (usize, u64) {
        let mut freed_bytes = 0;
        let mut removed = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(entry) = self.entries.remove(&key) {
                self.total_bytes -= entry.size;
                freed_bytes += entry.size;
                removed.push(key);
            }
        }
        let count = removed.len();
        if count == 0 {
            return (0, 0);
        }

        self.evictions += count as u64;
        debug!(count, freed_bytes, ?reason, "Cache entries evicted");
        self.events.publish(EngineEvent::CacheEvicted(CacheEvictedPayload {
            keys: removed,
            freed_bytes,
            reason,
        }));
        (count, freed_bytes)
    }

    fn remove_with_reason(&mut self, key: &str, reason: EvictionReason) -> bool {
        self.remove_batch(vec![key.to_string()], reason).0 > 0
    }
}

fn decode<T: DeserializeOwned>(entry: &CacheEntry) -> Result<T> {
    let bytes = if entry.is_compressed() {
        Cow::Owned(decompress(&entry.value, entry.compression)?)
    } else {
        Cow::Borrowed(entry.value.as_slice())
    };
    serde_json::from_slice(&bytes).map_err(|e| Error::Corrupt(format!("{}: {}", entry.key, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_core::InMemoryBus;
    use pretty_assertions::assert_eq;
    use tokio::sync::broadcast;

    fn config(max_total_bytes: u64, max_entry_bytes: u64) -> CacheConfig {
        CacheConfig {
            max_total_bytes,
            max_entry_bytes,
            default_ttl_seconds: 60,
            compression_enabled: false,
            ..Default::default()
        }
    }

    fn store(config: CacheConfig) -> (CacheStore, broadcast::Receiver<EngineEvent>) {
        let bus = InMemoryBus::new();
        let rx = bus.receiver();
        (CacheStore::new(config, Arc::new(bus)), rx)
    }

    /// A string whose JSON form is exactly `size` bytes.
    fn sized(size: usize) -> String {
        "x".repeat(size - 2)
    }

    fn drain(rx: &mut broadcast::Receiver<EngineEvent>) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_set_then_get_counts_hits() {
        let (mut cache, _rx) = store(config(1024, 512));
        cache.set("unit:knight", &vec![1, 2, 3], SetOptions::default()).unwrap();

        let value: Option<Vec<u32>> = cache.get("unit:knight");
        assert_eq!(value, Some(vec![1, 2, 3]));
        let _: Option<Vec<u32>> = cache.get("unit:knight");
        let missing: Option<Vec<u32>> = cache.get("unit:archer");
        assert!(missing.is_none());

        assert_eq!(cache.entry("unit:knight").unwrap().hit_count, 2);
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (2, 1));
        assert!((stats.hit_rate() - 2.0 / 3.0).abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_a_miss() {
        let (mut cache, mut rx) = store(config(1024, 512));
        cache.set("a", "alpha", SetOptions::ttl(1)).unwrap();

        tokio::time::advance(Duration::from_millis(1000)).await;
        assert_eq!(cache.get::<String>("a"), Some("alpha".to_string()));

        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(cache.get::<String>("a"), None);
        assert!(cache.is_empty());
        assert_eq!(cache.total_bytes(), 0);

        let evicted = drain(&mut rx).into_iter().find_map(|event| match event {
            EngineEvent::CacheEvicted(payload) => Some(payload),
            _ => None,
        });
        assert_eq!(evicted.map(|p| p.reason), Some(EvictionReason::Expired));
    }

    #[test]
    fn test_total_never_exceeds_limit() {
        let (mut cache, _rx) = store(config(1000, 400));
        for i in 0..50 {
            let size = 50 + (i * 37) % 350;
            cache.set(&format!("k{}", i), &sized(size), SetOptions::default()).unwrap();
            assert!(cache.total_bytes() <= 1000, "total {} after write {}", cache.total_bytes(), i);
            let summed: u64 = (0..=i)
                .filter_map(|j| cache.entry(&format!("k{}", j)))
                .map(|entry| entry.size)
                .sum();
            assert_eq!(summed, cache.total_bytes());
        }
    }

    #[test]
    fn test_eviction_prefers_least_read() {
        let (mut cache, _rx) = store(config(300, 100));
        cache.set("a", &sized(100), SetOptions::default()).unwrap();
        cache.set("b", &sized(100), SetOptions::default()).unwrap();
        cache.set("c", &sized(100), SetOptions::default()).unwrap();
        for _ in 0..3 {
            cache.get::<String>("a");
        }
        cache.get::<String>("c");

        let outcome = cache.set("d", &sized(100), SetOptions::default()).unwrap();

        assert!(outcome.is_stored());
        assert!(!cache.contains("b"));
        assert!(cache.contains("a") && cache.contains("c") && cache.contains("d"));
        assert_eq!(cache.total_bytes(), 300);
    }

    #[test]
    fn test_hit_ties_break_by_write_order() {
        let (mut cache, _rx) = store(config(1000, 500));
        for key in ["first", "second", "third"] {
            cache.set(key, &sized(100), SetOptions::default()).unwrap();
        }

        let freed = cache.evict_least_valuable(150);

        assert_eq!(freed, 200);
        assert!(!cache.contains("first"));
        assert!(!cache.contains("second"));
        assert!(cache.contains("third"));
    }

    #[test]
    fn test_eviction_frees_room_for_requested_size() {
        let (mut cache, _rx) = store(config(500, 250));
        for i in 0..5 {
            cache.set(&format!("tile{}", i), &sized(100), SetOptions::default()).unwrap();
        }
        assert_eq!(cache.total_bytes(), 500);

        cache.set("big", &sized(250), SetOptions::default()).unwrap();

        assert!(cache.contains("big"));
        assert!(cache.total_bytes() <= 500);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_oversized_write_is_rejected() {
        let (mut cache, mut rx) = store(config(1000, 100));
        cache.set("keep", &sized(50), SetOptions::default()).unwrap();

        let outcome = cache.set("huge", &sized(101), SetOptions::default()).unwrap();

        assert_eq!(outcome, SetOutcome::Rejected { size: 101, limit: 100 });
        assert!(!cache.contains("huge"));
        assert!(cache.contains("keep"));
        assert_eq!(cache.stats().rejections, 1);
        assert!(drain(&mut rx).iter().any(|e| e.name() == "cache-rejected"));
    }

    #[test]
    fn test_overwrite_replaces_accounting() {
        let (mut cache, _rx) = store(config(1000, 500));
        cache.set("k", &sized(300), SetOptions::default()).unwrap();
        cache.get::<String>("k");
        cache.set("k", &sized(100), SetOptions::default()).unwrap();

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.total_bytes(), 100);
        assert_eq!(cache.entry("k").unwrap().hit_count, 0);
    }

    #[test]
    fn test_undecodable_entry_is_evicted() {
        let (mut cache, mut rx) = store(config(1000, 500));
        cache.set("stats", "not a number", SetOptions::default()).unwrap();

        assert_eq!(cache.get::<u64>("stats"), None);
        assert!(!cache.contains("stats"));
        assert_eq!(cache.stats().misses, 1);

        let reasons: Vec<EvictionReason> = drain(&mut rx)
            .into_iter()
            .filter_map(|event| match event {
                EngineEvent::CacheEvicted(payload) => Some(payload.reason),
                _ => None,
            })
            .collect();
        assert_eq!(reasons, vec![EvictionReason::Corrupt]);
    }

    #[test]
    fn test_compression_only_when_it_pays() {
        let mut cfg = config(1 << 20, 1 << 19);
        cfg.compression_enabled = true;
        cfg.compression_threshold_bytes = 64;
        let (mut cache, _rx) = store(cfg);

        let level = "wall,floor,floor,wall,".repeat(200);
        let outcome = cache.set("level", &level, SetOptions::default()).unwrap();
        match outcome {
            SetOutcome::Stored { size, compressed } => {
                assert!(compressed);
                assert!(size < level.len() as u64);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(cache.get::<String>("level"), Some(level.clone()));

        cache.set("tiny", "ok", SetOptions::default()).unwrap();
        assert!(!cache.entry("tiny").unwrap().is_compressed());

        cache
            .set("raw", &level, SetOptions::default().with_compress(false))
            .unwrap();
        assert!(!cache.entry("raw").unwrap().is_compressed());
    }

    #[test]
    fn test_lowest_half_ignores_ttl() {
        let (mut cache, _rx) = store(config(1000, 500));
        for (key, reads) in [("a", 5), ("b", 0), ("c", 2), ("d", 1)] {
            cache.set(key, &sized(10), SetOptions::ttl(3600)).unwrap();
            for _ in 0..reads {
                cache.get::<String>(key);
            }
        }

        let (removed, freed) = cache.evict_lowest_half();

        assert_eq!((removed, freed), (2, 20));
        assert!(cache.contains("a") && cache.contains("c"));
        assert!(!cache.contains("b") && !cache.contains("d"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_removes_only_expired() {
        let (mut cache, _rx) = store(config(1000, 500));
        cache.set("short", &sized(10), SetOptions::ttl(1)).unwrap();
        cache.set("long", &sized(20), SetOptions::ttl(10)).unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        let (removed, freed) = cache.purge_expired();

        assert_eq!((removed, freed), (1, 10));
        assert!(cache.contains("long"));
        assert_eq!(cache.stats().misses, 0);
    }

    #[test]
    fn test_shrinking_limit_evicts() {
        let (mut cache, _rx) = store(config(1000, 500));
        for i in 0..8 {
            cache.set(&format!("k{}", i), &sized(100), SetOptions::default()).unwrap();
        }

        cache.reconfigure(config(350, 200));

        assert!(cache.total_bytes() <= 350);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_clear_empties_store() {
        let (mut cache, mut rx) = store(config(1000, 500));
        cache.set("a", &sized(10), SetOptions::default()).unwrap();
        cache.set("b", &sized(10), SetOptions::default()).unwrap();
        drain(&mut rx);

        assert_eq!(cache.clear(), 2);
        assert_eq!(cache.clear(), 0);
        assert!(cache.is_empty());
        assert_eq!(cache.total_bytes(), 0);

        let events = drain(&mut rx);
        assert_eq!(
            events,
            vec![
                EngineEvent::CacheCleared(CacheClearedPayload { entries: 2, freed_bytes: 20 }),
                EngineEvent::CacheCleared(CacheClearedPayload { entries: 0, freed_bytes: 0 }),
            ]
        );
    }
}
