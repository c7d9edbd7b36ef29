//! Events emitted by the engine for observers.

use crate::cache::EvictionReason;
use crate::config::EngineConfig;
use crate::metrics::MetricsSnapshot;
use crate::quality::{QualitySettings, QualityTier};
use crate::resource::{ResourceDescriptor, ResourceKind, ResourcePayload};
use serde::{Deserialize, Serialize};

/// All events in the Cairn engine.
///
/// Serialized with a `type` tag carrying the kebab-case event name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum EngineEvent {
    // Cache
    CacheSet(CacheSetPayload),
    CacheEvicted(CacheEvictedPayload),
    CacheCleared(CacheClearedPayload),
    CacheRejected(CacheRejectedPayload),

    // Resources
    ResourceLoaded(ResourceLoadedPayload),
    ResourceError(ResourceErrorPayload),

    // Monitoring
    Metrics(MetricsSnapshot),
    MemoryWarning(MemoryWarningPayload),
    GcCompleted(GcCompletedPayload),

    // Control
    QualityChanged(QualityChangedPayload),
    ConfigUpdated(ConfigUpdatedPayload),
}

impl EngineEvent {
    /// Wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::CacheSet(_) => "cache-set",
            EngineEvent::CacheEvicted(_) => "cache-evicted",
            EngineEvent::CacheCleared(_) => "cache-cleared",
            EngineEvent::CacheRejected(_) => "cache-rejected",
            EngineEvent::ResourceLoaded(_) => "resource-loaded",
            EngineEvent::ResourceError(_) => "resource-error",
            EngineEvent::Metrics(_) => "metrics",
            EngineEvent::MemoryWarning(_) => "memory-warning",
            EngineEvent::GcCompleted(_) => "gc-completed",
            EngineEvent::QualityChanged(_) => "quality-changed",
            EngineEvent::ConfigUpdated(_) => "config-updated",
        }
    }
}

// === Cache Payloads ===

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSetPayload {
    pub key: String,
    pub size: u64,
    pub compressed: bool,
    pub ttl_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEvictedPayload {
    pub keys: Vec<String>,
    pub freed_bytes: u64,
    pub reason: EvictionReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheClearedPayload {
    pub entries: usize,
    pub freed_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRejectedPayload {
    pub key: String,
    pub size: u64,
    pub limit: u64,
}

// === Resource Payloads ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceLoadedPayload {
    pub id: String,
    pub kind: ResourceKind,
    pub locator: String,
    pub from_cache: bool,
    pub duration_ms: u64,
    pub size: u64,
    pub payload: ResourcePayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceErrorPayload {
    pub descriptor: ResourceDescriptor,
    pub error: String,
}

// === Monitoring Payloads ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryWarningPayload {
    pub percent: f64,
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcCompletedPayload {
    /// `expired` for the periodic sweep, `pressure` for emergency relief.
    pub reason: EvictionReason,
    pub removed_entries: usize,
    pub freed_bytes: u64,
    /// Whether the host collector hint was invoked.
    pub host_gc: bool,
}

// === Control Payloads ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityChangedPayload {
    pub from: QualityTier,
    pub to: QualityTier,
    pub settings: QualitySettings,
    /// Set when the change came from an explicit override.
    pub manual: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigUpdatedPayload {
    pub config: EngineConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_matches_name() {
        let events = vec![
            EngineEvent::CacheCleared(CacheClearedPayload {
                entries: 2,
                freed_bytes: 10,
            }),
            EngineEvent::MemoryWarning(MemoryWarningPayload {
                percent: 91.0,
                threshold: 85.0,
            }),
            EngineEvent::GcCompleted(GcCompletedPayload {
                reason: EvictionReason::Expired,
                removed_entries: 0,
                freed_bytes: 0,
                host_gc: false,
            }),
            EngineEvent::ConfigUpdated(ConfigUpdatedPayload {
                config: EngineConfig::default(),
            }),
        ];

        for event in events {
            let value = serde_json::to_value(&event).unwrap();
            assert_eq!(value["type"], event.name());
        }
    }

    #[test]
    fn test_evicted_payload_shape() {
        let event = EngineEvent::CacheEvicted(CacheEvictedPayload {
            keys: vec!["a".to_string()],
            freed_bytes: 128,
            reason: EvictionReason::Pressure,
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "type": "cache-evicted",
                "keys": ["a"],
                "freed_bytes": 128,
                "reason": "pressure"
            })
        );
    }
}
