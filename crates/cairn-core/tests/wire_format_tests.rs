//! Wire shapes observed by collaborators outside the engine.

use cairn_core::config::EngineConfig;
use cairn_core::events::*;
use cairn_core::quality::{QualitySettings, QualityTier};
use cairn_core::resource::*;
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn test_descriptor_defaults_from_host_json() {
    let descriptor: ResourceDescriptor = serde_json::from_value(json!({
        "id": "hero",
        "kind": "image",
        "locator": "https://cdn.example.com/hero.png"
    }))
    .expect("deserialize");

    assert_eq!(descriptor.priority, Priority::Medium);
    assert!(descriptor.use_cache);
    assert_eq!(descriptor.cache_key(), "resource:https://cdn.example.com/hero.png");
}

#[test]
fn test_resource_loaded_shape() {
    let event = EngineEvent::ResourceLoaded(ResourceLoadedPayload {
        id: "chime".to_string(),
        kind: ResourceKind::Audio,
        locator: "https://cdn.example.com/chime.ogg".to_string(),
        from_cache: true,
        duration_ms: 0,
        size: 3,
        payload: ResourcePayload::Bytes(vec![1, 2, 3]),
    });

    let value = serde_json::to_value(&event).expect("serialize");
    assert_eq!(
        value,
        json!({
            "type": "resource-loaded",
            "id": "chime",
            "kind": "audio",
            "locator": "https://cdn.example.com/chime.ogg",
            "from_cache": true,
            "duration_ms": 0,
            "size": 3,
            "payload": {"encoding": "bytes", "data": "AQID"}
        })
    );
}

#[test]
fn test_resource_error_carries_descriptor() {
    let descriptor =
        ResourceDescriptor::new("map", ResourceKind::Json, "https://api.example.com/map")
            .with_priority(Priority::Critical);
    let event = EngineEvent::ResourceError(ResourceErrorPayload {
        descriptor: descriptor.clone(),
        error: "Fetch of https://api.example.com/map returned status 503".to_string(),
    });

    let json = serde_json::to_string(&event).expect("serialize");
    let parsed: EngineEvent = serde_json::from_str(&json).expect("deserialize");

    match parsed {
        EngineEvent::ResourceError(payload) => assert_eq!(payload.descriptor, descriptor),
        other => panic!("unexpected event: {:?}", other),
    }
}

#[test]
fn test_quality_changed_shape() {
    let event = EngineEvent::QualityChanged(QualityChangedPayload {
        from: QualityTier::Ultra,
        to: QualityTier::High,
        settings: QualitySettings::preset(QualityTier::High),
        manual: false,
    });

    let value = serde_json::to_value(&event).expect("serialize");
    assert_eq!(value["type"], "quality-changed");
    assert_eq!(value["from"], "ultra");
    assert_eq!(value["to"], "high");
    assert_eq!(value["settings"]["render_scale"], 1.0);
}

#[test]
fn test_partial_yaml_config() {
    let yaml = r#"
cache:
  max_total_bytes: 8388608
  compression: zstd
quality:
  initial_tier: medium
  thresholds:
    downgrade_below_fps: 24
monitoring:
  enabled: false
"#;

    let config: EngineConfig = serde_yaml::from_str(yaml).expect("parse");
    config.validate().expect("valid");

    let defaults = EngineConfig::default();
    assert_eq!(config.cache.max_total_bytes, 8 * 1024 * 1024);
    assert_eq!(config.cache.max_entry_bytes, defaults.cache.max_entry_bytes);
    assert_eq!(config.quality.initial_tier, QualityTier::Medium);
    assert_eq!(config.quality.thresholds.downgrade_below_fps, 24.0);
    assert_eq!(config.quality.thresholds.upgrade_above_fps, 55.0);
    assert!(!config.monitoring.enabled);
    assert_eq!(config.loader, defaults.loader);
}
