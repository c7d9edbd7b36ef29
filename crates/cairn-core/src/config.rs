//! Engine configuration.

use crate::cache::CompressionType;
use crate::quality::{QualitySettings, QualityTier};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(default)]
    pub quality: QualityConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

/// Cache store limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Upper bound on the summed size of all live entries.
    #[serde(default = "default_max_total_bytes")]
    pub max_total_bytes: u64,
    /// Writes larger than this are rejected.
    #[serde(default = "default_max_entry_bytes")]
    pub max_entry_bytes: u64,
    #[serde(default = "default_ttl_seconds")]
    pub default_ttl_seconds: u64,
    #[serde(default = "default_true")]
    pub compression_enabled: bool,
    #[serde(default = "default_compression")]
    pub compression: CompressionType,
    /// Payloads at or below this size are never compressed.
    #[serde(default = "default_compression_threshold")]
    pub compression_threshold_bytes: u64,
}

fn default_max_total_bytes() -> u64 {
    50 * 1024 * 1024
}

fn default_max_entry_bytes() -> u64 {
    5 * 1024 * 1024
}

fn default_ttl_seconds() -> u64 {
    3600
}

fn default_true() -> bool {
    true
}

fn default_compression() -> CompressionType {
    CompressionType::Gzip
}

fn default_compression_threshold() -> u64 {
    1024
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_total_bytes: default_max_total_bytes(),
            max_entry_bytes: default_max_entry_bytes(),
            default_ttl_seconds: default_ttl_seconds(),
            compression_enabled: true,
            compression: default_compression(),
            compression_threshold_bytes: default_compression_threshold(),
        }
    }
}

/// Resource load queue limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderConfig {
    #[serde(default = "default_max_concurrent_loads")]
    pub max_concurrent_loads: usize,
    /// Per-attempt fetch timeout.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
    /// Attempts per fetch, including the first.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_max_concurrent_loads() -> usize {
    6
}

fn default_fetch_timeout_ms() -> u64 {
    30_000
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    250
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_concurrent_loads: default_max_concurrent_loads(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl LoaderConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Adaptive quality controller settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityConfig {
    #[serde(default)]
    pub initial_tier: QualityTier,
    /// When false the tier only changes through manual overrides.
    #[serde(default = "default_true")]
    pub adaptive: bool,
    #[serde(default)]
    pub thresholds: QualityThresholds,
    #[serde(default)]
    pub tiers: QualityTiers,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            initial_tier: QualityTier::default(),
            adaptive: true,
            thresholds: QualityThresholds::default(),
            tiers: QualityTiers::default(),
        }
    }
}

/// Bands the controller keeps frame rate and memory inside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityThresholds {
    #[serde(default = "default_downgrade_below_fps")]
    pub downgrade_below_fps: f64,
    #[serde(default = "default_downgrade_above_memory")]
    pub downgrade_above_memory_percent: f64,
    #[serde(default = "default_upgrade_above_fps")]
    pub upgrade_above_fps: f64,
    #[serde(default = "default_upgrade_below_memory")]
    pub upgrade_below_memory_percent: f64,
}

fn default_downgrade_below_fps() -> f64 {
    30.0
}

fn default_downgrade_above_memory() -> f64 {
    80.0
}

fn default_upgrade_above_fps() -> f64 {
    55.0
}

fn default_upgrade_below_memory() -> f64 {
    60.0
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            downgrade_below_fps: default_downgrade_below_fps(),
            downgrade_above_memory_percent: default_downgrade_above_memory(),
            upgrade_above_fps: default_upgrade_above_fps(),
            upgrade_below_memory_percent: default_upgrade_below_memory(),
        }
    }
}

/// Rendering parameters for every tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityTiers {
    #[serde(default = "low_preset")]
    pub low: QualitySettings,
    #[serde(default = "medium_preset")]
    pub medium: QualitySettings,
    #[serde(default = "high_preset")]
    pub high: QualitySettings,
    #[serde(default = "ultra_preset")]
    pub ultra: QualitySettings,
}

fn low_preset() -> QualitySettings {
    QualitySettings::preset(QualityTier::Low)
}

fn medium_preset() -> QualitySettings {
    QualitySettings::preset(QualityTier::Medium)
}

fn high_preset() -> QualitySettings {
    QualitySettings::preset(QualityTier::High)
}

fn ultra_preset() -> QualitySettings {
    QualitySettings::preset(QualityTier::Ultra)
}

impl Default for QualityTiers {
    fn default() -> Self {
        Self {
            low: low_preset(),
            medium: medium_preset(),
            high: high_preset(),
            ultra: ultra_preset(),
        }
    }
}

impl QualityTiers {
    pub fn settings(&self, tier: QualityTier) -> &QualitySettings {
        match tier {
            QualityTier::Low => &self.low,
            QualityTier::Medium => &self.medium,
            QualityTier::High => &self.high,
            QualityTier::Ultra => &self.ultra,
        }
    }
}

/// Memory manager cadence and pressure threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_gc_interval")]
    pub gc_interval_seconds: u64,
    /// Memory-used percentage above which a pressure warning fires.
    #[serde(default = "default_warning_percent")]
    pub warning_percent: f64,
}

fn default_gc_interval() -> u64 {
    60
}

fn default_warning_percent() -> f64 {
    85.0
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            gc_interval_seconds: default_gc_interval(),
            warning_percent: default_warning_percent(),
        }
    }
}

impl MemoryConfig {
    pub fn gc_interval(&self) -> Duration {
        Duration::from_secs(self.gc_interval_seconds)
    }
}

/// Metrics sampling cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
}

fn default_sample_interval_ms() -> u64 {
    5_000
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_interval_ms: default_sample_interval_ms(),
        }
    }
}

impl MonitoringConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }
}

impl EngineConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every limit is usable.
    pub fn validate(&self) -> Result<()> {
        let cache = &self.cache;
        if cache.max_total_bytes == 0 {
            return Err(invalid("cache.max_total_bytes must be greater than zero"));
        }
        if cache.max_entry_bytes == 0 || cache.max_entry_bytes > cache.max_total_bytes {
            return Err(invalid(
                "cache.max_entry_bytes must be between 1 and cache.max_total_bytes",
            ));
        }
        if cache.default_ttl_seconds == 0 {
            return Err(invalid("cache.default_ttl_seconds must be greater than zero"));
        }
        if self.loader.max_concurrent_loads == 0 {
            return Err(invalid("loader.max_concurrent_loads must be greater than zero"));
        }
        if self.loader.fetch_timeout_ms == 0 {
            return Err(invalid("loader.fetch_timeout_ms must be greater than zero"));
        }
        if self.loader.retry_attempts == 0 {
            return Err(invalid("loader.retry_attempts must be at least 1"));
        }
        if self.memory.gc_interval_seconds == 0 {
            return Err(invalid("memory.gc_interval_seconds must be greater than zero"));
        }
        if !is_percent(self.memory.warning_percent) {
            return Err(invalid("memory.warning_percent must be within (0, 100]"));
        }
        if self.monitoring.sample_interval_ms == 0 {
            return Err(invalid("monitoring.sample_interval_ms must be greater than zero"));
        }

        let t = &self.quality.thresholds;
        if !is_percent(t.downgrade_above_memory_percent)
            || !is_percent(t.upgrade_below_memory_percent)
        {
            return Err(invalid("quality memory thresholds must be within (0, 100]"));
        }
        if t.upgrade_above_fps <= t.downgrade_below_fps {
            return Err(invalid(
                "quality.thresholds.upgrade_above_fps must exceed downgrade_below_fps",
            ));
        }
        if t.upgrade_below_memory_percent >= t.downgrade_above_memory_percent {
            return Err(invalid(
                "quality.thresholds.upgrade_below_memory_percent must be below \
                 downgrade_above_memory_percent",
            ));
        }
        for tier in QualityTier::ALL {
            let settings = self.quality.tiers.settings(tier);
            if !(settings.render_scale > 0.0 && settings.render_scale <= 2.0) {
                return Err(invalid(&format!(
                    "quality.tiers.{}.render_scale must be within (0, 2]",
                    tier
                )));
            }
        }
        Ok(())
    }

    /// Deep-merge a partial JSON document into a copy of this configuration.
    ///
    /// The result is validated before it is returned; `self` is never touched.
    pub fn merged(&self, partial: &serde_json::Value) -> Result<Self> {
        if !partial.is_object() {
            return Err(invalid("configuration update must be a JSON object"));
        }
        let mut current = serde_json::to_value(self)?;
        deep_merge(&mut current, partial);
        let updated: Self = serde_json::from_value(current)
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        updated.validate()?;
        Ok(updated)
    }
}

fn is_percent(value: f64) -> bool {
    value > 0.0 && value <= 100.0
}

fn invalid(message: &str) -> Error {
    Error::InvalidConfig(message.to_string())
}

/// Recursively overlay `patch` onto `target`; non-object values replace.
fn deep_merge(target: &mut serde_json::Value, patch: &serde_json::Value) {
    match (target, patch) {
        (serde_json::Value::Object(target), serde_json::Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}
