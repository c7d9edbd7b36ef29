//! Adaptive quality control.

use cairn_core::config::{EngineConfig, QualityThresholds};
use cairn_core::events::{EngineEvent, QualityChangedPayload};
use cairn_core::metrics::MetricsSnapshot;
use cairn_core::ports::EventBus;
use cairn_core::quality::QualityTier;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// Direction the controller wants to move for a given sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjustment {
    Downgrade,
    Upgrade,
    Hold,
}

impl Adjustment {
    /// Downgrade wins when both conditions hold.
    pub fn decide(thresholds: &QualityThresholds, fps: f64, memory_percent: f64) -> Self {
        if fps < thresholds.downgrade_below_fps
            || memory_percent > thresholds.downgrade_above_memory_percent
        {
            Adjustment::Downgrade
        } else if fps > thresholds.upgrade_above_fps
            && memory_percent < thresholds.upgrade_below_memory_percent
        {
            Adjustment::Upgrade
        } else {
            Adjustment::Hold
        }
    }
}

/// Moves the quality tier at most one step per snapshot.
pub struct QualityController {
    tier: QualityTier,
    events: Arc<dyn EventBus>,
    config: watch::Receiver<EngineConfig>,
}

impl QualityController {
    pub fn new(events: Arc<dyn EventBus>, config: watch::Receiver<EngineConfig>) -> Self {
        let tier = config.borrow().quality.initial_tier;
        Self {
            tier,
            events,
            config,
        }
    }

    pub fn tier(&self) -> QualityTier {
        self.tier
    }

    /// Apply the transition rule to one snapshot. Returns the new tier when
    /// it changed. Does nothing while adaptive control is disabled.
    pub fn evaluate(&mut self, snapshot: &MetricsSnapshot) -> Option<QualityTier> {
        let (adaptive, thresholds) = {
            let config = self.config.borrow();
            (config.quality.adaptive, config.quality.thresholds.clone())
        };
        if !adaptive {
            return None;
        }

        let fps = snapshot.graphics.fps;
        let memory_percent = snapshot.memory.percent;
        let next = match Adjustment::decide(&thresholds, fps, memory_percent) {
            Adjustment::Downgrade => self.tier.lower(),
            Adjustment::Upgrade => self.tier.higher(),
            Adjustment::Hold => None,
        };

        let Some(next) = next else {
            debug!(tier = %self.tier, fps, memory_percent, "Quality unchanged");
            return None;
        };

        info!(
            from = %self.tier,
            to = %next,
            fps,
            memory_percent,
            "Adjusting quality tier"
        );
        self.apply(next, false);
        Some(next)
    }

    /// Manual override. Publishes even when the tier is unchanged so the
    /// host can re-apply its settings.
    pub fn set_tier(&mut self, tier: QualityTier) {
        info!(from = %self.tier, to = %tier, "Quality tier set manually");
        self.apply(tier, true);
    }

    fn apply(&mut self, to: QualityTier, manual: bool) {
        let from = self.tier;
        self.tier = to;
        let settings = self.config.borrow().quality.tiers.settings(to).clone();
        self.events.publish(EngineEvent::QualityChanged(QualityChangedPayload {
            from,
            to,
            settings,
            manual,
        }));
    }
}
