//! Quality tiers and the rendering parameters bundled with each.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Discrete rendering-fidelity level, ordered from cheapest to richest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    Low,
    Medium,
    #[default]
    High,
    Ultra,
}

impl QualityTier {
    pub const ALL: [QualityTier; 4] = [
        QualityTier::Low,
        QualityTier::Medium,
        QualityTier::High,
        QualityTier::Ultra,
    ];

    /// One tier cheaper, or `None` at the bottom.
    pub fn lower(self) -> Option<Self> {
        match self {
            QualityTier::Low => None,
            QualityTier::Medium => Some(QualityTier::Low),
            QualityTier::High => Some(QualityTier::Medium),
            QualityTier::Ultra => Some(QualityTier::High),
        }
    }

    /// One tier richer, or `None` at the top.
    pub fn higher(self) -> Option<Self> {
        match self {
            QualityTier::Low => Some(QualityTier::Medium),
            QualityTier::Medium => Some(QualityTier::High),
            QualityTier::High => Some(QualityTier::Ultra),
            QualityTier::Ultra => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::Low => "low",
            QualityTier::Medium => "medium",
            QualityTier::High => "high",
            QualityTier::Ultra => "ultra",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityTier {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(QualityTier::Low),
            "medium" => Ok(QualityTier::Medium),
            "high" => Ok(QualityTier::High),
            "ultra" => Ok(QualityTier::Ultra),
            other => Err(crate::Error::InvalidConfig(format!(
                "Unknown quality tier: {}",
                other
            ))),
        }
    }
}

/// Shadow map fidelity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShadowQuality {
    Off,
    Low,
    Medium,
    High,
}

/// Rendering parameters reported to the host renderer for a tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualitySettings {
    /// Fraction of native resolution the scene is rendered at.
    pub render_scale: f32,
    /// Maximum texture edge in pixels.
    pub texture_resolution: u32,
    pub shadow_quality: ShadowQuality,
    pub max_particles: u32,
    /// MSAA sample count (1 = off).
    pub anti_aliasing: u8,
    /// Far-plane distance in world units.
    pub view_distance: f32,
}

impl QualitySettings {
    /// Built-in parameter bundle for a tier.
    pub fn preset(tier: QualityTier) -> Self {
        match tier {
            QualityTier::Low => Self {
                render_scale: 0.5,
                texture_resolution: 512,
                shadow_quality: ShadowQuality::Off,
                max_particles: 500,
                anti_aliasing: 1,
                view_distance: 250.0,
            },
            QualityTier::Medium => Self {
                render_scale: 0.75,
                texture_resolution: 1024,
                shadow_quality: ShadowQuality::Low,
                max_particles: 2_000,
                anti_aliasing: 2,
                view_distance: 500.0,
            },
            QualityTier::High => Self {
                render_scale: 1.0,
                texture_resolution: 2048,
                shadow_quality: ShadowQuality::Medium,
                max_particles: 5_000,
                anti_aliasing: 4,
                view_distance: 1_000.0,
            },
            QualityTier::Ultra => Self {
                render_scale: 1.0,
                texture_resolution: 4096,
                shadow_quality: ShadowQuality::High,
                max_particles: 10_000,
                anti_aliasing: 8,
                view_distance: 2_000.0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_steps() {
        assert_eq!(QualityTier::Ultra.lower(), Some(QualityTier::High));
        assert_eq!(QualityTier::Low.lower(), None);
        assert_eq!(QualityTier::Low.higher(), Some(QualityTier::Medium));
        assert_eq!(QualityTier::Ultra.higher(), None);
    }

    #[test]
    fn test_parse_tier() {
        assert_eq!("ULTRA".parse::<QualityTier>().unwrap(), QualityTier::Ultra);
        assert!("cinematic".parse::<QualityTier>().is_err());
    }

    #[test]
    fn test_presets_scale_with_tier() {
        let particles: Vec<u32> = QualityTier::ALL
            .iter()
            .map(|t| QualitySettings::preset(*t).max_particles)
            .collect();
        assert!(particles.windows(2).all(|w| w[0] < w[1]));
    }
}
