//! Quality tiers, their rendering presets and the tier classifier.
//!
//! Tiers form a fixed ordered set `low < medium < high < ultra`. Per-tier data
//! lives in a [`TierTable`] indexed by tier, so upgrade and downgrade checks
//! compare ordinals instead of names.

use crate::error::ParseTierError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Discrete rendering quality level.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Low,
    Medium,
    #[default]
    High,
    Ultra,
}

impl QualityTier {
    /// All tiers, lowest first.
    pub const ALL: [QualityTier; 4] = [
        QualityTier::Low,
        QualityTier::Medium,
        QualityTier::High,
        QualityTier::Ultra,
    ];

    /// Rank of the tier, 0 for low.
    pub fn ordinal(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QualityTier::Low => "low",
            QualityTier::Medium => "medium",
            QualityTier::High => "high",
            QualityTier::Ultra => "ultra",
        }
    }

    /// Whether `self` ranks strictly above `other`.
    pub fn is_above(self, other: QualityTier) -> bool {
        self.ordinal() > other.ordinal()
    }

    /// Next tier for the "cycle quality" command, wrapping from ultra to low.
    pub fn next_cyclic(self) -> QualityTier {
        Self::ALL[(self.ordinal() + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityTier {
    type Err = ParseTierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(QualityTier::Low),
            "medium" | "med" => Ok(QualityTier::Medium),
            "high" => Ok(QualityTier::High),
            "ultra" => Ok(QualityTier::Ultra),
            _ => Err(ParseTierError(s.to_string())),
        }
    }
}

/// Knob values written to the renderer when a tier is applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityPreset {
    /// Maximum screen-space error tolerated by the tileset.
    pub detail_error_threshold: f64,
    /// Render resolution relative to the display.
    pub resolution_scale: f64,
    /// Tile cache budget in megabytes.
    pub memory_budget_mb: u32,
}

impl QualityPreset {
    pub const fn new(detail_error_threshold: f64, resolution_scale: f64, memory_budget_mb: u32) -> Self {
        Self {
            detail_error_threshold,
            resolution_scale,
            memory_budget_mb,
        }
    }
}

/// One value per tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierTable<T> {
    pub ultra: T,
    pub high: T,
    pub medium: T,
    pub low: T,
}

impl<T> TierTable<T> {
    pub fn get(&self, tier: QualityTier) -> &T {
        match tier {
            QualityTier::Low => &self.low,
            QualityTier::Medium => &self.medium,
            QualityTier::High => &self.high,
            QualityTier::Ultra => &self.ultra,
        }
    }
}

impl Default for TierTable<QualityPreset> {
    fn default() -> Self {
        Self {
            ultra: QualityPreset::new(2.0, 1.0, 2048),
            high: QualityPreset::new(4.0, 1.0, 2048),
            medium: QualityPreset::new(8.0, 0.95, 1536),
            low: QualityPreset::new(16.0, 0.85, 1024),
        }
    }
}

/// Entry predicate of a tier: `rate >= min_fps && frame_time <= max_frame_time_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierThreshold {
    pub min_fps: f64,
    pub max_frame_time_ms: f64,
}

impl TierThreshold {
    /// Predicate that every measurement satisfies.
    pub const UNCONDITIONAL: TierThreshold = TierThreshold {
        min_fps: 0.0,
        max_frame_time_ms: f64::INFINITY,
    };

    pub const fn new(min_fps: f64, max_frame_time_ms: f64) -> Self {
        Self {
            min_fps,
            max_frame_time_ms,
        }
    }

    pub fn admits(&self, fps: f64, frame_time_ms: f64) -> bool {
        fps >= self.min_fps && frame_time_ms <= self.max_frame_time_ms
    }
}

/// Entry predicates for the tiers above low.
///
/// Low has no entry predicate: it is the fallback when nothing else matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierThresholds {
    pub ultra: TierThreshold,
    pub high: TierThreshold,
    pub medium: TierThreshold,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            ultra: TierThreshold::new(58.0, 17.0),
            high: TierThreshold::new(52.0, 19.0),
            medium: TierThreshold::new(45.0, 22.0),
        }
    }
}

impl TierThresholds {
    pub fn threshold(&self, tier: QualityTier) -> TierThreshold {
        match tier {
            QualityTier::Ultra => self.ultra,
            QualityTier::High => self.high,
            QualityTier::Medium => self.medium,
            QualityTier::Low => TierThreshold::UNCONDITIONAL,
        }
    }

    /// Highest tier whose predicate holds for the smoothed measurements.
    ///
    /// Tiers are tried from ultra down and the first match wins, so a looser
    /// tier is never chosen when a stricter one qualifies.
    pub fn classify(&self, fps: f64, frame_time_ms: f64) -> QualityTier {
        QualityTier::ALL
            .iter()
            .rev()
            .copied()
            .find(|tier| self.threshold(*tier).admits(fps, frame_time_ms))
            .unwrap_or(QualityTier::Low)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_tier_ordering() {
        assert!(QualityTier::Ultra > QualityTier::High);
        assert!(QualityTier::High > QualityTier::Medium);
        assert!(QualityTier::Medium > QualityTier::Low);
        assert!(QualityTier::High.is_above(QualityTier::Medium));
        assert!(!QualityTier::Low.is_above(QualityTier::Low));
    }

    #[test]
    fn test_cycle_wraps_to_low() {
        assert_eq!(QualityTier::Low.next_cyclic(), QualityTier::Medium);
        assert_eq!(QualityTier::Medium.next_cyclic(), QualityTier::High);
        assert_eq!(QualityTier::High.next_cyclic(), QualityTier::Ultra);
        assert_eq!(QualityTier::Ultra.next_cyclic(), QualityTier::Low);
    }

    #[test]
    fn test_parse_tier() {
        assert_eq!("ultra".parse::<QualityTier>().unwrap(), QualityTier::Ultra);
        assert_eq!("HIGH".parse::<QualityTier>().unwrap(), QualityTier::High);
        assert_eq!("med".parse::<QualityTier>().unwrap(), QualityTier::Medium);
        assert_eq!(" low ".parse::<QualityTier>().unwrap(), QualityTier::Low);
        assert!("extreme".parse::<QualityTier>().is_err());
    }

    #[test]
    fn test_tier_serializes_lowercase() {
        let json = serde_json::to_string(&QualityTier::Medium).unwrap();
        assert_eq!(json, "\"medium\"");
        let parsed: QualityTier = serde_json::from_str("\"ultra\"").unwrap();
        assert_eq!(parsed, QualityTier::Ultra);
    }

    #[test]
    fn test_default_presets() {
        let presets = TierTable::<QualityPreset>::default();
        assert_eq!(*presets.get(QualityTier::Ultra), QualityPreset::new(2.0, 1.0, 2048));
        assert_eq!(*presets.get(QualityTier::High), QualityPreset::new(4.0, 1.0, 2048));
        assert_eq!(*presets.get(QualityTier::Medium), QualityPreset::new(8.0, 0.95, 1536));
        assert_eq!(*presets.get(QualityTier::Low), QualityPreset::new(16.0, 0.85, 1024));
    }

    #[test]
    fn test_classify_scenarios() {
        let thresholds = TierThresholds::default();
        assert_eq!(thresholds.classify(60.0, 15.0), QualityTier::Ultra);
        assert_eq!(thresholds.classify(50.0, 20.0), QualityTier::Medium);
        assert_eq!(thresholds.classify(10.0, 40.0), QualityTier::Low);
    }

    #[test]
    fn test_classify_boundaries_are_inclusive() {
        let thresholds = TierThresholds::default();
        assert_eq!(thresholds.classify(58.0, 17.0), QualityTier::Ultra);
        assert_eq!(thresholds.classify(52.0, 19.0), QualityTier::High);
        assert_eq!(thresholds.classify(45.0, 22.0), QualityTier::Medium);
        // A high rate with a slow frame time falls through to the tier the frame time allows
        assert_eq!(thresholds.classify(70.0, 21.0), QualityTier::Medium);
    }

    #[test]
    fn test_classify_nan_falls_back_to_low() {
        let thresholds = TierThresholds::default();
        assert_eq!(thresholds.classify(f64::NAN, 15.0), QualityTier::Low);
    }

    proptest! {
        #[test]
        fn prop_classify_returns_highest_admitting_tier(
            fps in 0.0f64..=120.0f64,
            frame_time in 0.0f64..=60.0f64,
        ) {
            let thresholds = TierThresholds::default();
            let tier = thresholds.classify(fps, frame_time);

            prop_assert!(thresholds.threshold(tier).admits(fps, frame_time));
            for higher in QualityTier::ALL.iter().filter(|t| t.is_above(tier)) {
                prop_assert!(
                    !thresholds.threshold(*higher).admits(fps, frame_time),
                    "{} admits ({}, {}) but {} was chosen", higher, fps, frame_time, tier
                );
            }
        }

        #[test]
        fn prop_classify_is_monotonic(
            fps in 0.0f64..=120.0f64,
            frame_time in 0.0f64..=60.0f64,
            fps_gain in 0.0f64..=30.0f64,
            frame_time_gain in 0.0f64..=30.0f64,
        ) {
            let thresholds = TierThresholds::default();
            let base = thresholds.classify(fps, frame_time);
            let better = thresholds.classify(fps + fps_gain, (frame_time - frame_time_gain).max(0.0));
            prop_assert!(better >= base, "({}, {}) -> {} but better input -> {}", fps, frame_time, base, better);
        }
    }
}
