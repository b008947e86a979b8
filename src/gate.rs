//! Hysteresis gate for tier transitions.
//!
//! Upgrades are applied as soon as they are classified. Downgrades wait until
//! the current tier has been active for the dwell time, which keeps a
//! borderline frame rate from flapping between two tiers.

use crate::tier::QualityTier;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Why a tier was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeCause {
    Upgrade,
    Downgrade,
    Manual,
}

/// Outcome of gating one classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Classified tier equals the current one
    Hold,
    /// Switch to the tier now
    Apply { to: QualityTier, cause: ChangeCause },
    /// Downgrade blocked until the dwell time has passed
    Defer { to: QualityTier, remaining: Duration },
}

#[derive(Debug, Clone)]
pub struct TransitionGate {
    dwell: Duration,
}

impl TransitionGate {
    pub fn new(dwell: Duration) -> Self {
        Self { dwell }
    }

    pub fn evaluate(
        &self,
        current: QualityTier,
        classified: QualityTier,
        last_change: Option<Instant>,
        now: Instant,
    ) -> GateDecision {
        if classified == current {
            return GateDecision::Hold;
        }

        if classified.is_above(current) {
            return GateDecision::Apply {
                to: classified,
                cause: ChangeCause::Upgrade,
            };
        }

        let dwelled = last_change
            .map(|last| now.saturating_duration_since(last))
            .unwrap_or(Duration::MAX);
        if dwelled >= self.dwell {
            GateDecision::Apply {
                to: classified,
                cause: ChangeCause::Downgrade,
            }
        } else {
            GateDecision::Defer {
                to: classified,
                remaining: self.dwell - dwelled,
            }
        }
    }
}
