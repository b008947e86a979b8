//! Counters for the quality controller.
//!
//! Tracks decision cycles, tier transitions and fine-tune writes so the
//! status surface can show how often the controller acts.

use crate::gate::ChangeCause;
use crate::tier::QualityTier;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Number of tier dwell durations kept for the average.
const DWELL_HISTORY: usize = 100;

/// Metrics snapshot exposed via `status` and IPC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsResponse {
    /// Smoothing cycles that ran to classification
    pub decision_cycles: u64,
    /// Cycles skipped because no rate had been reported yet
    pub cold_start_skips: u64,
    pub upgrades: u64,
    pub downgrades: u64,
    /// Cycles where a downgrade was held back by the dwell time
    pub deferred_downgrades: u64,
    pub manual_changes: u64,
    /// Cycles that wrote at least one fine-tuned knob
    pub fine_tune_writes: u64,
    /// Average time a tier stayed active before the next change (seconds)
    pub avg_tier_dwell_sec: f64,
}

#[derive(Debug, Default)]
pub struct QualityMetrics {
    decision_cycles: u64,
    cold_start_skips: u64,
    upgrades: u64,
    downgrades: u64,
    deferred_downgrades: u64,
    manual_changes: u64,
    fine_tune_writes: u64,
    dwell_durations: VecDeque<Duration>,
    last_transition: Option<Instant>,
}

impl QualityMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cycle(&mut self) {
        self.decision_cycles += 1;
    }

    pub fn record_cold_start_skip(&mut self) {
        self.cold_start_skips += 1;
    }

    pub fn record_deferred_downgrade(&mut self) {
        self.deferred_downgrades += 1;
    }

    pub fn record_fine_tune(&mut self) {
        self.fine_tune_writes += 1;
    }

    /// Start timing the tier applied without a transition (the initial preset).
    pub fn start_dwell(&mut self, now: Instant) {
        self.last_transition = Some(now);
    }

    /// Record a tier being applied at `now`.
    pub fn record_transition(&mut self, from: QualityTier, to: QualityTier, cause: ChangeCause, now: Instant) {
        match cause {
            ChangeCause::Upgrade => self.upgrades += 1,
            ChangeCause::Downgrade => self.downgrades += 1,
            ChangeCause::Manual => self.manual_changes += 1,
        }

        if let Some(last) = self.last_transition {
            if from != to {
                self.dwell_durations
                    .push_back(now.saturating_duration_since(last));
                if self.dwell_durations.len() > DWELL_HISTORY {
                    self.dwell_durations.pop_front();
                }
            }
        }
        self.last_transition = Some(now);
    }

    pub fn snapshot(&self) -> MetricsResponse {
        let avg_tier_dwell_sec = if self.dwell_durations.is_empty() {
            0.0
        } else {
            let total: Duration = self.dwell_durations.iter().sum();
            total.as_secs_f64() / self.dwell_durations.len() as f64
        };

        MetricsResponse {
            decision_cycles: self.decision_cycles,
            cold_start_skips: self.cold_start_skips,
            upgrades: self.upgrades,
            downgrades: self.downgrades,
            deferred_downgrades: self.deferred_downgrades,
            manual_changes: self.manual_changes,
            fine_tune_writes: self.fine_tune_writes,
            avg_tier_dwell_sec,
        }
    }
}
