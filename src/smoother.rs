//! Exponential smoothing of the window averages and the decision cadence.

use std::time::{Duration, Instant};

/// Two exponentially weighted averages, frame rate and frame duration.
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialSmoother {
    /// Weight of the newest window average, in (0, 1]
    alpha: f64,
    rate: f64,
    frame_time_ms: f64,
}

impl ExponentialSmoother {
    /// Start both averages at their target values.
    pub fn new(alpha: f64, initial_rate: f64, initial_frame_time_ms: f64) -> Self {
        Self {
            alpha,
            rate: initial_rate,
            frame_time_ms: initial_frame_time_ms,
        }
    }

    /// Fold one pair of window averages into the running averages.
    pub fn update(&mut self, window_rate: f64, window_frame_time_ms: f64) {
        self.rate = self.alpha * window_rate + (1.0 - self.alpha) * self.rate;
        self.frame_time_ms =
            self.alpha * window_frame_time_ms + (1.0 - self.alpha) * self.frame_time_ms;
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn frame_time_ms(&self) -> f64 {
        self.frame_time_ms
    }
}

/// Throttles the controller to one decision per `interval`, whatever the
/// render tick rate is.
#[derive(Debug, Clone)]
pub struct CheckTimer {
    interval: Duration,
    last_check: Option<Instant>,
}

impl CheckTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_check: None,
        }
    }

    /// Returns true and restarts the period when `interval` has elapsed
    /// since the last firing. The first call always fires.
    pub fn fire(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_check {
            if now.saturating_duration_since(last) < self.interval {
                return false;
            }
        }
        self.last_check = Some(now);
        true
    }

    pub fn last_check(&self) -> Option<Instant> {
        self.last_check
    }
}
