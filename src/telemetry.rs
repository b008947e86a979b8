//! Frame telemetry sampler.
//!
//! Turns two external clocks into the controller's input signals: the render
//! loop reports every finished frame, and a coarse timer (one second by
//! default) asks for the instantaneous frame rate over the elapsed period.

use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Smallest elapsed time used when computing a rate, in seconds.
pub const MIN_ELAPSED_SECS: f64 = 1e-6;

/// Display band of an instantaneous frame rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FpsBand {
    /// 60 fps and above
    Good,
    /// 45 fps and above
    Fair,
    Poor,
}

impl FpsBand {
    pub fn from_fps(fps: f64) -> Self {
        if fps >= 60.0 {
            FpsBand::Good
        } else if fps >= 45.0 {
            FpsBand::Fair
        } else {
            FpsBand::Poor
        }
    }
}

/// Counts frames and measures frame durations.
#[derive(Debug)]
pub struct FrameTelemetry {
    /// Frames rendered since the last report
    frame_count: u64,
    /// When the last report was taken
    last_report: Instant,
    /// When the previous frame finished
    last_frame: Instant,
    /// Rate computed by the last report
    current_fps: f64,
    /// Duration of the last frame in milliseconds
    current_frame_time_ms: f64,
    min_elapsed_secs: f64,
}

impl FrameTelemetry {
    /// Start sampling at `now`.
    pub fn new(now: Instant, min_elapsed_secs: f64) -> Self {
        Self {
            frame_count: 0,
            last_report: now,
            last_frame: now,
            current_fps: 0.0,
            current_frame_time_ms: 0.0,
            min_elapsed_secs: min_elapsed_secs.max(f64::MIN_POSITIVE),
        }
    }

    /// Record a rendered frame and return its duration in milliseconds.
    pub fn on_frame_rendered(&mut self, now: Instant) -> f64 {
        self.frame_count += 1;
        self.current_frame_time_ms =
            now.saturating_duration_since(self.last_frame).as_secs_f64() * 1000.0;
        self.last_frame = now;
        self.current_frame_time_ms
    }

    /// Close the current reporting period and return its frame rate.
    ///
    /// The rate is rounded to whole frames per second and the frame counter
    /// is reset.
    pub fn report(&mut self, now: Instant) -> f64 {
        let elapsed = now
            .saturating_duration_since(self.last_report)
            .as_secs_f64()
            .max(self.min_elapsed_secs);
        self.current_fps = (self.frame_count as f64 / elapsed).round();
        self.frame_count = 0;
        self.last_report = now;
        self.current_fps
    }

    pub fn current_fps(&self) -> f64 {
        self.current_fps
    }

    pub fn current_frame_time_ms(&self) -> f64 {
        self.current_frame_time_ms
    }

    /// Frames counted since the last report.
    pub fn pending_frames(&self) -> u64 {
        self.frame_count
    }
}
