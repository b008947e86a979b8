//! Time-windowed sample storage for frame telemetry.
//!
//! Unlike a fixed-capacity ring buffer, a [`SlidingWindow`] is bounded by
//! age: every push evicts the samples older than the window span measured
//! from the new sample's timestamp.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Default span of the telemetry windows.
pub const DEFAULT_WINDOW_SPAN: Duration = Duration::from_millis(5000);

/// Samples that carry the instant they were taken.
pub trait Timestamped {
    fn timestamp(&self) -> Instant;
}

/// Instantaneous frame rate reported by the one-second clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSample {
    pub timestamp: Instant,
    pub fps: f64,
}

impl Timestamped for FrameSample {
    fn timestamp(&self) -> Instant {
        self.timestamp
    }
}

/// Duration of a single rendered frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTimeSample {
    pub timestamp: Instant,
    pub duration_ms: f64,
}

impl Timestamped for FrameTimeSample {
    fn timestamp(&self) -> Instant {
        self.timestamp
    }
}

/// Time-ordered samples covering the most recent `span`.
#[derive(Debug)]
pub struct SlidingWindow<T> {
    samples: VecDeque<T>,
    span: Duration,
}

impl<T: Timestamped> SlidingWindow<T> {
    pub fn new(span: Duration) -> Self {
        Self {
            samples: VecDeque::new(),
            span,
        }
    }

    /// Append a sample and drop everything older than `sample.timestamp - span`.
    pub fn push(&mut self, sample: T) {
        let now = sample.timestamp();
        self.samples.push_back(sample);
        self.evict_before(now);
    }

    fn evict_before(&mut self, now: Instant) {
        // Near process start the cutoff may not be representable; nothing can be older then.
        let Some(cutoff) = now.checked_sub(self.span) else {
            return;
        };
        while self
            .samples
            .front()
            .is_some_and(|s| s.timestamp() < cutoff)
        {
            self.samples.pop_front();
        }
    }

    /// Arithmetic mean of `value` over the retained samples, `None` when empty.
    pub fn mean_by(&self, value: impl Fn(&T) -> f64) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: f64 = self.samples.iter().map(value).sum();
        Some(sum / self.samples.len() as f64)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.samples.iter()
    }
}

/// Rate and frame-time windows fed by the telemetry sampler.
#[derive(Debug)]
pub struct SampleAggregator {
    rates: SlidingWindow<FrameSample>,
    frame_times: SlidingWindow<FrameTimeSample>,
}

impl SampleAggregator {
    pub fn new(span: Duration) -> Self {
        Self {
            rates: SlidingWindow::new(span),
            frame_times: SlidingWindow::new(span),
        }
    }

    pub fn push_rate(&mut self, now: Instant, fps: f64) {
        self.rates.push(FrameSample { timestamp: now, fps });
    }

    pub fn push_frame_time(&mut self, now: Instant, duration_ms: f64) {
        self.frame_times.push(FrameTimeSample {
            timestamp: now,
            duration_ms,
        });
    }

    /// Mean reported rate, or `fallback` (the last smoothed rate) on cold start.
    pub fn average_rate_or(&self, fallback: f64) -> f64 {
        self.rates.mean_by(|s| s.fps).unwrap_or(fallback)
    }

    /// Mean frame duration, or `fallback` (the last smoothed duration) on cold start.
    pub fn average_frame_time_or(&self, fallback: f64) -> f64 {
        self.frame_times
            .mean_by(|s| s.duration_ms)
            .unwrap_or(fallback)
    }

    pub fn has_rate_samples(&self) -> bool {
        !self.rates.is_empty()
    }

    pub fn rates(&self) -> &SlidingWindow<FrameSample> {
        &self.rates
    }

    pub fn frame_times(&self) -> &SlidingWindow<FrameTimeSample> {
        &self.frame_times
    }
}
