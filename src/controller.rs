//! Adaptive quality controller.
//!
//! This module owns the closed loop that keeps the globe viewer near its
//! target frame rate: telemetry is aggregated into sliding windows, smoothed
//! at a fixed decision cadence, classified into a tier, and either applied
//! through the hysteresis gate or used to fine-tune the continuous knobs.

use crate::config::{AdaptiveConfig, TelemetryConfig};
use crate::gate::{ChangeCause, GateDecision, TransitionGate};
use crate::metrics::{MetricsResponse, QualityMetrics};
use crate::renderer::{MemoryPressure, TilesetHandle, ViewHandle};
use crate::smoother::{CheckTimer, ExponentialSmoother};
use crate::telemetry::{FpsBand, FrameTelemetry};
use crate::tier::{QualityPreset, QualityTier, TierTable, TierThresholds};
use crate::tuner::FineTuner;
use crate::window::SampleAggregator;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Something the controller did that the UI collaborator may want to show.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QualityEvent {
    /// A tier preset was written to the renderer.
    TierChanged {
        from: QualityTier,
        to: QualityTier,
        cause: ChangeCause,
    },
    /// A downgrade was classified but the current tier has not dwelled long enough.
    DowngradeDeferred {
        to: QualityTier,
        remaining: Duration,
    },
    /// The continuous knobs were nudged within the current tier.
    KnobsTuned {
        detail_error_threshold: Option<f64>,
        resolution_scale: Option<f64>,
    },
}

/// Snapshot of the controller for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityStatus {
    pub tier: QualityTier,
    pub manual: bool,
    pub enabled: bool,
    pub bound: bool,
    pub current_fps: f64,
    pub fps_band: FpsBand,
    pub frame_time_ms: f64,
    pub smoothed_fps: f64,
    pub smoothed_frame_time_ms: f64,
    pub detail_error_threshold: Option<f64>,
    pub resolution_scale: Option<f64>,
    pub memory_budget_mb: Option<u32>,
    pub memory_usage_mb: Option<f64>,
    pub memory_pressure: Option<MemoryPressure>,
}

/// Closed-loop quality controller bound to a tileset and a view.
///
/// All inputs arrive as method calls with an explicit `now`, so the two
/// external clocks (render tick and rate report timer) stay independent and
/// the whole loop is deterministic under test.
pub struct QualityController<T, V> {
    enabled: bool,
    presets: TierTable<QualityPreset>,
    thresholds: TierThresholds,
    initial_tier: QualityTier,
    pressure_budget_mb: u32,
    tileset: Option<T>,
    view: Option<V>,
    telemetry: FrameTelemetry,
    aggregator: SampleAggregator,
    smoother: ExponentialSmoother,
    check: CheckTimer,
    gate: TransitionGate,
    tuner: FineTuner,
    current_tier: QualityTier,
    manual_override: bool,
    last_tier_change: Option<Instant>,
    metrics: QualityMetrics,
}

impl<T: TilesetHandle, V: ViewHandle> QualityController<T, V> {
    /// Create an unbound controller in auto mode. Telemetry starts at `now`.
    pub fn new(adaptive: &AdaptiveConfig, telemetry: &TelemetryConfig, now: Instant) -> Self {
        Self {
            enabled: adaptive.enabled,
            presets: adaptive.presets.clone(),
            thresholds: adaptive.thresholds.clone(),
            initial_tier: adaptive.initial_tier,
            pressure_budget_mb: adaptive.pressure_budget_mb,
            tileset: None,
            view: None,
            telemetry: FrameTelemetry::new(now, telemetry.min_elapsed_secs),
            aggregator: SampleAggregator::new(telemetry.window()),
            smoother: ExponentialSmoother::new(
                adaptive.ema_alpha,
                adaptive.target_fps,
                adaptive.target_frame_time_ms,
            ),
            check: CheckTimer::new(adaptive.check_interval()),
            gate: TransitionGate::new(adaptive.hysteresis_time()),
            tuner: FineTuner::new(
                adaptive.tuning.clone(),
                adaptive.target_fps,
                adaptive.hysteresis_fps,
            ),
            current_tier: adaptive.initial_tier,
            manual_override: false,
            last_tier_change: None,
            metrics: QualityMetrics::new(),
        }
    }

    /// Attach the renderer handles and apply the initial tier's preset.
    pub fn bind(&mut self, tileset: T, view: V, now: Instant) {
        self.tileset = Some(tileset);
        self.view = Some(view);
        self.apply_tier(self.initial_tier, now);
        self.metrics.start_dwell(now);
        info!(tier = %self.initial_tier, "Renderer bound, initial quality applied");
    }

    pub fn is_bound(&self) -> bool {
        self.tileset.is_some() && self.view.is_some()
    }

    /// Render-loop notification: one frame finished at `now`.
    /// Returns the frame duration in milliseconds.
    pub fn on_frame_rendered(&mut self, now: Instant) -> f64 {
        let duration_ms = self.telemetry.on_frame_rendered(now);
        self.aggregator.push_frame_time(now, duration_ms);
        duration_ms
    }

    /// Report-timer notification: close the rate period at `now`.
    /// Returns the instantaneous frame rate.
    pub fn on_report_tick(&mut self, now: Instant) -> f64 {
        let fps = self.telemetry.report(now);
        self.aggregator.push_rate(now, fps);
        fps
    }

    /// Run one decision cycle if it is due.
    ///
    /// Called every render tick; does nothing while disabled, unbound or in
    /// manual mode, and otherwise only once per check interval.
    pub fn update(&mut self, now: Instant) -> Option<QualityEvent> {
        if !self.enabled || !self.is_bound() || self.manual_override {
            return None;
        }

        if !self.check.fire(now) {
            return None;
        }

        if !self.aggregator.has_rate_samples() {
            self.metrics.record_cold_start_skip();
            return None;
        }
        self.metrics.record_cycle();

        let window_rate = self.aggregator.average_rate_or(self.smoother.rate());
        let window_frame_time = self
            .aggregator
            .average_frame_time_or(self.smoother.frame_time_ms());
        self.smoother.update(window_rate, window_frame_time);

        let classified = self
            .thresholds
            .classify(self.smoother.rate(), self.smoother.frame_time_ms());

        match self
            .gate
            .evaluate(self.current_tier, classified, self.last_tier_change, now)
        {
            GateDecision::Hold => self.fine_tune(),
            GateDecision::Apply { to, cause } => {
                let from = self.current_tier;
                self.apply_tier(to, now);
                self.metrics.record_transition(from, to, cause, now);
                info!(
                    from = %from,
                    to = %to,
                    smoothed_fps = self.smoother.rate(),
                    smoothed_frame_time_ms = self.smoother.frame_time_ms(),
                    "Quality {:?}",
                    cause
                );
                Some(QualityEvent::TierChanged { from, to, cause })
            }
            GateDecision::Defer { to, remaining } => {
                self.metrics.record_deferred_downgrade();
                debug!(
                    current = %self.current_tier,
                    to = %to,
                    remaining_ms = remaining.as_millis() as u64,
                    "Downgrade deferred"
                );
                Some(QualityEvent::DowngradeDeferred { to, remaining })
            }
        }
    }

    fn fine_tune(&mut self) -> Option<QualityEvent> {
        let (tileset, view) = self.tileset.as_mut().zip(self.view.as_mut())?;

        let adjustment = self.tuner.adjust(
            self.smoother.rate(),
            tileset.detail_error_threshold(),
            view.resolution_scale(),
        );
        if adjustment.is_empty() {
            return None;
        }

        if let Some(threshold) = adjustment.detail_error_threshold {
            tileset.set_detail_error_threshold(threshold);
        }
        if let Some(scale) = adjustment.resolution_scale {
            view.set_resolution_scale(scale);
        }
        self.metrics.record_fine_tune();
        debug!(
            threshold = ?adjustment.detail_error_threshold,
            scale = ?adjustment.resolution_scale,
            smoothed_fps = self.smoother.rate(),
            "Knobs fine-tuned"
        );

        Some(QualityEvent::KnobsTuned {
            detail_error_threshold: adjustment.detail_error_threshold,
            resolution_scale: adjustment.resolution_scale,
        })
    }

    /// Write `tier`'s preset to the renderer and make it current.
    /// Does nothing while unbound.
    fn apply_tier(&mut self, tier: QualityTier, now: Instant) -> bool {
        let (Some(tileset), Some(view)) = (self.tileset.as_mut(), self.view.as_mut()) else {
            return false;
        };

        let preset = self.presets.get(tier);
        tileset.set_detail_error_threshold(preset.detail_error_threshold);
        view.set_resolution_scale(preset.resolution_scale);
        tileset.set_memory_budget_mb(preset.memory_budget_mb);

        self.current_tier = tier;
        self.last_tier_change = Some(now);
        true
    }

    /// Input command: apply `tier` now and suspend automatic control.
    pub fn set_tier(&mut self, tier: QualityTier, now: Instant) -> Option<QualityEvent> {
        self.manual_override = true;
        let from = self.current_tier;
        if !self.apply_tier(tier, now) {
            return None;
        }
        self.metrics
            .record_transition(from, tier, ChangeCause::Manual, now);
        info!(from = %from, to = %tier, "Quality set manually");
        Some(QualityEvent::TierChanged {
            from,
            to: tier,
            cause: ChangeCause::Manual,
        })
    }

    /// Input command: step to the next tier (wrapping) in manual mode.
    pub fn cycle_tier(&mut self, now: Instant) -> Option<QualityEvent> {
        self.set_tier(self.current_tier.next_cyclic(), now)
    }

    /// Input command: resume automatic control.
    ///
    /// Knobs are left as they are; the next due cycle classifies afresh.
    pub fn enable_auto(&mut self) {
        self.manual_override = false;
        info!(tier = %self.current_tier, "Adaptive quality: auto enabled");
    }

    pub fn current_tier(&self) -> QualityTier {
        self.current_tier
    }

    pub fn is_manual(&self) -> bool {
        self.manual_override
    }

    pub fn last_tier_change(&self) -> Option<Instant> {
        self.last_tier_change
    }

    pub fn smoothed_fps(&self) -> f64 {
        self.smoother.rate()
    }

    pub fn smoothed_frame_time_ms(&self) -> f64 {
        self.smoother.frame_time_ms()
    }

    pub fn tileset(&self) -> Option<&T> {
        self.tileset.as_ref()
    }

    pub fn view(&self) -> Option<&V> {
        self.view.as_ref()
    }

    pub fn metrics(&self) -> MetricsResponse {
        self.metrics.snapshot()
    }

    pub fn status(&self) -> QualityStatus {
        let current_fps = self.telemetry.current_fps();
        let memory_budget_mb = self.tileset.as_ref().map(|t| t.memory_budget_mb());
        let memory_usage_mb = self.tileset.as_ref().map(|t| t.memory_usage_mb());

        QualityStatus {
            tier: self.current_tier,
            manual: self.manual_override,
            enabled: self.enabled,
            bound: self.is_bound(),
            current_fps,
            fps_band: FpsBand::from_fps(current_fps),
            frame_time_ms: self.telemetry.current_frame_time_ms(),
            smoothed_fps: self.smoother.rate(),
            smoothed_frame_time_ms: self.smoother.frame_time_ms(),
            detail_error_threshold: self.tileset.as_ref().map(|t| t.detail_error_threshold()),
            resolution_scale: self.view.as_ref().map(|v| v.resolution_scale()),
            memory_budget_mb,
            memory_usage_mb,
            memory_pressure: memory_usage_mb
                .map(|used| MemoryPressure::from_usage(used, self.pressure_budget_mb)),
        }
    }
}
