//! Continuous fine-tuning of the detail error threshold and resolution scale
//! while the tier is stable.

use serde::{Deserialize, Serialize};

/// Step sizes, clamps and coupling constants of the fine-tuner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FineTuneConfig {
    pub threshold_step: f64,
    pub min_threshold: f64,
    pub max_threshold: f64,
    pub scale_step: f64,
    pub min_scale: f64,
    pub max_scale: f64,
    /// Resolution is lowered only once the threshold is above this value.
    pub scale_down_above_threshold: f64,
    /// Resolution is raised only while the threshold is below this value.
    pub scale_up_below_threshold: f64,
    /// Smallest change worth writing to the renderer.
    pub epsilon: f64,
}

impl Default for FineTuneConfig {
    fn default() -> Self {
        Self {
            threshold_step: 0.5,
            min_threshold: 1.5,
            max_threshold: 20.0,
            scale_step: 0.05,
            min_scale: 0.7,
            max_scale: 1.0,
            scale_down_above_threshold: 10.0,
            scale_up_below_threshold: 5.0,
            epsilon: 0.01,
        }
    }
}

/// New knob values to write; `None` leaves the knob untouched.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct KnobAdjustment {
    pub detail_error_threshold: Option<f64>,
    pub resolution_scale: Option<f64>,
}

impl KnobAdjustment {
    pub fn is_empty(&self) -> bool {
        self.detail_error_threshold.is_none() && self.resolution_scale.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct FineTuner {
    config: FineTuneConfig,
    target_fps: f64,
    /// Half-width of the dead band around `target_fps`
    hysteresis_fps: f64,
}

impl FineTuner {
    pub fn new(config: FineTuneConfig, target_fps: f64, hysteresis_fps: f64) -> Self {
        Self {
            config,
            target_fps,
            hysteresis_fps,
        }
    }

    /// Compute the knob changes for one stable-tier cycle.
    ///
    /// `threshold` and `scale` are the values currently set on the renderer.
    pub fn adjust(&self, smoothed_fps: f64, threshold: f64, scale: f64) -> KnobAdjustment {
        let cfg = &self.config;
        let delta = self.target_fps - smoothed_fps;
        if delta.abs() < self.hysteresis_fps {
            return KnobAdjustment::default();
        }

        let mut new_threshold = threshold;
        let mut new_scale = scale;

        if smoothed_fps < self.target_fps - self.hysteresis_fps {
            new_threshold = (threshold + cfg.threshold_step).clamp(cfg.min_threshold, cfg.max_threshold);
            if threshold > cfg.scale_down_above_threshold {
                new_scale = (scale - cfg.scale_step).clamp(cfg.min_scale, cfg.max_scale);
            }
        } else if smoothed_fps > self.target_fps + self.hysteresis_fps {
            new_threshold = (threshold - cfg.threshold_step).clamp(cfg.min_threshold, cfg.max_threshold);
            if threshold < cfg.scale_up_below_threshold && scale < cfg.max_scale {
                new_scale = (scale + cfg.scale_step).clamp(cfg.min_scale, cfg.max_scale);
            }
        }

        KnobAdjustment {
            detail_error_threshold: ((new_threshold - threshold).abs() >= cfg.epsilon)
                .then_some(new_threshold),
            resolution_scale: ((new_scale - scale).abs() >= cfg.epsilon).then_some(new_scale),
        }
    }
}
