//! Renderer seam of the quality controller.
//!
//! The controller never talks to a graphics API directly. It writes knobs
//! through two handles: the tileset (detail error threshold and memory
//! budget) and the view (resolution scale). The daemon plugs in a simulated
//! scene whose frame cost follows the knobs, so the loop can be exercised
//! without a GPU.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Writable tileset knobs and the memory they currently use.
pub trait TilesetHandle {
    fn detail_error_threshold(&self) -> f64;
    fn set_detail_error_threshold(&mut self, value: f64);
    fn memory_budget_mb(&self) -> u32;
    fn set_memory_budget_mb(&mut self, value: u32);
    /// GPU memory currently held by loaded tiles, in megabytes.
    fn memory_usage_mb(&self) -> f64;
}

/// Writable view knobs.
pub trait ViewHandle {
    fn resolution_scale(&self) -> f64;
    fn set_resolution_scale(&mut self, value: f64);
}

/// Memory pressure relative to the tile cache budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryPressure {
    /// Below 70% of the budget
    Normal,
    /// Below 90% of the budget
    Elevated,
    Critical,
}

impl MemoryPressure {
    pub fn from_usage(used_mb: f64, budget_mb: u32) -> Self {
        if budget_mb == 0 {
            return MemoryPressure::Critical;
        }
        let pct = used_mb / budget_mb as f64 * 100.0;
        if pct < 70.0 {
            MemoryPressure::Normal
        } else if pct < 90.0 {
            MemoryPressure::Elevated
        } else {
            MemoryPressure::Critical
        }
    }
}

/// Parameters of the simulated scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Frame cost at full resolution and the reference threshold
    pub base_frame_ms: f64,
    /// Detail error threshold at which `base_frame_ms` and `working_set_mb` hold
    pub reference_threshold: f64,
    /// Tile memory wanted at the reference threshold
    pub working_set_mb: f64,
    /// Cheapest possible frame
    pub min_frame_ms: f64,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            base_frame_ms: 14.0,
            reference_threshold: 4.0,
            working_set_mb: 1800.0,
            min_frame_ms: 1.0,
        }
    }
}

/// Simulated tileset: finer detail wants more tiles, capped by the budget.
#[derive(Debug, Clone)]
pub struct SceneTileset {
    detail_error_threshold: f64,
    memory_budget_mb: u32,
    reference_threshold: f64,
    working_set_mb: f64,
}

impl SceneTileset {
    pub fn new(config: &SceneConfig) -> Self {
        Self {
            detail_error_threshold: config.reference_threshold,
            memory_budget_mb: 0,
            reference_threshold: config.reference_threshold,
            working_set_mb: config.working_set_mb,
        }
    }
}

impl TilesetHandle for SceneTileset {
    fn detail_error_threshold(&self) -> f64 {
        self.detail_error_threshold
    }

    fn set_detail_error_threshold(&mut self, value: f64) {
        self.detail_error_threshold = value;
    }

    fn memory_budget_mb(&self) -> u32 {
        self.memory_budget_mb
    }

    fn set_memory_budget_mb(&mut self, value: u32) {
        self.memory_budget_mb = value;
    }

    fn memory_usage_mb(&self) -> f64 {
        let wanted = self.working_set_mb * self.reference_threshold
            / self.detail_error_threshold.max(f64::EPSILON);
        wanted.min(self.memory_budget_mb as f64)
    }
}

/// Simulated view holding the resolution scale.
#[derive(Debug, Clone)]
pub struct SceneView {
    resolution_scale: f64,
}

impl SceneView {
    pub fn new() -> Self {
        Self {
            resolution_scale: 1.0,
        }
    }
}

impl Default for SceneView {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewHandle for SceneView {
    fn resolution_scale(&self) -> f64 {
        self.resolution_scale
    }

    fn set_resolution_scale(&mut self, value: f64) {
        self.resolution_scale = value;
    }
}

/// Frame cost of the simulated scene for the given knobs.
///
/// Cost grows with the pixel count (scale squared) and with the square root
/// of the detail ratio against the reference threshold.
pub fn simulated_frame_cost(config: &SceneConfig, threshold: f64, scale: f64) -> Duration {
    let detail = (config.reference_threshold / threshold.max(f64::EPSILON)).sqrt();
    let ms = (config.base_frame_ms * scale * scale * detail).max(config.min_frame_ms);
    Duration::from_secs_f64(ms / 1000.0)
}
