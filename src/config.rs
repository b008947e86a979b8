//! Configuration module for the quality controller and its daemon.
//!
//! All values are read once at startup. The file is JSON; missing sections
//! and fields take their defaults.

use crate::error::ConfigError;
use crate::renderer::SceneConfig;
use crate::telemetry::MIN_ELAPSED_SECS;
use crate::tier::{QualityPreset, QualityTier, TierTable, TierThresholds};
use crate::tuner::FineTuneConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default socket path for IPC communication.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/globe-quality.sock";

/// Adaptive controller settings.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AdaptiveConfig {
    /// Master switch for automatic tier selection
    pub enabled: bool,
    pub target_fps: f64,
    pub target_frame_time_ms: f64,
    /// Minimum time between two decision cycles
    pub check_interval_ms: u64,
    /// Weight of the newest window average in the smoothed signals
    pub ema_alpha: f64,
    /// Tier applied when the renderer handles are bound
    pub initial_tier: QualityTier,
    pub presets: TierTable<QualityPreset>,
    pub thresholds: TierThresholds,
    /// Half-width of the fine-tune dead band around `target_fps`
    pub hysteresis_fps: f64,
    /// Minimum dwell time of a tier before a downgrade
    pub hysteresis_time_ms: u64,
    pub tuning: FineTuneConfig,
    /// Fixed tileset budget the status memory pressure is measured against,
    /// independent of the budget the current tier sets
    pub pressure_budget_mb: u32,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            target_fps: 55.0,
            target_frame_time_ms: 18.0,
            check_interval_ms: 1500,
            ema_alpha: 0.3,
            initial_tier: QualityTier::High,
            presets: TierTable::default(),
            thresholds: TierThresholds::default(),
            hysteresis_fps: 3.0,
            hysteresis_time_ms: 3000,
            tuning: FineTuneConfig::default(),
            pressure_budget_mb: 2048,
        }
    }
}

impl AdaptiveConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    pub fn hysteresis_time(&self) -> Duration {
        Duration::from_millis(self.hysteresis_time_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.ema_alpha > 0.0 && self.ema_alpha <= 1.0) {
            return Err(invalid(format!(
                "ema_alpha ({}) must be in (0, 1]",
                self.ema_alpha
            )));
        }

        if !(self.target_fps > 0.0) || !(self.target_frame_time_ms > 0.0) {
            return Err(invalid(format!(
                "target_fps ({}) and target_frame_time_ms ({}) must be positive",
                self.target_fps, self.target_frame_time_ms
            )));
        }

        if self.check_interval_ms == 0 {
            return Err(invalid("check_interval_ms must be non-zero".to_string()));
        }

        if !(self.hysteresis_fps >= 0.0) {
            return Err(invalid(format!(
                "hysteresis_fps ({}) must not be negative",
                self.hysteresis_fps
            )));
        }

        let t = &self.thresholds;
        if !(t.ultra.min_fps >= t.high.min_fps
            && t.high.min_fps >= t.medium.min_fps
            && t.medium.min_fps >= 0.0)
        {
            return Err(invalid(
                "threshold min_fps must not increase from ultra to medium and must be >= 0"
                    .to_string(),
            ));
        }
        if !(t.ultra.max_frame_time_ms <= t.high.max_frame_time_ms
            && t.high.max_frame_time_ms <= t.medium.max_frame_time_ms)
        {
            return Err(invalid(
                "threshold max_frame_time_ms must not decrease from ultra to medium".to_string(),
            ));
        }

        for tier in QualityTier::ALL {
            let preset = self.presets.get(tier);
            if !(preset.detail_error_threshold > 0.0) {
                return Err(invalid(format!(
                    "{} preset detail_error_threshold must be positive",
                    tier
                )));
            }
            if !(preset.resolution_scale > 0.0 && preset.resolution_scale <= 1.0) {
                return Err(invalid(format!(
                    "{} preset resolution_scale ({}) must be in (0, 1]",
                    tier, preset.resolution_scale
                )));
            }
            if preset.memory_budget_mb == 0 {
                return Err(invalid(format!("{} preset memory_budget_mb must be non-zero", tier)));
            }
        }

        if self.pressure_budget_mb == 0 {
            return Err(invalid("pressure_budget_mb must be non-zero".to_string()));
        }

        let tuning = &self.tuning;
        if !(tuning.threshold_step > 0.0 && tuning.scale_step > 0.0 && tuning.epsilon >= 0.0) {
            return Err(invalid(
                "tuning steps must be positive and epsilon must not be negative".to_string(),
            ));
        }
        if !(tuning.min_threshold <= tuning.max_threshold) {
            return Err(invalid(format!(
                "tuning min_threshold ({}) cannot be greater than max_threshold ({})",
                tuning.min_threshold, tuning.max_threshold
            )));
        }
        if !(tuning.min_scale <= tuning.max_scale) {
            return Err(invalid(format!(
                "tuning min_scale ({}) cannot be greater than max_scale ({})",
                tuning.min_scale, tuning.max_scale
            )));
        }

        Ok(())
    }
}

/// Telemetry clock settings.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Period of the instantaneous rate report
    pub report_interval_ms: u64,
    /// Span of the rate and frame-time windows
    pub window_ms: u64,
    /// Floor for the elapsed time of a report, in seconds
    pub min_elapsed_secs: f64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            report_interval_ms: 1000,
            window_ms: 5000,
            min_elapsed_secs: MIN_ELAPSED_SECS,
        }
    }
}

impl TelemetryConfig {
    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms)
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.report_interval_ms == 0 || self.window_ms == 0 {
            return Err(invalid(
                "report_interval_ms and window_ms must be non-zero".to_string(),
            ));
        }
        if !(self.min_elapsed_secs > 0.0) {
            return Err(invalid(format!(
                "min_elapsed_secs ({}) must be positive",
                self.min_elapsed_secs
            )));
        }
        Ok(())
    }
}

/// Daemon configuration.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub adaptive: AdaptiveConfig,
    pub telemetry: TelemetryConfig,
    pub scene: SceneConfig,
    pub socket_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            adaptive: AdaptiveConfig::default(),
            telemetry: TelemetryConfig::default(),
            scene: SceneConfig::default(),
            socket_path: DEFAULT_SOCKET_PATH.to_string(),
        }
    }
}

impl Config {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.adaptive.validate()?;
        self.telemetry.validate()?;

        if !(self.scene.base_frame_ms > 0.0 && self.scene.reference_threshold > 0.0) {
            return Err(invalid(
                "scene base_frame_ms and reference_threshold must be positive".to_string(),
            ));
        }

        if self.socket_path.trim().is_empty() {
            return Err(invalid("socket_path must not be empty".to_string()));
        }

        Ok(())
    }
}

fn invalid(msg: String) -> ConfigError {
    ConfigError::ValidationError(msg)
}

/// Loads the configuration once at startup and can write it back out.
pub struct ConfigManager {
    config: Config,
    path: PathBuf,
}

impl ConfigManager {
    /// Load configuration from file or use defaults.
    /// If the file doesn't exist, returns a manager with default config.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        let config = if path.exists() {
            let contents = fs::read_to_string(path).map_err(|e| {
                ConfigError::ParseError(format!("Failed to read config file: {}", e))
            })?;

            let config: Config = serde_json::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(format!("Invalid JSON: {}", e)))?;

            config.validate()?;
            config
        } else {
            Config::default()
        };

        Ok(Self {
            config,
            path: path.to_path_buf(),
        })
    }

    /// Save configuration to file using atomic write.
    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write to a temp file, then rename over the target
        let temp_path = self.path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(&self.config)
            .map_err(|e| ConfigError::ParseError(format!("Failed to serialize config: {}", e)))?;

        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }

        fs::rename(&temp_path, &self.path)?;

        Ok(())
    }

    /// Write the current configuration if no file exists yet.
    /// Returns true when a file was written.
    pub fn ensure_file(&self) -> Result<bool, ConfigError> {
        if self.path.exists() {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    pub fn get(&self) -> &Config {
        &self.config
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Default config path (`<config dir>/globe-quality/config.json`).
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("globe-quality")
            .join("config.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tier::TierThreshold;
    use proptest::prelude::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.adaptive.enabled);
        assert_eq!(config.adaptive.target_fps, 55.0);
        assert_eq!(config.adaptive.target_frame_time_ms, 18.0);
        assert_eq!(config.adaptive.check_interval(), Duration::from_millis(1500));
        assert_eq!(config.adaptive.ema_alpha, 0.3);
        assert_eq!(config.adaptive.initial_tier, QualityTier::High);
        assert_eq!(config.adaptive.hysteresis_fps, 3.0);
        assert_eq!(config.adaptive.hysteresis_time(), Duration::from_millis(3000));
        assert_eq!(config.adaptive.pressure_budget_mb, 2048);
        assert_eq!(config.telemetry.report_interval(), Duration::from_millis(1000));
        assert_eq!(config.telemetry.window(), Duration::from_millis(5000));
        assert_eq!(config.socket_path, DEFAULT_SOCKET_PATH);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_manager_load_nonexistent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nonexistent.json");

        let manager = ConfigManager::load_or_default(&path).unwrap();
        assert_eq!(*manager.get(), Config::default());
        assert_eq!(manager.path(), path.as_path());
    }

    #[test]
    fn test_config_manager_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let manager = ConfigManager::load_or_default(&path).unwrap();
        assert!(manager.ensure_file().unwrap());
        assert!(!manager.ensure_file().unwrap());
        assert!(path.exists());

        let loaded = ConfigManager::load_or_default(&path).unwrap();
        assert_eq!(*loaded.get(), Config::default());
    }

    #[test]
    fn test_partial_file_takes_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"adaptive":{"target_fps":60.0,"initial_tier":"medium"},"socket_path":"/tmp/q.sock"}"#,
        )
        .unwrap();

        let manager = ConfigManager::load_or_default(&path).unwrap();
        let config = manager.get();
        assert_eq!(config.adaptive.target_fps, 60.0);
        assert_eq!(config.adaptive.initial_tier, QualityTier::Medium);
        assert_eq!(config.adaptive.ema_alpha, 0.3);
        assert_eq!(config.telemetry, TelemetryConfig::default());
        assert_eq!(config.socket_path, "/tmp/q.sock");
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let result = ConfigManager::load_or_default(&path);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_invalid_tier_name_is_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"adaptive":{"initial_tier":"extreme"}}"#).unwrap();

        let result = ConfigManager::load_or_default(&path);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_invalid_values_rejected_on_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"adaptive":{"ema_alpha":1.5}}"#).unwrap();

        let result = ConfigManager::load_or_default(&path);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validation_rejects_unordered_thresholds() {
        let mut config = Config::default();
        config.adaptive.thresholds.high = TierThreshold::new(60.0, 19.0);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("min_fps"));

        let mut config = Config::default();
        config.adaptive.thresholds.ultra = TierThreshold::new(58.0, 25.0);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_frame_time_ms"));
    }

    #[test]
    fn test_validation_rejects_bad_tuning_ranges() {
        let mut config = Config::default();
        config.adaptive.tuning.min_scale = 1.2;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.adaptive.tuning.threshold_step = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_intervals() {
        let mut config = Config::default();
        config.adaptive.check_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.adaptive.pressure_budget_mb = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.telemetry.window_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_preset() {
        let mut config = Config::default();
        config.adaptive.presets.low.resolution_scale = 1.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("low preset"));
    }

    // Integer-derived values keep the JSON float round trip exact
    fn valid_adaptive_strategy() -> impl Strategy<Value = AdaptiveConfig> {
        (
            any::<bool>(),
            30u32..=120u32,
            5u32..=40u32,
            100u64..=10_000u64,
            1u32..=100u32,
            0u32..=10u32,
            0u64..=10_000u64,
        )
            .prop_map(
                |(enabled, target_fps, frame_time_ms, check_interval_ms, alpha_pct, hysteresis_fps, hysteresis_time_ms)| {
                    AdaptiveConfig {
                        enabled,
                        target_fps: target_fps as f64,
                        target_frame_time_ms: frame_time_ms as f64,
                        check_interval_ms,
                        ema_alpha: alpha_pct as f64 / 100.0,
                        hysteresis_fps: hysteresis_fps as f64,
                        hysteresis_time_ms,
                        ..AdaptiveConfig::default()
                    }
                },
            )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_valid_configs_pass_validation(adaptive in valid_adaptive_strategy()) {
            let config = Config { adaptive, ..Config::default() };
            prop_assert!(config.validate().is_ok(), "Valid config should pass validation: {:?}", config);
        }

        #[test]
        fn prop_config_file_round_trip(adaptive in valid_adaptive_strategy()) {
            let dir = tempdir().unwrap();
            let path = dir.path().join("config.json");
            let config = Config { adaptive, ..Config::default() };

            let manager = ConfigManager { config: config.clone(), path: path.clone() };
            manager.save().unwrap();

            let loaded = ConfigManager::load_or_default(&path).unwrap();
            prop_assert_eq!(&config, loaded.get());
        }

        #[test]
        fn prop_alpha_out_of_range_rejected(alpha in prop_oneof![-10.0f64..=0.0f64, 1.0001f64..=10.0f64]) {
            let mut config = Config::default();
            config.adaptive.ema_alpha = alpha;
            let result = config.validate();
            prop_assert!(matches!(result, Err(ConfigError::ValidationError(ref msg)) if msg.contains("ema_alpha")));
        }
    }
}
