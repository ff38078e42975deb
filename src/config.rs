//! Configuration for CGM feature preparation.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::DataError;

/// Default high-glycemic-index keywords (English and Cebuano)
pub const DEFAULT_HIGH_GI_KEYWORDS: [&str; 8] = [
    "rice",
    "bread",
    "soda",
    "cake",
    "sweet",
    "chocolate",
    "kan-on",
    "tinapay",
];

/// Upper bound for `activity_widen_minutes` (one week)
pub const MAX_ACTIVITY_WIDEN_MINUTES: i64 = 7 * 24 * 60;

/// Upper bound for `sleep_lookback_days`
pub const MAX_SLEEP_LOOKBACK_DAYS: i64 = 31;

/// Upper bound for the estimator peak window offsets (one day)
pub const MAX_PEAK_WINDOW_MINUTES: i64 = 24 * 60;

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database holding the record streams
    pub db_path: PathBuf,

    /// Directory holding the CSV exports
    pub data_dir: PathBuf,

    /// Default feature lookback (minutes)
    pub window_minutes: u32,

    /// Resampling grid step (minutes)
    pub grid_step_minutes: u32,

    /// Case-insensitive substrings marking a meal as high-GI
    pub high_gi_keywords: Vec<String>,

    /// How far before the window start activity starts are searched (minutes)
    pub activity_widen_minutes: i64,

    /// How far back sleep ends are searched (days)
    pub sleep_lookback_days: i64,

    /// Turns kept per user after a chat append
    pub chat_max_turns: usize,

    /// Turns returned by a history lookup
    pub chat_history_len: usize,

    pub estimator: EstimatorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data").join("buhai.db"),
            data_dir: PathBuf::from("data").join("dataset-user"),
            window_minutes: 90,
            grid_step_minutes: 5,
            high_gi_keywords: DEFAULT_HIGH_GI_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
            activity_widen_minutes: 60,
            sleep_lookback_days: 2,
            chat_max_turns: 8,
            chat_history_len: 4,
            estimator: EstimatorConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, falling back to defaults.
    pub fn load() -> Result<Self, DataError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, DataError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|e| DataError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: &Path) -> Result<(), DataError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cgm-features")
            .join("config.json")
    }

    /// How far before the window activities are fetched, clamped to
    /// `[0, MAX_ACTIVITY_WIDEN_MINUTES]`
    pub fn activity_widen(&self) -> Duration {
        Duration::minutes(self.activity_widen_minutes.clamp(0, MAX_ACTIVITY_WIDEN_MINUTES))
    }

    /// How far before the window end sleep records are fetched, clamped to
    /// `[0, MAX_SLEEP_LOOKBACK_DAYS]`
    pub fn sleep_lookback(&self) -> Duration {
        Duration::days(self.sleep_lookback_days.clamp(0, MAX_SLEEP_LOOKBACK_DAYS))
    }

    fn validate(&self) -> Result<(), DataError> {
        if self.grid_step_minutes == 0 {
            return Err(DataError::Config("grid_step_minutes must be positive".into()));
        }
        if !(0..=MAX_ACTIVITY_WIDEN_MINUTES).contains(&self.activity_widen_minutes) {
            return Err(DataError::Config(format!(
                "activity_widen_minutes must be between 0 and {MAX_ACTIVITY_WIDEN_MINUTES}"
            )));
        }
        if !(0..=MAX_SLEEP_LOOKBACK_DAYS).contains(&self.sleep_lookback_days) {
            return Err(DataError::Config(format!(
                "sleep_lookback_days must be between 0 and {MAX_SLEEP_LOOKBACK_DAYS}"
            )));
        }
        let est = &self.estimator;
        for offset in [est.peak_window_start_minutes, est.peak_window_end_minutes] {
            if !(0..=MAX_PEAK_WINDOW_MINUTES).contains(&offset) {
                return Err(DataError::Config(format!(
                    "estimator peak window offsets must be between 0 and {MAX_PEAK_WINDOW_MINUTES}"
                )));
            }
        }
        if est.peak_window_start_minutes > est.peak_window_end_minutes {
            return Err(DataError::Config(
                "estimator peak window starts after it ends".into(),
            ));
        }
        Ok(())
    }
}

/// Constants of the historical meal estimator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Estimate for a single serving of a low-GI meal
    pub low_gi_base: f64,
    /// Added per extra serving of a low-GI meal
    pub low_gi_per_unit: f64,
    /// Reference estimate for a single serving of a high-GI meal
    pub high_gi_base: f64,
    /// Factor on `high_gi_base` when no similar meal exists
    pub no_match_factor: f64,
    /// Factor on `high_gi_base` when similar meals have no CGM peaks
    pub no_peak_factor: f64,
    /// Fraction of the average peak added per extra serving
    pub per_unit_peak_fraction: f64,
    pub peak_window_start_minutes: i64,
    pub peak_window_end_minutes: i64,
    /// Historical meals considered per estimate
    pub max_matches: usize,
    pub max_quantity: f64,
    /// Half-width of the uniform display noise
    pub noise_amplitude: f64,
    /// Returned when the store cannot be read
    pub unavailable_estimate: f64,
}

impl EstimatorConfig {
    /// Offsets after a meal bounding its CGM peak search, each clamped to
    /// `[0, MAX_PEAK_WINDOW_MINUTES]`
    pub fn peak_window(&self) -> (Duration, Duration) {
        let clamp = |minutes: i64| Duration::minutes(minutes.clamp(0, MAX_PEAK_WINDOW_MINUTES));
        (
            clamp(self.peak_window_start_minutes),
            clamp(self.peak_window_end_minutes),
        )
    }
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            low_gi_base: 120.0,
            low_gi_per_unit: 5.0,
            high_gi_base: 165.0,
            no_match_factor: 0.5,
            no_peak_factor: 0.75,
            per_unit_peak_fraction: 0.25,
            peak_window_start_minutes: 25,
            peak_window_end_minutes: 65,
            max_matches: 10,
            max_quantity: 10.0,
            noise_amplitude: 2.0,
            unavailable_estimate: 140.0,
        }
    }
}
