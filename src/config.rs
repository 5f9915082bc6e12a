// Sequencer configuration
// Timing constants for the lookahead scheduler plus runtime knobs, loadable
// from RON or JSON. Every field has a default so partial files are accepted.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Runtime configuration for the sequencer and its playback thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    /// How far ahead of the audio clock ticks are scheduled (seconds)
    pub schedule_ahead_secs: f64,
    /// Wake interval of the low-precision timer (milliseconds)
    pub timer_interval_ms: u64,
    /// Tempo used when `start` receives an unusable BPM
    pub default_bpm: f64,
    /// Upper tempo bound
    pub max_bpm: f64,
    /// Seed for every random draw; `None` seeds from entropy
    pub rng_seed: Option<u64>,
    /// Log level name for the headless binary ("error" .. "trace")
    pub log_level: String,
}

impl SequencerConfig {
    pub const MIN_SCHEDULE_AHEAD_SECS: f64 = 0.005;
    pub const MAX_SCHEDULE_AHEAD_SECS: f64 = 2.0;
    pub const MIN_TIMER_INTERVAL_MS: u64 = 1;
    pub const MAX_TIMER_INTERVAL_MS: u64 = 500;

    /// Load a config file; the format is chosen from the extension (`.ron` or `.json`)
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let mut config: SequencerConfig = match extension.as_str() {
            "ron" => ron::from_str(&text)?,
            "json" => serde_json::from_str(&text)?,
            other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
        };
        config.validate();
        log::debug!("Loaded sequencer config from {}", path.display());
        Ok(config)
    }

    /// Clamp every field into its usable range
    pub fn validate(&mut self) {
        let defaults = Self::default();

        self.schedule_ahead_secs = if self.schedule_ahead_secs.is_finite() {
            self.schedule_ahead_secs
                .clamp(Self::MIN_SCHEDULE_AHEAD_SECS, Self::MAX_SCHEDULE_AHEAD_SECS)
        } else {
            defaults.schedule_ahead_secs
        };
        self.timer_interval_ms = self
            .timer_interval_ms
            .clamp(Self::MIN_TIMER_INTERVAL_MS, Self::MAX_TIMER_INTERVAL_MS);

        if !self.max_bpm.is_finite() || self.max_bpm <= 0.0 {
            self.max_bpm = defaults.max_bpm;
        }
        if !self.default_bpm.is_finite() || self.default_bpm <= 0.0 {
            self.default_bpm = defaults.default_bpm;
        }
        self.default_bpm = self.default_bpm.min(self.max_bpm);

        if self.log_level.parse::<log::LevelFilter>().is_err() {
            self.log_level = defaults.log_level;
        }
    }

    /// Parsed log level (falls back to Info)
    pub fn level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            schedule_ahead_secs: 0.1,
            timer_interval_ms: 25,
            default_bpm: 120.0,
            max_bpm: 300.0,
            rng_seed: None,
            log_level: "info".to_string(),
        }
    }
}
