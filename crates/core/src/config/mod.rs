use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::energy::{DEFAULT_HISTORY_LEN, DEFAULT_RAW_RING_LEN};
use crate::input::MatchMode;
use crate::judgment::JudgmentMode;
use crate::{BeatCoachError, Result};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub detector: DetectorConfig,
    pub judgment: JudgmentConfig,
    pub session: SessionConfig,
    pub input: InputConfig,
}

impl AppConfig {
    /// Parses a configuration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a configuration file from disk.
    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Rejects configurations the core cannot operate under. Components are
    /// disabled entirely rather than run with partial settings.
    pub fn validate(&self) -> Result<()> {
        if self.audio.sample_rate == 0 {
            return Err(BeatCoachError::InvalidInput("sample_rate must be positive"));
        }
        if self.audio.window_duration <= 0.0 {
            return Err(BeatCoachError::InvalidInput(
                "window_duration must be positive",
            ));
        }
        if !(self.detector.sensitivity > 0.0 && self.detector.sensitivity <= 1.0) {
            return Err(BeatCoachError::InvalidInput(
                "sensitivity must be in (0, 1]",
            ));
        }
        if self.detector.min_beat_interval <= 0.0 {
            return Err(BeatCoachError::InvalidInput(
                "min_beat_interval must be positive",
            ));
        }
        if self.detector.history_len == 0 || self.detector.raw_ring_len < 2 {
            return Err(BeatCoachError::InvalidInput(
                "energy history windows are too small",
            ));
        }
        if self.judgment.perfect_range <= 0.0
            || self.judgment.good_range < self.judgment.perfect_range
            || self.judgment.miss_range < self.judgment.good_range
        {
            return Err(BeatCoachError::InvalidInput(
                "judgment ranges must be positive and ordered",
            ));
        }
        if self.judgment.perfect_window <= 0.0
            || self.judgment.good_window < self.judgment.perfect_window
        {
            return Err(BeatCoachError::InvalidInput(
                "judgment windows must be positive and ordered",
            ));
        }
        if self.session.end_delay < 0.0 {
            return Err(BeatCoachError::InvalidInput(
                "end_delay must not be negative",
            ));
        }
        Ok(())
    }
}

/// Configuration for the audio snapshot boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    /// Length of one amplitude snapshot in seconds.
    pub window_duration: f32,
}

impl AudioConfig {
    /// Exact snapshot length in samples.
    pub fn window_len(&self) -> usize {
        (self.sample_rate as f32 * self.window_duration) as usize
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            window_duration: 0.1,
        }
    }
}

/// Configuration for onset detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Energy threshold coefficient in (0, 1].
    pub sensitivity: f32,
    /// Refractory period between detected beats, in seconds.
    pub min_beat_interval: f32,
    /// Frames kept for the rolling average.
    pub history_len: usize,
    /// Raw energies kept for the rising-edge comparison.
    pub raw_ring_len: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            sensitivity: 0.1,
            min_beat_interval: 0.2,
            history_len: DEFAULT_HISTORY_LEN,
            raw_ring_len: DEFAULT_RAW_RING_LEN,
        }
    }
}

/// Configuration for timing judgment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgmentConfig {
    pub mode: JudgmentMode,
    /// Fractional-beat tolerances for the beat-normalized mode.
    pub perfect_range: f32,
    pub good_range: f32,
    pub miss_range: f32,
    /// Fixed-second windows for the absolute-time mode.
    pub perfect_window: f32,
    pub good_window: f32,
}

impl Default for JudgmentConfig {
    fn default() -> Self {
        Self {
            mode: JudgmentMode::BeatNormalized,
            perfect_range: 0.1,
            good_range: 0.3,
            miss_range: 0.5,
            perfect_window: 0.05,
            good_window: 0.1,
        }
    }
}

/// Configuration for the session lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Seconds between all actions completing and the session ending.
    pub end_delay: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { end_delay: 2.0 }
    }
}

/// Configuration for input routing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub match_mode: MatchMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.audio.sample_rate, 44_100);
        assert_eq!(config.audio.window_len(), 4410);
        assert_eq!(config.detector.history_len, 50);
        assert_eq!(config.detector.raw_ring_len, 43);
        assert_eq!(config.judgment.perfect_range, 0.1);
        assert_eq!(config.session.end_delay, 2.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_partial_json_with_defaults() {
        let config = AppConfig::from_json_str(
            r#"{
                "detector": { "sensitivity": 0.25 },
                "judgment": { "mode": "absolute_time" }
            }"#,
        )
        .unwrap();
        assert_eq!(config.detector.sensitivity, 0.25);
        assert_eq!(config.detector.min_beat_interval, 0.2);
        assert_eq!(config.judgment.mode, JudgmentMode::AbsoluteTime);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut config = AppConfig::default();
        config.detector.sensitivity = 0.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.judgment.good_range = 0.05;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.audio.sample_rate = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_json_surfaces_a_config_error() {
        let err = AppConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, BeatCoachError::Config(_)));
    }
}
