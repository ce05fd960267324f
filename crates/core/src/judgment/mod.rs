use serde::{Deserialize, Serialize};

use crate::config::JudgmentConfig;
use crate::detector::TempoEstimate;

/// Discrete accuracy tier assigned to a timed input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Judgment {
    Perfect,
    Good,
    Miss,
    #[default]
    None,
}

/// Which of the two timing formulas classifies an input.
///
/// The beat-normalized mode expresses the error as a fraction of the current
/// beat interval; the absolute mode measures seconds to the nearest beat on
/// either side. They can disagree on the same input, so the mode is chosen
/// up front and never mixed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JudgmentMode {
    #[default]
    BeatNormalized,
    AbsoluteTime,
}

/// Per-session judgment counters. Incremented only by the judgment path and
/// by scheduler expiry; read by the end-of-session tracker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub perfect_count: u32,
    pub good_count: u32,
    pub miss_count: u32,
    pub completed_actions: u32,
    pub total_actions: u32,
}

impl SessionStats {
    pub fn new(total_actions: u32) -> Self {
        Self {
            total_actions,
            ..Self::default()
        }
    }

    /// Bumps the counter matching the tier. `None` leaves the stats alone.
    pub fn record(&mut self, judgment: Judgment) {
        match judgment {
            Judgment::Perfect => self.perfect_count += 1,
            Judgment::Good => self.good_count += 1,
            Judgment::Miss => self.miss_count += 1,
            Judgment::None => {}
        }
    }

    pub fn complete_action(&mut self) {
        self.completed_actions += 1;
    }

    pub fn is_complete(&self) -> bool {
        self.total_actions > 0 && self.completed_actions >= self.total_actions
    }

    pub fn judged_total(&self) -> u32 {
        self.perfect_count + self.good_count + self.miss_count
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.total_actions);
    }
}

/// Pure timing classifier. Classification depends only on its arguments,
/// which keeps both formulas directly unit-testable.
#[derive(Debug, Clone)]
pub struct JudgmentEngine {
    config: JudgmentConfig,
}

impl JudgmentEngine {
    pub fn new(config: JudgmentConfig) -> Self {
        Self { config }
    }

    pub fn mode(&self) -> JudgmentMode {
        self.config.mode
    }

    /// Canonical classification: timing error normalized by the current
    /// beat interval and compared against fractional-beat ranges.
    ///
    /// Without a valid tempo the error cannot be expressed in beats, so the
    /// input degrades to a miss instead of interrupting the loop.
    pub fn classify(&self, time_diff: f32, tempo: TempoEstimate) -> Judgment {
        if !tempo.is_valid() {
            return Judgment::Miss;
        }
        let beat_interval = 60.0 / tempo.bpm;
        let beat_diff = time_diff.abs() / beat_interval;

        if beat_diff <= self.config.perfect_range {
            Judgment::Perfect
        } else if beat_diff <= self.config.good_range {
            Judgment::Good
        } else {
            // Everything past the good range is a miss, including errors
            // beyond the configured miss range. There is no lower tier.
            Judgment::Miss
        }
    }

    /// Alternate classification: seconds to the nearest beat on either side
    /// of the input, compared against fixed-second windows.
    pub fn classify_absolute(
        &self,
        input_time: f32,
        last_beat_time: f32,
        beat_interval: f32,
    ) -> Judgment {
        if beat_interval <= 0.0 {
            return Judgment::Miss;
        }
        let since_last = (input_time - last_beat_time).abs();
        let to_next = (beat_interval - since_last).abs();
        let time_difference = since_last.min(to_next);

        if time_difference <= self.config.perfect_window {
            Judgment::Perfect
        } else if time_difference <= self.config.good_window {
            Judgment::Good
        } else {
            Judgment::Miss
        }
    }
}
