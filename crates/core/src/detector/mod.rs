use serde::{Deserialize, Serialize};

use crate::config::DetectorConfig;
use crate::energy::{EnergyAnalyzer, EnergyFrame};

/// Beats per group; the counters wrap the beat position on this boundary.
pub const BEATS_PER_GROUP: u64 = 8;

/// Candidate frames must exceed the rolling average by this factor even when
/// the dynamic threshold collapses during low-energy passages.
const SIGNIFICANCE_MARGIN: f32 = 1.1;

/// Smoothing factor applied to the tempo estimate after it has been seeded.
const TEMPO_SMOOTHING: f32 = 0.2;

/// A position in the beat grid: which group of eight, and which beat inside
/// that group (1..=8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeatCoordinate {
    pub group: u32,
    pub beat: u32,
}

/// A detected onset. Produced exactly once per beat and immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeatEvent {
    /// Monotonic beat index, starting at zero.
    pub index: u64,
    /// 1-based group of eight this beat falls in.
    pub group_number: u32,
    /// Position inside the group, 1..=8.
    pub beat_in_group: u32,
    pub timestamp: f32,
}

impl BeatEvent {
    pub fn coordinate(&self) -> BeatCoordinate {
        BeatCoordinate {
            group: self.group_number,
            beat: self.beat_in_group,
        }
    }
}

/// Smoothed tempo derived from inter-beat intervals. Zero until the second
/// beat provides the first valid interval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TempoEstimate {
    pub bpm: f32,
    pub beat_interval: f32,
}

impl TempoEstimate {
    pub fn is_valid(&self) -> bool {
        self.bpm > 0.0
    }
}

/// Turns the energy stream into a timestamped beat/group sequence with a
/// smoothed BPM estimate.
#[derive(Debug, Clone)]
pub struct BeatDetector {
    analyzer: EnergyAnalyzer,
    sensitivity: f32,
    min_beat_interval: f32,
    beat_count: u64,
    group_number: u32,
    beat_in_group: u32,
    last_beat_time: f32,
    last_peak_time: f32,
    tempo: TempoEstimate,
    tempo_seeded: bool,
}

impl BeatDetector {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            analyzer: EnergyAnalyzer::with_capacity(config.history_len, config.raw_ring_len),
            sensitivity: config.sensitivity,
            min_beat_interval: config.min_beat_interval,
            beat_count: 0,
            group_number: 1,
            beat_in_group: 0,
            last_beat_time: 0.0,
            last_peak_time: 0.0,
            tempo: TempoEstimate::default(),
            tempo_seeded: false,
        }
    }

    /// Ingests one audio window and runs detection on the resulting frame.
    /// This is the per-tick entry point for callers holding raw samples.
    pub fn process_block(&mut self, samples: &[f32], now: f32) -> Option<BeatEvent> {
        let frame = self.analyzer.ingest(samples);
        self.tick(frame, now)
    }

    /// Runs onset detection for the frame most recently ingested by the
    /// analyzer. Returns a [`BeatEvent`] when the frame qualifies.
    pub fn tick(&mut self, frame: EnergyFrame, now: f32) -> Option<BeatEvent> {
        if !self.analyzer.is_warmed_up() {
            return None;
        }

        // Refractory guard against double-triggering on a single transient.
        if now - self.last_peak_time < self.min_beat_interval {
            return None;
        }

        let average = self.analyzer.average();
        let dynamic_threshold =
            average + (self.analyzer.running_max() - average) * self.sensitivity;

        let over_threshold = frame.rms > dynamic_threshold;
        let rising_edge = frame.rms > self.analyzer.previous_energy();
        let significant = frame.rms > average * SIGNIFICANCE_MARGIN;

        if !(over_threshold && rising_edge && significant) {
            return None;
        }

        self.beat_count += 1;
        let index = self.beat_count - 1;
        self.beat_in_group = (index % BEATS_PER_GROUP + 1) as u32;
        self.group_number = (index / BEATS_PER_GROUP + 1) as u32;

        let previous_beat_time = self.last_beat_time;
        self.last_beat_time = now;
        self.last_peak_time = now;

        if previous_beat_time > 0.0 {
            self.update_tempo(now - previous_beat_time);
        }

        let event = BeatEvent {
            index,
            group_number: self.group_number,
            beat_in_group: self.beat_in_group,
            timestamp: now,
        };
        tracing::debug!(
            index = event.index,
            group = event.group_number,
            beat = event.beat_in_group,
            bpm = self.tempo.bpm,
            "beat detected"
        );
        Some(event)
    }

    fn update_tempo(&mut self, interval: f32) {
        if interval <= f32::EPSILON {
            return;
        }
        let instant_bpm = 60.0 / interval;
        if self.tempo_seeded {
            self.tempo.bpm = lerp(self.tempo.bpm, instant_bpm, TEMPO_SMOOTHING);
            self.tempo.beat_interval = lerp(self.tempo.beat_interval, interval, TEMPO_SMOOTHING);
        } else {
            // The first valid interval seeds the estimate directly so the
            // smoothing never averages against the zero initial state.
            self.tempo.bpm = instant_bpm;
            self.tempo.beat_interval = interval;
            self.tempo_seeded = true;
        }
    }

    /// Current (group, beat) coordinate, or `None` before the first beat.
    pub fn current_coordinate(&self) -> Option<BeatCoordinate> {
        if self.beat_count == 0 {
            return None;
        }
        Some(BeatCoordinate {
            group: self.group_number,
            beat: self.beat_in_group,
        })
    }

    pub fn tempo(&self) -> TempoEstimate {
        self.tempo
    }

    pub fn beat_count(&self) -> u64 {
        self.beat_count
    }

    pub fn last_beat_time(&self) -> f32 {
        self.last_beat_time
    }

    pub fn analyzer(&self) -> &EnergyAnalyzer {
        &self.analyzer
    }

    /// Restores the detector to its initial state: index zero, group one,
    /// tempo unset, and an empty energy history.
    pub fn reset(&mut self) {
        self.analyzer.reset();
        self.beat_count = 0;
        self.group_number = 1;
        self.beat_in_group = 0;
        self.last_beat_time = 0.0;
        self.last_peak_time = 0.0;
        self.tempo = TempoEstimate::default();
        self.tempo_seeded = false;
    }
}

fn lerp(from: f32, to: f32, factor: f32) -> f32 {
    from + (to - from) * factor
}
