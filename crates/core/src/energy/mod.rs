use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Number of frames kept for the rolling average.
pub const DEFAULT_HISTORY_LEN: usize = 50;
/// Number of raw energies kept for the rising-edge comparison.
pub const DEFAULT_RAW_RING_LEN: usize = 43;

/// Root-mean-square energy of a single audio window. Recomputed each tick
/// and never stored outside the analyzer's bounded history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EnergyFrame {
    pub rms: f32,
}

/// Converts raw sample windows into scalar energy values and keeps the
/// bounded history that the beat detector reads for adaptive thresholding.
///
/// Two buffers are maintained on purpose: a FIFO of recent frames that feeds
/// the rolling average, and a separate raw-energy ring used strictly for the
/// "energy one tick ago" comparison.
#[derive(Debug, Clone)]
pub struct EnergyAnalyzer {
    history: VecDeque<f32>,
    history_len: usize,
    raw_ring: VecDeque<f32>,
    raw_ring_len: usize,
    running_max: f32,
}

impl EnergyAnalyzer {
    /// Creates an analyzer with the default window sizes.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_LEN, DEFAULT_RAW_RING_LEN)
    }

    /// Creates an analyzer with explicit history and raw-ring capacities.
    pub fn with_capacity(history_len: usize, raw_ring_len: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(history_len),
            history_len: history_len.max(1),
            raw_ring: VecDeque::with_capacity(raw_ring_len),
            raw_ring_len: raw_ring_len.max(2),
            running_max: 0.0,
        }
    }

    /// Consumes one audio window and returns its energy frame.
    ///
    /// An empty buffer yields an energy of zero rather than dividing by
    /// zero; the frame still enters the history so the warm-up count keeps
    /// advancing while the source is silent.
    pub fn ingest(&mut self, samples: &[f32]) -> EnergyFrame {
        let rms = compute_rms(samples);
        self.running_max = self.running_max.max(rms);

        self.history.push_back(rms);
        if self.history.len() > self.history_len {
            self.history.pop_front();
        }

        self.raw_ring.push_back(rms);
        if self.raw_ring.len() > self.raw_ring_len {
            self.raw_ring.pop_front();
        }

        EnergyFrame { rms }
    }

    /// Mean energy over the rolling history, including the latest frame.
    pub fn average(&self) -> f32 {
        if self.history.is_empty() {
            return 0.0;
        }
        let sum: f32 = self.history.iter().sum();
        sum / self.history.len() as f32
    }

    /// Energy observed one tick ago, or zero before two frames exist.
    pub fn previous_energy(&self) -> f32 {
        let len = self.raw_ring.len();
        if len < 2 {
            return 0.0;
        }
        self.raw_ring[len - 2]
    }

    /// Highest energy observed since the last reset. Never decays.
    pub fn running_max(&self) -> f32 {
        self.running_max
    }

    /// True once the rolling history has filled to capacity.
    pub fn is_warmed_up(&self) -> bool {
        self.history.len() >= self.history_len
    }

    /// Number of frames currently held in the rolling history.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Clears all history, the raw ring, and the running maximum.
    pub fn reset(&mut self) {
        self.history.clear();
        self.raw_ring.clear();
        self.running_max = 0.0;
    }
}

impl Default for EnergyAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

fn compute_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|sample| sample * sample).sum();
    (sum / samples.len() as f32).sqrt()
}
