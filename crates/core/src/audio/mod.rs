use crate::{BeatCoachError, Result};

/// Capability the host supplies for audio capture. The core never decodes
/// or plays audio; it only consumes fixed-length amplitude snapshots.
pub trait AudioInput {
    /// Fills `buffer` with the most recent amplitude window. Implementors
    /// must reject an empty `buffer` with `InvalidInput` rather than
    /// silently succeeding.
    fn snapshot(&mut self, buffer: &mut [f32]) -> Result<()>;

    /// Whether the source is currently producing audio. Ticks are skipped
    /// while this is false.
    fn is_active(&self) -> bool;
}

/// Deterministic click-track source used by the CLI and by tests: a short
/// burst of constant amplitude at every beat interval, silence elsewhere.
#[derive(Debug, Clone)]
pub struct PulseTrain {
    sample_rate: u32,
    interval: f32,
    pulse_width: f32,
    amplitude: f32,
    duration: f32,
    elapsed: f32,
}

impl PulseTrain {
    /// Creates a pulse train at the given tempo that stays active for
    /// `duration` seconds.
    pub fn new(sample_rate: u32, bpm: f32, duration: f32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(BeatCoachError::InvalidInput("sample_rate must be positive"));
        }
        if bpm <= 0.0 {
            return Err(BeatCoachError::InvalidInput("bpm must be positive"));
        }
        if duration <= 0.0 {
            return Err(BeatCoachError::InvalidInput("duration must be positive"));
        }
        Ok(Self {
            sample_rate,
            interval: 60.0 / bpm,
            pulse_width: 0.01,
            amplitude: 0.9,
            duration,
            elapsed: 0.0,
        })
    }

    /// Seconds of audio handed out so far.
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }
}

impl AudioInput for PulseTrain {
    fn snapshot(&mut self, buffer: &mut [f32]) -> Result<()> {
        if buffer.is_empty() {
            return Err(BeatCoachError::InvalidInput(
                "snapshot buffer must not be empty",
            ));
        }
        let step = 1.0 / self.sample_rate as f32;
        for (index, slot) in buffer.iter_mut().enumerate() {
            let t = self.elapsed + index as f32 * step;
            let phase = t % self.interval;
            *slot = if phase < self.pulse_width {
                self.amplitude
            } else {
                0.0
            };
        }
        self.elapsed += buffer.len() as f32 * step;
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.elapsed < self.duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_a_burst_once_per_interval() {
        // 120 BPM at 1 kHz: a pulse every 500 samples, 10 samples wide.
        let mut source = PulseTrain::new(1_000, 120.0, 10.0).unwrap();
        let mut window = vec![0.0; 100];

        source.snapshot(&mut window).unwrap();
        assert!(window[..10].iter().all(|&s| s > 0.0));
        assert!(window[10..].iter().all(|&s| s == 0.0));

        // Windows 2..5 are silent, window 6 carries the next burst.
        for _ in 0..4 {
            source.snapshot(&mut window).unwrap();
            assert!(window.iter().all(|&s| s == 0.0));
        }
        source.snapshot(&mut window).unwrap();
        assert!(window[..10].iter().all(|&s| s > 0.0));
    }

    #[test]
    fn goes_inactive_after_its_duration() {
        let mut source = PulseTrain::new(1_000, 120.0, 0.25).unwrap();
        let mut window = vec![0.0; 100];
        assert!(source.is_active());

        source.snapshot(&mut window).unwrap();
        source.snapshot(&mut window).unwrap();
        assert!(source.is_active());
        source.snapshot(&mut window).unwrap();
        assert!(!source.is_active());
    }

    #[test]
    fn snapshot_rejects_an_empty_buffer() {
        let mut source = PulseTrain::new(1_000, 120.0, 1.0).unwrap();
        assert!(source.snapshot(&mut []).is_err());
    }

    #[test]
    fn constructor_rejects_degenerate_parameters() {
        assert!(PulseTrain::new(0, 120.0, 1.0).is_err());
        assert!(PulseTrain::new(1_000, 0.0, 1.0).is_err());
        assert!(PulseTrain::new(1_000, 120.0, 0.0).is_err());
    }
}
