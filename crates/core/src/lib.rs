//! Core library for the Beat Coach rhythm trainer.
//!
//! The crate turns a live audio stream into a timestamped beat/group
//! sequence and judges the timing accuracy of discrete input events against
//! scheduled beat coordinates. Each module owns a distinct subsystem
//! (energy analysis, onset detection, action scheduling, judgment, session
//! lifecycle, input routing) and everything runs on a single-threaded
//! frame-tick model driven by the host.

pub mod audio;
pub mod config;
pub mod detector;
pub mod energy;
pub mod error;
pub mod input;
pub mod judgment;
pub mod scheduler;
pub mod session;

pub use audio::{AudioInput, PulseTrain};
pub use config::{
    AppConfig, AudioConfig, DetectorConfig, InputConfig, JudgmentConfig, SessionConfig,
};
pub use detector::{BeatCoordinate, BeatDetector, BeatEvent, TempoEstimate};
pub use energy::{EnergyAnalyzer, EnergyFrame};
pub use error::{BeatCoachError, Result};
pub use input::{InputEvent, InputRouter, KeyBinding, MatchMode};
pub use judgment::{Judgment, JudgmentEngine, JudgmentMode, SessionStats};
pub use scheduler::{ActionScheduler, ActionState, ScheduledAction};
pub use session::{BeatSession, EffectSink, SessionEndTracker, SessionObserver, SessionPhase};
