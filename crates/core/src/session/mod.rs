use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::detector::{BeatDetector, BeatEvent};
use crate::input::{resolve_index, MatchMode};
use crate::judgment::{Judgment, JudgmentEngine, JudgmentMode, SessionStats};
use crate::scheduler::{ActionScheduler, ActionState, ScheduleOutcome, ScheduledAction};
use crate::Result;

/// Lifecycle phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SessionPhase {
    Running,
    /// All actions are complete; the end-of-session countdown is ticking.
    Ending { remaining: f32 },
    Ended,
}

/// Transition emitted by the tracker when the phase changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndTransition {
    Ending,
    Ended,
}

/// Drives the Running -> Ending -> Ended state machine from the completion
/// counters. Ended is terminal until an explicit reset.
#[derive(Debug, Clone)]
pub struct SessionEndTracker {
    phase: SessionPhase,
    end_delay: f32,
}

impl SessionEndTracker {
    pub fn new(end_delay: f32) -> Self {
        Self {
            phase: SessionPhase::Running,
            end_delay,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Advances the state machine by one tick of `dt` seconds.
    pub fn update(&mut self, stats: &SessionStats, dt: f32) -> Option<EndTransition> {
        match self.phase {
            SessionPhase::Running => {
                if stats.is_complete() {
                    self.phase = SessionPhase::Ending {
                        remaining: self.end_delay,
                    };
                    Some(EndTransition::Ending)
                } else {
                    None
                }
            }
            SessionPhase::Ending { remaining } => {
                let remaining = remaining - dt;
                // Repeated subtraction drifts (0.3 - 3 x 0.1 is ~2e-8 in
                // f32), so the countdown must not demand an exact zero.
                if remaining <= f32::EPSILON {
                    self.phase = SessionPhase::Ended;
                    Some(EndTransition::Ended)
                } else {
                    self.phase = SessionPhase::Ending { remaining };
                    None
                }
            }
            SessionPhase::Ended => None,
        }
    }

    pub fn reset(&mut self) {
        self.phase = SessionPhase::Running;
    }
}

/// Outbound session notifications. Subscriber order is unspecified and must
/// not be relied upon.
pub trait SessionObserver {
    fn beat_occurred(&mut self, _beat: &BeatEvent) {}
    fn action_judged(&mut self, _action: &str, _judgment: Judgment) {}
    fn session_ending(&mut self, _stats: &SessionStats) {}
    fn session_ended(&mut self, _stats: &SessionStats) {}
}

/// Fire-and-forget side-effect collaborators: audio cues, animation
/// triggers, and judgment-tier display. No return value is consumed.
pub trait EffectSink {
    fn play_cue(&mut self, _action: &str, _cue: &str) {}
    fn trigger_animation(&mut self, _action: &str, _sequence: &str) {}
    fn show_judgment(&mut self, _action: &str, _judgment: Judgment) {}
}

/// The explicit per-session context: detector, actions, stats, and the end
/// tracker, driven by a single `tick` entry point per audio window.
pub struct BeatSession {
    detector: BeatDetector,
    scheduler: ActionScheduler,
    engine: JudgmentEngine,
    stats: SessionStats,
    tracker: SessionEndTracker,
    match_mode: MatchMode,
    observers: Vec<Box<dyn SessionObserver>>,
    sinks: Vec<Box<dyn EffectSink>>,
}

impl BeatSession {
    /// Builds a session from a validated configuration and its action list.
    pub fn new(config: &AppConfig, actions: Vec<ScheduledAction>) -> Result<Self> {
        config.validate()?;
        let total = actions.len() as u32;
        Ok(Self {
            detector: BeatDetector::new(&config.detector),
            scheduler: ActionScheduler::new(actions),
            engine: JudgmentEngine::new(config.judgment.clone()),
            stats: SessionStats::new(total),
            tracker: SessionEndTracker::new(config.session.end_delay),
            match_mode: config.input.match_mode,
            observers: Vec::new(),
            sinks: Vec::new(),
        })
    }

    pub fn subscribe(&mut self, observer: Box<dyn SessionObserver>) {
        self.observers.push(observer);
    }

    pub fn add_sink(&mut self, sink: Box<dyn EffectSink>) {
        self.sinks.push(sink);
    }

    /// Runs one logical tick: energy ingest and beat detection, then the
    /// coordinate-change scan, then the end-of-session check. `now` is the
    /// current time and `dt` the time since the previous tick.
    pub fn tick(&mut self, samples: &[f32], now: f32, dt: f32) -> Option<BeatEvent> {
        let beat = self.detector.process_block(samples, now);
        if let Some(event) = beat {
            for observer in &mut self.observers {
                observer.beat_occurred(&event);
            }
        }

        if let Some(coordinate) = self.detector.current_coordinate() {
            let outcomes = self.scheduler.advance(coordinate, now);
            for outcome in outcomes {
                self.apply_outcome(outcome);
            }
        }

        match self.tracker.update(&self.stats, dt) {
            Some(EndTransition::Ending) => {
                tracing::info!(
                    perfect = self.stats.perfect_count,
                    good = self.stats.good_count,
                    miss = self.stats.miss_count,
                    "all actions complete, session ending"
                );
                for observer in &mut self.observers {
                    observer.session_ending(&self.stats);
                }
            }
            Some(EndTransition::Ended) => {
                tracing::info!("session ended");
                for observer in &mut self.observers {
                    observer.session_ended(&self.stats);
                }
            }
            None => {}
        }

        beat
    }

    fn apply_outcome(&mut self, outcome: ScheduleOutcome) {
        match outcome {
            ScheduleOutcome::Fired(index) => {
                let action = self.scheduler.actions()[index].clone();
                self.stats.complete_action();
                for sink in &mut self.sinks {
                    if let Some(cue) = &action.cue {
                        sink.play_cue(&action.name, cue);
                    }
                    if let Some(sequence) = &action.animation {
                        sink.trigger_animation(&action.name, sequence);
                    }
                }
            }
            ScheduleOutcome::ArmedForInput(index) => {
                let action = &self.scheduler.actions()[index];
                tracing::debug!(action = %action.name, "awaiting input");
            }
            ScheduleOutcome::Expired(index) => {
                let name = self.scheduler.actions()[index].name.clone();
                self.stats.record(Judgment::Miss);
                self.stats.complete_action();
                for sink in &mut self.sinks {
                    sink.show_judgment(&name, Judgment::Miss);
                }
                for observer in &mut self.observers {
                    observer.action_judged(&name, Judgment::Miss);
                }
            }
        }
    }

    /// Judges a forwarded input event against the pending action resolved
    /// from `target`.
    ///
    /// Declines with `None`, scoring nothing and touching no side effects,
    /// when no pending action matches or the detector's coordinate has
    /// advanced past the action's target.
    pub fn handle_input(&mut self, target: &str, input_time: f32) -> Option<Judgment> {
        let index = self.resolve_pending(target)?;
        let coordinate = self.detector.current_coordinate()?;

        let action = &self.scheduler.actions()[index];
        if action.state != ActionState::AwaitingInput || action.target != coordinate {
            return None;
        }

        let judgment = match self.engine.mode() {
            JudgmentMode::BeatNormalized => {
                let time_diff = (input_time - action.target_timestamp).abs();
                self.engine.classify(time_diff, self.detector.tempo())
            }
            JudgmentMode::AbsoluteTime => self.engine.classify_absolute(
                input_time,
                self.detector.last_beat_time(),
                self.detector.tempo().beat_interval,
            ),
        };

        let action = &mut self.scheduler.actions_mut()[index];
        action.state = ActionState::Fired;
        action.last_judgment = judgment;
        let action = self.scheduler.actions()[index].clone();

        self.stats.record(judgment);
        self.stats.complete_action();
        tracing::debug!(action = %action.name, ?judgment, "input judged");

        for sink in &mut self.sinks {
            if let Some(cue) = &action.cue {
                sink.play_cue(&action.name, cue);
            }
            if let Some(sequence) = &action.animation {
                sink.trigger_animation(&action.name, sequence);
            }
            sink.show_judgment(&action.name, judgment);
        }
        for observer in &mut self.observers {
            observer.action_judged(&action.name, judgment);
        }

        Some(judgment)
    }

    /// Resolves a target identifier to the pending action an input event
    /// for it would be judged against.
    pub fn candidate_action(&self, target: &str) -> Option<&ScheduledAction> {
        self.resolve_pending(target)
            .map(|index| &self.scheduler.actions()[index])
    }

    /// Resolves a target name against the actions currently awaiting input,
    /// using the configured match mode.
    fn resolve_pending(&self, target: &str) -> Option<usize> {
        let pending: Vec<usize> = self.scheduler.awaiting_input().collect();
        let names: Vec<&str> = pending
            .iter()
            .map(|&index| self.scheduler.actions()[index].name.as_str())
            .collect();
        resolve_index(target, &names, self.match_mode).map(|position| pending[position])
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn phase(&self) -> SessionPhase {
        self.tracker.phase()
    }

    pub fn detector(&self) -> &BeatDetector {
        &self.detector
    }

    pub fn actions(&self) -> &[ScheduledAction] {
        self.scheduler.actions()
    }

    /// Atomically reinitializes every component for a fresh session.
    pub fn reset(&mut self) {
        self.detector.reset();
        self.scheduler.reset();
        self.stats.reset();
        self.tracker.reset();
    }
}

impl std::fmt::Debug for BeatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BeatSession")
            .field("stats", &self.stats)
            .field("phase", &self.tracker.phase())
            .field("actions", &self.scheduler.len())
            .field("observers", &self.observers.len())
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::config::AppConfig;

    #[derive(Default, Clone)]
    struct Recorder {
        events: Rc<RefCell<Vec<String>>>,
    }

    impl SessionObserver for Recorder {
        fn beat_occurred(&mut self, beat: &BeatEvent) {
            self.events
                .borrow_mut()
                .push(format!("beat {}:{}", beat.group_number, beat.beat_in_group));
        }

        fn action_judged(&mut self, action: &str, judgment: Judgment) {
            self.events
                .borrow_mut()
                .push(format!("judged {action} {judgment:?}"));
        }

        fn session_ending(&mut self, _stats: &SessionStats) {
            self.events.borrow_mut().push("ending".to_string());
        }

        fn session_ended(&mut self, _stats: &SessionStats) {
            self.events.borrow_mut().push("ended".to_string());
        }
    }

    impl EffectSink for Recorder {
        fn play_cue(&mut self, action: &str, cue: &str) {
            self.events.borrow_mut().push(format!("cue {action} {cue}"));
        }

        fn show_judgment(&mut self, action: &str, judgment: Judgment) {
            self.events
                .borrow_mut()
                .push(format!("show {action} {judgment:?}"));
        }
    }

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.detector.history_len = 10;
        config.detector.raw_ring_len = 10;
        config.detector.min_beat_interval = 0.15;
        config.session.end_delay = 0.5;
        config
    }

    fn session_with(actions: Vec<ScheduledAction>) -> (BeatSession, Recorder) {
        let mut session = BeatSession::new(&test_config(), actions).unwrap();
        let recorder = Recorder::default();
        session.subscribe(Box::new(recorder.clone()));
        session.add_sink(Box::new(recorder.clone()));
        (session, recorder)
    }

    const WINDOW: f32 = 0.1;

    /// Drives quiet windows through the session until `until` seconds.
    fn run_quiet(session: &mut BeatSession, from: &mut f32, until: f32) {
        while *from < until {
            session.tick(&[0.0; 16], *from, WINDOW);
            *from += WINDOW;
        }
    }

    /// Emits one loud window (a beat candidate) at `now`.
    fn pulse(session: &mut BeatSession, now: f32) -> Option<BeatEvent> {
        session.tick(&[1.0; 16], now, WINDOW)
    }

    /// Warm up, then produce beats at 10.0 and 10.4 (quiet window between).
    fn two_beats(session: &mut BeatSession) {
        let mut now = 0.0;
        run_quiet(session, &mut now, 10.0);
        assert!(pulse(session, 10.0).is_some());
        session.tick(&[0.0; 16], 10.2, WINDOW);
        assert!(pulse(session, 10.4).is_some());
    }

    #[test]
    fn auto_action_fires_and_completes_the_session_once() {
        let (mut session, recorder) =
            session_with(vec![
                ScheduledAction::new("kick", 1, 1, false).with_cue("kick.wav")
            ]);

        let mut now = 0.0;
        run_quiet(&mut session, &mut now, 10.0);
        assert_eq!(session.phase(), SessionPhase::Running);

        pulse(&mut session, 10.0).expect("first pulse should be a beat");
        assert_eq!(session.stats().completed_actions, 1);
        assert!(matches!(session.phase(), SessionPhase::Ending { .. }));

        // 0.5 s end delay at 0.1 s per tick: ended after five more ticks,
        // and the ended notification fires exactly once.
        now = 10.1;
        run_quiet(&mut session, &mut now, 11.0);
        assert_eq!(session.phase(), SessionPhase::Ended);

        let events = recorder.events.borrow();
        assert_eq!(events.iter().filter(|e| *e == "ending").count(), 1);
        assert_eq!(events.iter().filter(|e| *e == "ended").count(), 1);
        assert!(events.contains(&"cue kick kick.wav".to_string()));
    }

    #[test]
    fn input_on_the_beat_is_judged_perfect() {
        let (mut session, recorder) = session_with(vec![ScheduledAction::new("drummer", 1, 2, true)]);

        two_beats(&mut session);
        // Beat 2 landed at 10.4; tempo seeded from the 0.4 s interval.
        let action = &session.actions()[0];
        assert_eq!(action.state, ActionState::AwaitingInput);
        assert_eq!(action.target_timestamp, 10.4);

        let judgment = session.handle_input("drummer", 10.42);
        assert_eq!(judgment, Some(Judgment::Perfect));
        assert_eq!(session.stats().perfect_count, 1);
        assert!(recorder
            .events
            .borrow()
            .contains(&"judged drummer Perfect".to_string()));
    }

    #[test]
    fn judging_a_fired_action_again_is_a_no_op() {
        let (mut session, recorder) = session_with(vec![ScheduledAction::new("drummer", 1, 2, true)]);

        two_beats(&mut session);
        assert!(session.handle_input("drummer", 10.42).is_some());
        let stats_before = *session.stats();

        assert_eq!(session.handle_input("drummer", 10.43), None);
        assert_eq!(*session.stats(), stats_before);

        let events = recorder.events.borrow();
        assert_eq!(
            events.iter().filter(|e| e.starts_with("judged")).count(),
            1
        );
    }

    #[test]
    fn stale_input_declines_then_the_action_expires_as_miss() {
        let (mut session, _recorder) = session_with(vec![
            ScheduledAction::new("drummer", 1, 1, true),
            ScheduledAction::new("bassist", 1, 2, true),
        ]);

        let mut now = 0.0;
        run_quiet(&mut session, &mut now, 10.0);
        pulse(&mut session, 10.0);
        assert_eq!(session.actions()[0].state, ActionState::AwaitingInput);

        // Advance to beat 2 without any input for beat 1.
        session.tick(&[0.0; 16], 10.2, WINDOW);
        pulse(&mut session, 10.4);

        // The first action expired as a miss when the coordinate advanced.
        assert_eq!(session.actions()[0].state, ActionState::Missed);
        assert_eq!(session.stats().miss_count, 1);

        // A late input for the stale target scores nothing further.
        assert_eq!(session.handle_input("drummer", 10.45), None);
        assert_eq!(session.stats().miss_count, 1);
    }

    #[test]
    fn fuzzy_target_resolution_reaches_the_pending_action() {
        let (mut session, _recorder) =
            session_with(vec![ScheduledAction::new("Drummer_01", 1, 2, true)]);

        two_beats(&mut session);
        // Case-insensitive + substring stages resolve the loose name.
        let candidate = session.candidate_action("drummer_01").unwrap();
        assert_eq!(candidate.name, "Drummer_01");

        let judgment = session.handle_input("drummer_01", 10.41);
        assert_eq!(judgment, Some(Judgment::Perfect));
    }

    #[test]
    fn reset_restores_a_finished_session() {
        let (mut session, _recorder) =
            session_with(vec![ScheduledAction::new("kick", 1, 1, false)]);

        let mut now = 0.0;
        run_quiet(&mut session, &mut now, 10.0);
        pulse(&mut session, 10.0);
        now = 10.1;
        run_quiet(&mut session, &mut now, 11.0);
        assert_eq!(session.phase(), SessionPhase::Ended);

        session.reset();
        assert_eq!(session.phase(), SessionPhase::Running);
        assert_eq!(*session.stats(), SessionStats::new(1));
        assert_eq!(session.actions()[0].state, ActionState::Armed);
        assert_eq!(session.detector().beat_count(), 0);
    }

    #[test]
    fn tracker_transitions_exactly_once() {
        let mut tracker = SessionEndTracker::new(0.3);
        let mut stats = SessionStats::new(2);

        assert_eq!(tracker.update(&stats, 0.1), None);

        stats.complete_action();
        stats.complete_action();
        assert_eq!(tracker.update(&stats, 0.1), Some(EndTransition::Ending));
        assert_eq!(tracker.update(&stats, 0.1), None);
        assert_eq!(tracker.update(&stats, 0.1), None);
        assert_eq!(tracker.update(&stats, 0.1), Some(EndTransition::Ended));
        assert_eq!(tracker.update(&stats, 0.1), None);
        assert_eq!(tracker.phase(), SessionPhase::Ended);
    }
}
