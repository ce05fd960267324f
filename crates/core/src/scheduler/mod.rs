use serde::{Deserialize, Serialize};

use crate::detector::BeatCoordinate;
use crate::judgment::Judgment;

/// Lifecycle of a scheduled action within one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionState {
    /// Waiting for its target coordinate to come up.
    #[default]
    Armed,
    /// The target coordinate has occurred; an input event may now be judged.
    AwaitingInput,
    /// Executed, either automatically or through a judged input.
    Fired,
    /// The coordinate advanced past the target without a qualifying input.
    Missed,
}

/// An action pinned to a (group, beat) coordinate. Created at configuration
/// time and reset, never destroyed, between sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledAction {
    pub name: String,
    pub target: BeatCoordinate,
    /// When false the action fires by itself as soon as its coordinate hits.
    pub requires_input: bool,
    /// Optional audio cue handed to the effect sinks on firing.
    pub cue: Option<String>,
    /// Optional animation sequence handed to the effect sinks on firing.
    pub animation: Option<String>,
    #[serde(skip)]
    pub state: ActionState,
    #[serde(skip)]
    pub target_timestamp: f32,
    #[serde(skip)]
    pub last_judgment: Judgment,
}

impl ScheduledAction {
    pub fn new(name: impl Into<String>, group: u32, beat: u32, requires_input: bool) -> Self {
        Self {
            name: name.into(),
            target: BeatCoordinate {
                group,
                beat: beat.clamp(1, 8),
            },
            requires_input,
            cue: None,
            animation: None,
            state: ActionState::Armed,
            target_timestamp: 0.0,
            last_judgment: Judgment::None,
        }
    }

    pub fn with_cue(mut self, cue: impl Into<String>) -> Self {
        self.cue = Some(cue.into());
        self
    }

    pub fn with_animation(mut self, sequence: impl Into<String>) -> Self {
        self.animation = Some(sequence.into());
        self
    }

    /// Returns the action to its pristine armed state.
    pub fn rearm(&mut self) {
        self.state = ActionState::Armed;
        self.target_timestamp = 0.0;
        self.last_judgment = Judgment::None;
    }
}

/// What happened to an action during a coordinate-change scan. Indices refer
/// to the scheduler's action list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// An automatic action fired.
    Fired(usize),
    /// An input-gated action became eligible for judgment.
    ArmedForInput(usize),
    /// An input-gated action went stale before any input arrived.
    Expired(usize),
}

/// Holds the session's action list and reacts to beat-coordinate changes.
#[derive(Debug, Default)]
pub struct ActionScheduler {
    actions: Vec<ScheduledAction>,
    last_coordinate: Option<BeatCoordinate>,
}

impl ActionScheduler {
    pub fn new(actions: Vec<ScheduledAction>) -> Self {
        Self {
            actions,
            last_coordinate: None,
        }
    }

    pub fn actions(&self) -> &[ScheduledAction] {
        &self.actions
    }

    pub fn actions_mut(&mut self) -> &mut [ScheduledAction] {
        &mut self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Processes a coordinate observation. Returns the outcomes produced by
    /// this scan; an unchanged coordinate produces nothing, so re-matching a
    /// coordinate never fires an action twice.
    pub fn advance(&mut self, coordinate: BeatCoordinate, now: f32) -> Vec<ScheduleOutcome> {
        if self.last_coordinate == Some(coordinate) {
            return Vec::new();
        }
        self.last_coordinate = Some(coordinate);

        let mut outcomes = Vec::new();

        // Input-gated actions left over from an earlier coordinate can no
        // longer be judged against a live target; retire them as misses so
        // the session completion count still converges.
        for (index, action) in self.actions.iter_mut().enumerate() {
            if action.state == ActionState::AwaitingInput && action.target != coordinate {
                action.state = ActionState::Missed;
                action.last_judgment = Judgment::Miss;
                outcomes.push(ScheduleOutcome::Expired(index));
            }
        }

        for (index, action) in self.actions.iter_mut().enumerate() {
            if action.target != coordinate || action.state != ActionState::Armed {
                continue;
            }
            action.target_timestamp = now;
            if action.requires_input {
                action.state = ActionState::AwaitingInput;
                outcomes.push(ScheduleOutcome::ArmedForInput(index));
            } else {
                action.state = ActionState::Fired;
                outcomes.push(ScheduleOutcome::Fired(index));
            }
        }

        outcomes
    }

    /// Indices of actions currently eligible for judgment.
    pub fn awaiting_input(&self) -> impl Iterator<Item = usize> + '_ {
        self.actions
            .iter()
            .enumerate()
            .filter(|(_, action)| action.state == ActionState::AwaitingInput)
            .map(|(index, _)| index)
    }

    /// Rearms every action and forgets the last observed coordinate.
    pub fn reset(&mut self) {
        for action in &mut self.actions {
            action.rearm();
        }
        self.last_coordinate = None;
    }
}
