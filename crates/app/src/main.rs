use std::path::PathBuf;

use beat_coach_core::{
    ActionState, AppConfig, AudioInput, BeatEvent, BeatSession, Judgment, PulseTrain,
    ScheduledAction, SessionObserver, SessionPhase, SessionStats,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

fn main() -> beat_coach_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            bpm,
            groups,
            input_offset_ms,
            config,
        } => run_simulate(bpm, groups, input_offset_ms, config.as_deref()),
        Commands::ValidateConfig { path } => run_validate(&path),
    }
}

/// Runs a full session against a synthetic click track, answering every
/// input-gated action with a scripted key press.
fn run_simulate(
    bpm: f32,
    groups: u32,
    input_offset_ms: f32,
    config_path: Option<&std::path::Path>,
) -> beat_coach_core::Result<()> {
    tracing::info!(bpm, groups, input_offset_ms, "starting simulation");

    let config = match config_path {
        Some(path) => AppConfig::from_json_path(path)?,
        None => AppConfig::default(),
    };

    let mut actions = Vec::new();
    for group in 1..=groups {
        for beat in 1..=8 {
            let name = format!("target_g{group}_b{beat}");
            let action = if beat % 2 == 0 {
                ScheduledAction::new(name, group, beat, true)
            } else {
                ScheduledAction::new(name, group, beat, false).with_cue("click")
            };
            actions.push(action);
        }
    }

    let mut session = BeatSession::new(&config, actions)?;
    session.subscribe(Box::new(LogObserver));

    let window = config.audio.window_duration;
    let warmup = config.detector.history_len as f32 * window;
    let beat_interval = 60.0 / bpm;
    let duration =
        warmup + (groups * 8 + 2) as f32 * beat_interval + config.session.end_delay + 1.0;

    let mut source = PulseTrain::new(config.audio.sample_rate, bpm, duration)?;
    let mut buffer = vec![0.0_f32; config.audio.window_len()];
    let mut now = 0.0;

    while source.is_active() && session.phase() != SessionPhase::Ended {
        source.snapshot(&mut buffer)?;
        session.tick(&buffer, now, window);

        // Script the player: answer each newly armed action with an input
        // slightly off the beat.
        let pending: Vec<(String, f32)> = session
            .actions()
            .iter()
            .filter(|action| action.state == ActionState::AwaitingInput)
            .map(|action| (action.name.clone(), action.target_timestamp))
            .collect();
        for (name, target_timestamp) in pending {
            session.handle_input(&name, target_timestamp + input_offset_ms / 1000.0);
        }

        now += window;
    }

    let stats = session.stats();
    tracing::info!(
        perfect = stats.perfect_count,
        good = stats.good_count,
        miss = stats.miss_count,
        completed = stats.completed_actions,
        total = stats.total_actions,
        phase = ?session.phase(),
        "simulation finished"
    );
    Ok(())
}

fn run_validate(path: &PathBuf) -> beat_coach_core::Result<()> {
    let config = AppConfig::from_json_path(path)?;
    tracing::info!(?path, ?config, "configuration is valid");
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

/// Forwards session notifications to the log.
struct LogObserver;

impl SessionObserver for LogObserver {
    fn beat_occurred(&mut self, beat: &BeatEvent) {
        tracing::debug!(
            index = beat.index,
            group = beat.group_number,
            beat = beat.beat_in_group,
            "beat"
        );
    }

    fn action_judged(&mut self, action: &str, judgment: Judgment) {
        tracing::info!(action, ?judgment, "judged");
    }

    fn session_ending(&mut self, stats: &SessionStats) {
        tracing::info!(completed = stats.completed_actions, "session ending");
    }

    fn session_ended(&mut self, stats: &SessionStats) {
        tracing::info!(
            perfect = stats.perfect_count,
            good = stats.good_count,
            miss = stats.miss_count,
            "session ended"
        );
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Beat detection and timing-judgment trainer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a synthetic click-track session with scripted inputs.
    Simulate {
        /// Tempo of the synthetic click track.
        #[arg(long, default_value_t = 120.0)]
        bpm: f32,
        /// Number of eight-beat groups to schedule actions for.
        #[arg(long, default_value_t = 2)]
        groups: u32,
        /// How far off the beat the scripted inputs land, in milliseconds.
        #[arg(long, default_value_t = 20.0)]
        input_offset_ms: f32,
        /// Optional configuration file to load.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Load a configuration file and report whether it is valid.
    ValidateConfig {
        /// Path to the JSON configuration file.
        path: PathBuf,
    },
}
