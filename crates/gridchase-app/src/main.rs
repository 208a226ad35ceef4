use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use gridchase_app::{CourseConfig, CourseWorld, GreedyAvatar, RandomPursuers, TraceViewport};
use gridchase_core::{SimulationConfig, WorldModel};
use gridchase_replay::{ReplayAvatar, ReplayLog, ReplayPursuers, ReplayRecorder};
use gridchase_sim::{RunReport, Simulation};
use rand::{rngs::SmallRng, SeedableRng};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "gridchase", version, about = "Run the gridchase arcade simulation")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone)]
struct RunArgs {
    /// RNG seed; drawn from entropy when omitted (and logged, so the run
    /// can be reproduced).
    #[arg(long)]
    seed: Option<i64>,

    /// Per-tick thinking budget in milliseconds.
    #[arg(long, default_value_t = 40)]
    think_ms: u64,

    /// Cells on the ring course.
    #[arg(long, default_value_t = 24)]
    course_len: usize,

    /// Levels to clear.
    #[arg(long, default_value_t = 2)]
    levels: u32,

    /// Avatar lives.
    #[arg(long, default_value_t = 3)]
    lives: u32,

    /// Pursuer units.
    #[arg(long, default_value_t = 2)]
    pursuers: usize,

    /// Hard tick cap for the run; 0 disables the cap.
    #[arg(long, default_value_t = 0)]
    tick_limit: u64,

    /// Pace ticks in real time and log redraws.
    #[arg(long)]
    visualize: bool,

    /// Honor pause/step requests from controllers.
    #[arg(long)]
    pausable: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a live game with the scripted demo controllers.
    Run {
        #[command(flatten)]
        args: RunArgs,

        /// Record the action trace to this file.
        #[arg(long)]
        replay: Option<PathBuf>,
    },
    /// Re-drive a recorded game and verify it reaches the same outcome.
    Playback {
        #[command(flatten)]
        args: RunArgs,

        /// Replay file produced by a previous `run --replay`.
        replay: PathBuf,
    },
}

fn main() -> Result<()> {
    init_tracing();
    match Cli::parse().command {
        Command::Run { args, replay } => run_live(&args, replay),
        Command::Playback { args, replay } => run_playback(&args, &replay),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn sim_config(args: &RunArgs, replay_path: Option<PathBuf>) -> SimulationConfig {
    SimulationConfig {
        think_time_ms: args.think_ms,
        rng_seed: args.seed,
        visualize: args.visualize,
        pausable: args.pausable,
        replay_path,
        ..SimulationConfig::default()
    }
}

fn build_world(args: &RunArgs, seed: u64) -> Result<CourseWorld> {
    CourseWorld::new(
        CourseConfig {
            course_len: args.course_len,
            levels: args.levels,
            lives: args.lives,
            pursuers: args.pursuers,
            tick_limit: args.tick_limit,
        },
        SmallRng::seed_from_u64(seed),
    )
    .context("invalid course configuration")
}

fn run_live(args: &RunArgs, replay: Option<PathBuf>) -> Result<()> {
    let config = sim_config(args, replay);
    let seed = config.normalized_seed().unwrap_or_else(rand::random);
    info!(seed, "starting gridchase run");

    let world = build_world(args, seed)?;
    let replay_path = config.replay_path.clone();
    let mut sim = Simulation::new(config, world, GreedyAvatar)
        .context("configuring simulation")?
        .with_pursuers(RandomPursuers::new(SmallRng::seed_from_u64(seed ^ 1)))
        .with_viewport(TraceViewport);
    if let Some(path) = replay_path {
        sim = sim.with_sink(ReplayRecorder::new(path));
    }

    let report = sim.run().context("simulation run failed")?;
    log_report(&report);
    Ok(())
}

fn run_playback(args: &RunArgs, replay: &PathBuf) -> Result<()> {
    let config = sim_config(args, None);
    let seed = config
        .normalized_seed()
        .context("playback requires the --seed the run was recorded with")?;

    let log = ReplayLog::load(replay, args.pursuers)
        .with_context(|| format!("loading replay {}", replay.display()))?;
    info!(
        seed,
        levels = log.levels.len(),
        ticks = log.ticks().count(),
        "replaying recorded game"
    );

    let world = build_world(args, seed)?;
    let report = Simulation::new(config, world, ReplayAvatar::from_log(&log))
        .context("configuring playback")?
        .with_pursuers(ReplayPursuers::from_log(&log))
        .run()
        .context("playback run failed")?;
    log_report(&report);
    Ok(())
}

fn log_report(report: &RunReport<CourseWorld>) {
    info!(
        ticks = report.ticks,
        levels_completed = report.levels_completed,
        overruns = report.overruns,
        score = report.world.score(),
        lives = report.world.lives_remaining(),
        "game over"
    );
}
