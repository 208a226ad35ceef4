//! The per-tick loop orchestrating hosts, barrier, pause policy, and sinks.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use gridchase_core::{
    AvatarDecision, ConfigError, MoveAction, NullViewport, PursuerDecision, SharedWorld, SimEvent,
    SimulationConfig, SinkError, StateView, StateViewKind, TickSink, Viewport, WorldModel,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::agent::{AgentHost, Controller};
use crate::barrier::ActionBarrier;
use crate::pause::PauseController;

/// Slack below this threshold is not worth sleeping for.
const MIN_SLACK_SLEEP: Duration = Duration::from_millis(4);

/// Errors that abort a simulation run.
#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A tick sink (typically the replay recorder) failed. Fatal, because
    /// an incomplete replay breaks the reproducibility guarantee.
    #[error("tick sink failed: {0}")]
    Sink(SinkError),
}

/// Outcome of a completed run.
#[derive(Debug)]
pub struct RunReport<W> {
    /// Total ticks the world advanced.
    pub ticks: u64,
    /// Levels finished before the terminal state.
    pub levels_completed: u32,
    /// Thinking sessions that blew the deadline, across both roles.
    pub overruns: u64,
    /// The terminal world state.
    pub world: W,
}

/// Top-level turn scheduler.
///
/// Owns the world behind a [`SharedWorld`] handle, one [`AgentHost`] per
/// configured role, and the sinks that consume tick records. Built with
/// [`Simulation::new`] plus the `with_*` builders, then consumed by
/// [`Simulation::run`].
pub struct Simulation<W: WorldModel> {
    config: SimulationConfig,
    world: SharedWorld<W>,
    avatar: AgentHost<W, AvatarDecision>,
    pursuers: Option<AgentHost<W, PursuerDecision>>,
    pause: PauseController,
    viewport: Box<dyn Viewport<W>>,
    sinks: Vec<Box<dyn TickSink>>,
}

impl<W: WorldModel> Simulation<W> {
    /// Validate `config` and stand up the avatar host.
    pub fn new(
        config: SimulationConfig,
        world: W,
        avatar: impl Controller<W, AvatarDecision>,
    ) -> Result<Self, SimError> {
        config.validate()?;
        Ok(Self {
            pause: PauseController::new(config.pausable),
            avatar: AgentHost::spawn("avatar", avatar),
            pursuers: None,
            viewport: Box::new(NullViewport),
            sinks: Vec::new(),
            world: Arc::new(Mutex::new(world)),
            config,
        })
    }

    /// Attach the pursuer team controller.
    #[must_use]
    pub fn with_pursuers(mut self, controller: impl Controller<W, PursuerDecision>) -> Self {
        self.pursuers = Some(AgentHost::spawn("pursuers", controller));
        self
    }

    /// Replace the no-op viewport.
    #[must_use]
    pub fn with_viewport(mut self, viewport: impl Viewport<W> + 'static) -> Self {
        self.viewport = Box::new(viewport);
        self
    }

    /// Attach a tick sink; sinks run in attachment order.
    #[must_use]
    pub fn with_sink(mut self, sink: impl TickSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Handle onto the live world, for observers outside the loop.
    #[must_use]
    pub fn world_handle(&self) -> SharedWorld<W> {
        Arc::clone(&self.world)
    }

    /// Drive the loop until the world reports game over.
    ///
    /// Hosts are shut down and sinks flushed exactly once, also on the
    /// error path.
    pub fn run(self) -> Result<RunReport<W>, SimError> {
        let Self {
            config,
            world,
            mut avatar,
            mut pursuers,
            pause,
            mut viewport,
            mut sinks,
        } = self;

        let outcome = run_loop(
            &config,
            &world,
            &avatar,
            pursuers.as_ref(),
            pause,
            viewport.as_mut(),
            &mut sinks,
        );

        avatar.shutdown();
        if let Some(host) = pursuers.as_mut() {
            host.shutdown();
        }

        // Final flush happens on both paths; a flush failure only becomes
        // the run's error when the loop itself succeeded.
        let mut outcome = outcome;
        for sink in &mut sinks {
            if let Err(err) = sink.on_run_end() {
                if outcome.is_ok() {
                    outcome = Err(SimError::Sink(err));
                } else {
                    warn!(error = %err, "tick sink failed again during final flush");
                }
            }
        }
        let stats = outcome?;

        let world = match Arc::try_unwrap(world) {
            Ok(mutex) => mutex.into_inner().unwrap_or_else(PoisonError::into_inner),
            // A controller kept a live view handle alive; fall back to a
            // clone of the terminal state.
            Err(shared) => shared
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        };

        info!(
            ticks = world.total_ticks(),
            levels_completed = stats.levels_completed,
            overruns = stats.overruns,
            "simulation finished"
        );
        Ok(RunReport {
            ticks: world.total_ticks(),
            levels_completed: stats.levels_completed,
            overruns: stats.overruns,
            world,
        })
    }
}

#[derive(Debug, Default)]
struct LoopStats {
    levels_completed: u32,
    overruns: u64,
}

fn lock_world<W>(world: &SharedWorld<W>) -> MutexGuard<'_, W> {
    world.lock().unwrap_or_else(PoisonError::into_inner)
}

fn make_view<W: WorldModel>(kind: StateViewKind, world: &SharedWorld<W>) -> StateView<W> {
    match kind {
        StateViewKind::Isolated => StateView::Isolated(lock_world(world).clone()),
        StateViewKind::Live => StateView::Live(Arc::clone(world)),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_loop<W: WorldModel>(
    config: &SimulationConfig,
    world: &SharedWorld<W>,
    avatar: &AgentHost<W, AvatarDecision>,
    pursuers: Option<&AgentHost<W, PursuerDecision>>,
    pause: PauseController,
    viewport: &mut dyn Viewport<W>,
    sinks: &mut [Box<dyn TickSink>],
) -> Result<LoopStats, SimError> {
    let think_budget = Duration::from_millis(config.think_time_ms);
    let mut stats = LoopStats::default();

    {
        let snapshot = lock_world(world).clone();
        avatar.reset(snapshot.clone());
        if let Some(host) = pursuers {
            host.reset(snapshot);
        }
    }

    loop {
        let tick_now = {
            let guard = lock_world(world);
            if guard.game_over() {
                break;
            }
            guard.total_ticks()
        };

        // 1. One shared deadline for both thinking sessions.
        let deadline = Instant::now() + think_budget;
        let active_agents = 1 + usize::from(pursuers.is_some());
        let barrier = ActionBarrier::new(active_agents);

        avatar.begin_thinking(
            make_view(config.avatar_view, world),
            deadline,
            barrier.clone(),
        );
        if let Some(host) = pursuers {
            host.begin_thinking(
                make_view(config.pursuer_view, world),
                deadline,
                barrier.clone(),
            );
        }

        // 2. Completion or deadline, whichever first.
        if !barrier.wait_until(deadline) {
            if avatar.is_thinking() {
                stats.overruns += 1;
                warn!(
                    tick = tick_now,
                    role = "avatar",
                    budget_ms = config.think_time_ms,
                    "controller overran its think budget; using last published decision"
                );
            }
            if let Some(host) = pursuers {
                if host.is_thinking() {
                    stats.overruns += 1;
                    warn!(
                        tick = tick_now,
                        role = "pursuers",
                        budget_ms = config.think_time_ms,
                        "controller overran its think budget; using last published decision"
                    );
                }
            }
        }
        // Dropping our handle discards the barrier; late arrivals from
        // abandoned sessions land on it without effect.
        drop(barrier);

        // 3. Snapshot decisions so late writes cannot alter this tick.
        let avatar_decision = avatar.decision_snapshot();
        let pursuer_decision = pursuers.map(AgentHost::decision_snapshot);

        // 4. Pause policy.
        let verdict = pause.evaluate(&avatar_decision, pursuer_decision.as_ref());
        if verdict.clear_step_requests {
            avatar.clear_step_request();
            if let Some(host) = pursuers {
                host.clear_step_request();
            }
        }

        // 5. Advance at most once, diffing for events while holding the lock.
        if verdict.advance {
            let (record, events) = {
                let mut guard = lock_world(world);
                let level_before = guard.current_level();
                let lives_before = guard.lives_remaining();
                let pursuer_actions: Vec<MoveAction> = pursuer_decision
                    .map(|decision| decision.actions)
                    .unwrap_or_default();
                let record = guard.advance(avatar_decision.action, &pursuer_actions);

                let mut events = Vec::new();
                if guard.current_level() != level_before {
                    events.push(SimEvent::LevelFinished {
                        level: level_before,
                    });
                }
                if guard.lives_remaining() < lives_before {
                    events.push(SimEvent::AvatarKilled {
                        lives_remaining: guard.lives_remaining(),
                    });
                }
                if guard.game_over() {
                    events.push(SimEvent::GameOver);
                }
                (record, events)
            };

            if let Some(record) = &record {
                for sink in sinks.iter_mut() {
                    sink.on_tick(record, &events).map_err(SimError::Sink)?;
                }
            } else {
                debug!(tick = tick_now, "world suppressed the tick");
            }

            // 6. Drain events into controller notifications.
            for event in &events {
                match event {
                    SimEvent::LevelFinished { .. } => {
                        stats.levels_completed += 1;
                        let snapshot = lock_world(world).clone();
                        avatar.notify_next_level(snapshot.clone());
                        if let Some(host) = pursuers {
                            host.notify_next_level(snapshot);
                        }
                    }
                    SimEvent::AvatarKilled { .. } => avatar.notify_killed(),
                    SimEvent::GameOver => {}
                }
            }
        }

        // 7. Redraw and burn remaining slack, outside the critical path.
        if config.visualize {
            {
                let guard = lock_world(world);
                viewport.redraw(&guard);
            }
            let slack = deadline.saturating_duration_since(Instant::now());
            if slack >= MIN_SLACK_SLEEP {
                thread::sleep(slack);
            }
        }
    }

    Ok(stats)
}
