//! Core types shared across the gridchase workspace.
//!
//! The simulation itself lives in `gridchase-sim`; this crate defines the
//! vocabulary both sides of the seam speak: ticks, movement actions, the
//! decisions controllers publish, the records the world emits when it
//! advances, and the [`WorldModel`] trait the scheduler drives.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// High level simulation clock (ticks processed since boot).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tick(pub u64);

impl Tick {
    /// Returns the next sequential tick.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Resets the tick counter back to zero.
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }
}

/// Discrete movement choice made by a controller for one tick.
///
/// The wire index matches the classic arcade framework ordering; `Neutral`
/// means "keep doing whatever the world considers the default".
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MoveAction {
    Up,
    Right,
    Down,
    Left,
    #[default]
    Neutral,
}

impl MoveAction {
    /// Stable numeric index used in replay files.
    #[must_use]
    pub const fn index(self) -> u8 {
        match self {
            Self::Up => 0,
            Self::Right => 1,
            Self::Down => 2,
            Self::Left => 3,
            Self::Neutral => 4,
        }
    }

    /// Inverse of [`MoveAction::index`].
    #[must_use]
    pub const fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::Up),
            1 => Some(Self::Right),
            2 => Some(Self::Down),
            3 => Some(Self::Left),
            4 => Some(Self::Neutral),
            _ => None,
        }
    }
}

/// Common surface of both decision types so pause handling and the
/// scheduler's snapshotting can stay role-agnostic.
pub trait Decision: Clone + Default + Send + 'static {
    fn pause_requested(&self) -> bool;
    fn step_requested(&self) -> bool;
    fn clear_step_request(&mut self);
}

/// The avatar controller's published decision for a tick.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AvatarDecision {
    pub action: MoveAction,
    pub pause_requested: bool,
    pub step_requested: bool,
}

impl Decision for AvatarDecision {
    fn pause_requested(&self) -> bool {
        self.pause_requested
    }

    fn step_requested(&self) -> bool {
        self.step_requested
    }

    fn clear_step_request(&mut self) {
        self.step_requested = false;
    }
}

/// The pursuer controller's published decision: one move per pursuer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PursuerDecision {
    pub actions: Vec<MoveAction>,
    pub pause_requested: bool,
    pub step_requested: bool,
}

impl PursuerDecision {
    /// All-neutral decision for a team of `count` pursuers.
    #[must_use]
    pub fn neutral(count: usize) -> Self {
        Self {
            actions: vec![MoveAction::Neutral; count],
            pause_requested: false,
            step_requested: false,
        }
    }
}

impl Decision for PursuerDecision {
    fn pause_requested(&self) -> bool {
        self.pause_requested
    }

    fn step_requested(&self) -> bool {
        self.step_requested
    }

    fn clear_step_request(&mut self) {
        self.step_requested = false;
    }
}

/// Record emitted by [`WorldModel::advance`] for exactly one tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TickRecord {
    pub tick: Tick,
    pub avatar_action: MoveAction,
    pub pursuer_actions: Vec<MoveAction>,
    /// True when this tick completed its level; replay lines break here.
    pub last_tick_of_level: bool,
}

/// Events computed by the scheduler after each advance by diffing the
/// world before and after. Controllers are notified from this list rather
/// than through ad hoc callback calls inside the advance path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum SimEvent {
    /// The level index changed; `level` is the level that just finished.
    LevelFinished { level: u32 },
    /// The avatar lost a life this tick.
    AvatarKilled { lives_remaining: u32 },
    /// The world reported game over after this tick.
    GameOver,
}

/// How a controller role observes the world while thinking.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum StateViewKind {
    /// Owned clone taken at session start; immune to concurrent mutation.
    #[default]
    Isolated,
    /// Shared handle to the live world; reads see the freshest state but
    /// contend on the world lock with the scheduler.
    Live,
}

/// Shared handle to the authoritative world, owned by the scheduler.
pub type SharedWorld<W> = Arc<Mutex<W>>;

/// The view actually handed to a thinking session.
#[derive(Debug)]
pub enum StateView<W> {
    Isolated(W),
    Live(SharedWorld<W>),
}

impl<W> StateView<W> {
    /// Run `f` against the observed world.
    ///
    /// For a live view this takes the world lock for the duration of `f`;
    /// keep observations short so the scheduler is not held up.
    pub fn with<R>(&self, f: impl FnOnce(&W) -> R) -> R {
        match self {
            Self::Isolated(world) => f(world),
            Self::Live(shared) => {
                // A poisoned lock means another thread panicked while
                // holding it; the snapshot data itself is still readable.
                let guard = shared.lock().unwrap_or_else(PoisonError::into_inner);
                f(&guard)
            }
        }
    }
}

/// Authoritative world snapshot driven by the scheduler.
///
/// `advance` is called at most once per scheduler iteration and must be a
/// deterministic function of the current state and the supplied actions.
/// Implementations must tolerate an empty pursuer slice (an unconfigured
/// pursuer team holds neutral) and a slice shorter than
/// [`WorldModel::pursuer_count`], treating missing entries as neutral.
pub trait WorldModel: Clone + Send + 'static {
    /// Whether the run has reached a terminal state.
    fn game_over(&self) -> bool;

    /// Zero-based index of the level currently in play.
    fn current_level(&self) -> u32;

    /// Lives the avatar has left.
    fn lives_remaining(&self) -> u32;

    /// Total ticks advanced since construction.
    fn total_ticks(&self) -> u64;

    /// Number of pursuer units in the world.
    fn pursuer_count(&self) -> usize;

    /// Advance the world by one tick. Returns `None` only when the world
    /// suppressed the tick as a no-op; the scheduler skips recording then.
    fn advance(&mut self, avatar: MoveAction, pursuers: &[MoveAction]) -> Option<TickRecord>;
}

/// Error boxed through [`TickSink`] results; sink failures abort the run.
pub type SinkError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Sink invoked by the scheduler after every advanced tick, and once more
/// when the run ends. The replay recorder is the canonical implementation.
pub trait TickSink: Send {
    fn on_tick(&mut self, record: &TickRecord, events: &[SimEvent]) -> Result<(), SinkError>;

    /// Called exactly once after the loop exits, before the run returns.
    fn on_run_end(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// No-op sink.
#[derive(Debug, Default)]
pub struct NullSink;

impl TickSink for NullSink {
    fn on_tick(&mut self, _record: &TickRecord, _events: &[SimEvent]) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Redraw seam for optional visualization; the core never renders.
pub trait Viewport<W>: Send {
    fn redraw(&mut self, world: &W);
}

/// No-op viewport used when visualization is disabled.
#[derive(Debug, Default)]
pub struct NullViewport;

impl<W> Viewport<W> for NullViewport {
    fn redraw(&mut self, _world: &W) {}
}

/// Errors raised when validating a [`SimulationConfig`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid simulation config: {0}")]
    InvalidConfig(&'static str),
}

/// Run-level configuration consumed by the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationConfig {
    /// Shared per-tick thinking budget in milliseconds for both roles.
    pub think_time_ms: u64,
    /// Optional RNG seed; negative values are normalized before use and a
    /// missing seed is drawn from entropy by the caller.
    pub rng_seed: Option<i64>,
    /// Whether to signal redraws and pace ticks in real time.
    pub visualize: bool,
    /// Whether controller pause/step requests are honored.
    pub pausable: bool,
    /// Destination for the recorded replay, if any.
    pub replay_path: Option<PathBuf>,
    /// How the avatar controller observes the world while thinking.
    pub avatar_view: StateViewKind,
    /// How the pursuer controller observes the world while thinking.
    pub pursuer_view: StateViewKind,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            think_time_ms: 40,
            rng_seed: None,
            visualize: false,
            pausable: false,
            replay_path: None,
            avatar_view: StateViewKind::Isolated,
            // Inherited asymmetry: the pursuer team historically observed
            // the live state. Both roles accept either kind.
            pursuer_view: StateViewKind::Live,
        }
    }
}

impl SimulationConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.think_time_ms == 0 {
            return Err(ConfigError::InvalidConfig("think_time_ms must be positive"));
        }
        Ok(())
    }

    /// Seed with the sign folded away, ready to feed a `SeedableRng`.
    #[must_use]
    pub fn normalized_seed(&self) -> Option<u64> {
        self.rng_seed.map(i64::unsigned_abs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_action_indices_are_stable() {
        for action in [
            MoveAction::Up,
            MoveAction::Right,
            MoveAction::Down,
            MoveAction::Left,
            MoveAction::Neutral,
        ] {
            assert_eq!(MoveAction::from_index(action.index()), Some(action));
        }
        assert_eq!(MoveAction::from_index(5), None);
    }

    #[test]
    fn zero_think_budget_is_rejected() {
        let config = SimulationConfig {
            think_time_ms: 0,
            ..SimulationConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidConfig("think_time_ms must be positive"))
        );
        assert!(SimulationConfig::default().validate().is_ok());
    }

    #[test]
    fn negative_seed_is_normalized() {
        let config = SimulationConfig {
            rng_seed: Some(-42),
            ..SimulationConfig::default()
        };
        assert_eq!(config.normalized_seed(), Some(42));
        assert_eq!(SimulationConfig::default().normalized_seed(), None);
    }

    #[test]
    fn step_flags_clear_without_touching_pause() {
        let mut decision = AvatarDecision {
            action: MoveAction::Left,
            pause_requested: true,
            step_requested: true,
        };
        decision.clear_step_request();
        assert!(decision.pause_requested);
        assert!(!decision.step_requested);

        let mut team = PursuerDecision::neutral(4);
        team.step_requested = true;
        team.clear_step_request();
        assert!(!team.step_requested);
        assert_eq!(team.actions.len(), 4);
    }

    #[test]
    fn isolated_view_reads_without_locking() {
        let view = StateView::Isolated(7u32);
        assert_eq!(view.with(|v| *v), 7);

        let shared: SharedWorld<u32> = Arc::new(Mutex::new(9));
        let view = StateView::Live(Arc::clone(&shared));
        assert_eq!(view.with(|v| *v), 9);
    }
}
