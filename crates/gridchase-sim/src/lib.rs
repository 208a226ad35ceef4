//! Real-time turn scheduler for the gridchase simulation.
//!
//! Once per tick the [`Simulation`] wakes both controller hosts, waits on a
//! deadline-bounded [`ActionBarrier`], snapshots whatever decisions are
//! available, consults the [`PauseController`], advances the world at most
//! once, and forwards the resulting record to the configured sinks.
//! Controllers that overrun the budget are logged and abandoned for the
//! tick, never interrupted.

pub mod agent;
pub mod barrier;
pub mod pause;
pub mod scheduler;

pub use agent::{AgentHost, Controller, DecisionCell};
pub use barrier::ActionBarrier;
pub use pause::{PauseController, PauseVerdict};
pub use scheduler::{RunReport, SimError, Simulation};
