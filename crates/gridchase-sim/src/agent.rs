//! Persistent background hosts for controller thinking sessions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use gridchase_core::{Decision, StateView, WorldModel};
use tracing::{debug, warn};

use crate::barrier::ActionBarrier;

/// A decision controller for one role of the game.
///
/// `think` runs on the host's background thread and publishes into `out`
/// as it refines its choice; the scheduler snapshots the cell whenever the
/// deadline expires, so partial updates must always leave the cell in a
/// usable state. The remaining hooks are lifecycle notifications delivered
/// between sessions.
pub trait Controller<W: WorldModel, D: Decision>: Send + 'static {
    /// Called once before the first tick with an isolated snapshot.
    fn reset(&mut self, world: &W);

    /// Run one thinking session, publishing into `out` before `deadline`.
    fn think(&mut self, view: StateView<W>, deadline: Instant, out: &DecisionCell<D>);

    /// A new level started; `world` is a fresh isolated snapshot.
    fn next_level(&mut self, _world: &W) {}

    /// The avatar lost a life. Only delivered to the avatar role.
    fn killed(&mut self) {}
}

/// Shared buffer a controller writes decisions into.
///
/// The scheduler reads a deep copy at snapshot time, so a controller that
/// keeps running past its deadline cannot mutate a decision the scheduler
/// already consumed.
#[derive(Debug)]
pub struct DecisionCell<D> {
    inner: Arc<Mutex<D>>,
}

impl<D> Clone for DecisionCell<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: Decision> Default for DecisionCell<D> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(D::default())),
        }
    }
}

impl<D: Decision> DecisionCell<D> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the buffered decision wholesale.
    pub fn publish(&self, decision: D) {
        *self.lock() = decision;
    }

    /// Mutate the buffered decision in place.
    pub fn update(&self, f: impl FnOnce(&mut D)) {
        f(&mut self.lock());
    }

    /// Deep copy of the buffered decision as of now.
    #[must_use]
    pub fn snapshot(&self) -> D {
        self.lock().clone()
    }

    /// Clear a consumed single-step request, leaving pause flags alone.
    pub fn clear_step_request(&self) {
        self.lock().clear_step_request();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, D> {
        // A controller that panicked mid-write poisons the cell; the data
        // is plain values and stays safe to read.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

enum Job<W> {
    Think {
        view: StateView<W>,
        deadline: Instant,
        barrier: ActionBarrier,
    },
    Reset(W),
    NextLevel(W),
    Killed,
    Stop,
}

/// Persistent background execution unit wrapping one controller.
///
/// The worker thread is spawned once and parks on its job queue between
/// sessions. Session submissions queue in FIFO order, so a `begin_thinking`
/// issued while the previous session is still running simply lines up
/// behind it, which is the contract for overrunning controllers.
pub struct AgentHost<W: WorldModel, D: Decision> {
    role: &'static str,
    jobs: Sender<Job<W>>,
    cell: DecisionCell<D>,
    thinking: Arc<AtomicBool>,
    alive: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl<W: WorldModel, D: Decision> AgentHost<W, D> {
    /// Spawn the worker thread hosting `controller`.
    pub fn spawn(role: &'static str, controller: impl Controller<W, D>) -> Self {
        let (jobs, queue) = mpsc::channel();
        let cell = DecisionCell::new();
        let thinking = Arc::new(AtomicBool::new(false));
        let alive = Arc::new(AtomicBool::new(true));

        let worker = {
            let cell = cell.clone();
            let thinking = Arc::clone(&thinking);
            thread::spawn(move || worker_loop(controller, &queue, &cell, &thinking, role))
        };

        Self {
            role,
            jobs,
            cell,
            thinking,
            alive,
            worker: Some(worker),
        }
    }

    /// Queue one thinking session against `view`, bounded by `deadline`.
    ///
    /// The host signals `barrier` when the session completes, however late
    /// that is; the scheduler discards the barrier at the deadline.
    pub fn begin_thinking(&self, view: StateView<W>, deadline: Instant, barrier: ActionBarrier) {
        self.submit(Job::Think {
            view,
            deadline,
            barrier,
        });
    }

    /// Whether a session is executing right now.
    #[must_use]
    pub fn is_thinking(&self) -> bool {
        self.thinking.load(Ordering::Acquire)
    }

    /// Deep copy of the controller's latest published decision.
    #[must_use]
    pub fn decision_snapshot(&self) -> D {
        self.cell.snapshot()
    }

    /// Clear a consumed single-step request.
    pub fn clear_step_request(&self) {
        self.cell.clear_step_request();
    }

    /// Deliver the pre-game reset with an isolated snapshot.
    pub fn reset(&self, world: W) {
        self.submit(Job::Reset(world));
    }

    /// Deliver a level-transition notification.
    pub fn notify_next_level(&self, world: W) {
        self.submit(Job::NextLevel(world));
    }

    /// Deliver a life-lost notification (avatar role only).
    pub fn notify_killed(&self) {
        self.submit(Job::Killed);
    }

    /// Stop the worker. Idempotent. A worker hung inside a session is
    /// abandoned rather than joined, matching the no-interruption rule.
    pub fn shutdown(&mut self) {
        if !self.alive.swap(false, Ordering::AcqRel) {
            return;
        }
        let _ = self.jobs.send(Job::Stop);
        if let Some(worker) = self.worker.take() {
            if self.is_thinking() {
                warn!(
                    role = self.role,
                    "controller still thinking at shutdown; leaking its worker thread"
                );
            } else {
                let _ = worker.join();
            }
        }
    }

    fn submit(&self, job: Job<W>) {
        if self.jobs.send(job).is_err() {
            // Worker already gone; only reachable after shutdown.
            debug!(role = self.role, "dropping job for stopped agent host");
        }
    }
}

impl<W: WorldModel, D: Decision> Drop for AgentHost<W, D> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop<W: WorldModel, D: Decision>(
    mut controller: impl Controller<W, D>,
    queue: &Receiver<Job<W>>,
    cell: &DecisionCell<D>,
    thinking: &AtomicBool,
    role: &'static str,
) {
    // Jobs queued ahead of the stop marker are still drained, so
    // notifications issued just before shutdown are delivered.
    while let Ok(job) = queue.recv() {
        match job {
            Job::Think {
                view,
                deadline,
                barrier,
            } => {
                thinking.store(true, Ordering::Release);
                controller.think(view, deadline, cell);
                thinking.store(false, Ordering::Release);
                barrier.arrive();
            }
            Job::Reset(world) => controller.reset(&world),
            Job::NextLevel(world) => controller.next_level(&world),
            Job::Killed => controller.killed(),
            Job::Stop => break,
        }
    }
    debug!(role, "agent host worker exiting");
}
