//! Scripted reference controllers for the demo world.

use std::time::Instant;

use gridchase_core::{
    AvatarDecision, MoveAction, PursuerDecision, StateView, Viewport, WorldModel,
};
use gridchase_sim::{Controller, DecisionCell};
use rand::{rngs::SmallRng, Rng};
use tracing::debug;

use crate::course::CourseWorld;

/// Pursuer team choosing a uniformly random legal move per unit each tick.
#[derive(Debug)]
pub struct RandomPursuers {
    rng: SmallRng,
}

impl RandomPursuers {
    #[must_use]
    pub fn new(rng: SmallRng) -> Self {
        Self { rng }
    }
}

impl<W: WorldModel> Controller<W, PursuerDecision> for RandomPursuers {
    fn reset(&mut self, _world: &W) {}

    fn think(
        &mut self,
        view: StateView<W>,
        _deadline: Instant,
        out: &DecisionCell<PursuerDecision>,
    ) {
        let count = view.with(WorldModel::pursuer_count);
        let actions: Vec<MoveAction> = (0..count)
            .map(|_| {
                if self.rng.gen_bool(0.5) {
                    MoveAction::Right
                } else {
                    MoveAction::Left
                }
            })
            .collect();
        out.update(|decision| decision.actions = actions);
    }
}

/// Pursuer team that walks each unit along the shorter arc to the avatar.
#[derive(Debug, Default)]
pub struct HomingPursuers;

impl Controller<CourseWorld, PursuerDecision> for HomingPursuers {
    fn reset(&mut self, _world: &CourseWorld) {}

    fn think(
        &mut self,
        view: StateView<CourseWorld>,
        _deadline: Instant,
        out: &DecisionCell<PursuerDecision>,
    ) {
        let actions = view.with(|world| {
            let len = world.course_len();
            let target = world.avatar_cell();
            world
                .pursuer_cells()
                .iter()
                .map(|&cell| {
                    if cell == target {
                        MoveAction::Neutral
                    } else if (target + len - cell) % len <= len / 2 {
                        MoveAction::Right
                    } else {
                        MoveAction::Left
                    }
                })
                .collect()
        });
        out.update(|decision| decision.actions = actions);
    }
}

/// Avatar that walks toward the nearest pellet, reversing when that walk
/// would step straight into a pursuer.
#[derive(Debug, Default)]
pub struct GreedyAvatar;

impl Controller<CourseWorld, AvatarDecision> for GreedyAvatar {
    fn reset(&mut self, _world: &CourseWorld) {}

    fn think(
        &mut self,
        view: StateView<CourseWorld>,
        _deadline: Instant,
        out: &DecisionCell<AvatarDecision>,
    ) {
        let action = view.with(|world| {
            let len = world.course_len();
            let cell = world.avatar_cell();
            let pellets = world.pellets();

            let mut clockwise = None;
            let mut counter = None;
            for distance in 1..len {
                if clockwise.is_none() && pellets[(cell + distance) % len] {
                    clockwise = Some(distance);
                }
                if counter.is_none() && pellets[(cell + len - distance) % len] {
                    counter = Some(distance);
                }
                if clockwise.is_some() && counter.is_some() {
                    break;
                }
            }

            let preferred = match (clockwise, counter) {
                (Some(cw), Some(ccw)) if ccw < cw => MoveAction::Left,
                (Some(_), _) => MoveAction::Right,
                (None, Some(_)) => MoveAction::Left,
                (None, None) => MoveAction::Neutral,
            };

            // Never walk face-first into a pursuer.
            let next = match preferred {
                MoveAction::Right => (cell + 1) % len,
                MoveAction::Left => (cell + len - 1) % len,
                _ => cell,
            };
            if world.pursuer_cells().contains(&next) {
                match preferred {
                    MoveAction::Right => MoveAction::Left,
                    MoveAction::Left => MoveAction::Right,
                    other => other,
                }
            } else {
                preferred
            }
        });
        out.update(|decision| decision.action = action);
    }
}

/// Logs a one-line course summary per redraw.
#[derive(Debug, Default)]
pub struct TraceViewport;

impl Viewport<CourseWorld> for TraceViewport {
    fn redraw(&mut self, world: &CourseWorld) {
        debug!(
            tick = world.total_ticks(),
            level = world.current_level(),
            lives = world.lives_remaining(),
            score = world.score(),
            avatar = world.avatar_cell(),
            "redraw"
        );
    }
}
