//! A minimal deterministic arcade world: a ring of cells with pellets,
//! one avatar, and a team of pursuers.
//!
//! This is a demo fixture, not an engine; it exists so the scheduler has
//! something real to drive end to end. The avatar clears pellets to finish
//! a level, contact with a pursuer costs a life, and the run ends when the
//! configured level count is cleared or the lives run out.

use gridchase_core::{ConfigError, MoveAction, Tick, TickRecord, WorldModel};
use rand::{rngs::SmallRng, Rng};

/// Shape of a course world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseConfig {
    /// Number of cells on the ring.
    pub course_len: usize,
    /// Levels to clear before the game is won.
    pub levels: u32,
    /// Avatar lives.
    pub lives: u32,
    /// Pursuer units on the course.
    pub pursuers: usize,
    /// Hard tick cap for the whole run; 0 disables the cap.
    pub tick_limit: u64,
}

impl Default for CourseConfig {
    fn default() -> Self {
        Self {
            course_len: 24,
            levels: 2,
            lives: 3,
            pursuers: 2,
            tick_limit: 0,
        }
    }
}

impl CourseConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.course_len < 4 {
            return Err(ConfigError::InvalidConfig("course_len must be at least 4"));
        }
        if self.levels == 0 {
            return Err(ConfigError::InvalidConfig("levels must be positive"));
        }
        if self.lives == 0 {
            return Err(ConfigError::InvalidConfig("lives must be positive"));
        }
        Ok(())
    }
}

/// Ring-course world state. Cloning yields an isolated snapshot; the RNG
/// is part of the state, so identical action sequences replay to
/// identical worlds.
#[derive(Debug, Clone)]
pub struct CourseWorld {
    config: CourseConfig,
    rng: SmallRng,
    tick: u64,
    level: u32,
    lives: u32,
    score: u64,
    avatar_cell: usize,
    pursuer_cells: Vec<usize>,
    pellets: Vec<bool>,
    pellets_remaining: usize,
}

impl CourseWorld {
    /// Build a fresh world. The RNG is supplied by the caller so seeding
    /// stays an explicit, per-run decision.
    pub fn new(config: CourseConfig, rng: SmallRng) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut world = Self {
            rng,
            tick: 0,
            level: 0,
            lives: config.lives,
            score: 0,
            avatar_cell: 0,
            pursuer_cells: Vec::new(),
            pellets: Vec::new(),
            pellets_remaining: 0,
            config,
        };
        world.reset_level();
        Ok(world)
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn avatar_cell(&self) -> usize {
        self.avatar_cell
    }

    pub fn pursuer_cells(&self) -> &[usize] {
        &self.pursuer_cells
    }

    pub fn pellets(&self) -> &[bool] {
        &self.pellets
    }

    pub fn course_len(&self) -> usize {
        self.config.course_len
    }

    /// Pellets back on every cell except the avatar's start, everyone to
    /// their home positions.
    fn reset_level(&mut self) {
        let len = self.config.course_len;
        self.avatar_cell = 0;
        self.pellets = vec![true; len];
        self.pellets[0] = false;
        self.pellets_remaining = len - 1;
        self.pursuer_cells = (0..self.config.pursuers)
            .map(|i| (len * (i + 1)) / (self.config.pursuers + 1))
            .collect();
    }

    /// Avatar back to start; pursuers scattered to random cells on the far
    /// half of the ring. Pellets stay as they were.
    fn reset_positions_after_death(&mut self) {
        let len = self.config.course_len;
        self.avatar_cell = 0;
        for cell in &mut self.pursuer_cells {
            *cell = len / 4 + self.rng.gen_range(0..len / 2);
        }
    }

    fn step_cell(&self, cell: usize, action: MoveAction) -> usize {
        let len = self.config.course_len;
        match action {
            MoveAction::Right | MoveAction::Up => (cell + 1) % len,
            MoveAction::Left | MoveAction::Down => (cell + len - 1) % len,
            MoveAction::Neutral => cell,
        }
    }
}

impl WorldModel for CourseWorld {
    fn game_over(&self) -> bool {
        self.lives == 0
            || self.level >= self.config.levels
            || (self.config.tick_limit != 0 && self.tick >= self.config.tick_limit)
    }

    fn current_level(&self) -> u32 {
        self.level
    }

    fn lives_remaining(&self) -> u32 {
        self.lives
    }

    fn total_ticks(&self) -> u64 {
        self.tick
    }

    fn pursuer_count(&self) -> usize {
        self.config.pursuers
    }

    fn advance(&mut self, avatar: MoveAction, pursuers: &[MoveAction]) -> Option<TickRecord> {
        if self.game_over() {
            return None;
        }
        self.tick += 1;

        self.avatar_cell = self.step_cell(self.avatar_cell, avatar);
        if self.pellets[self.avatar_cell] {
            self.pellets[self.avatar_cell] = false;
            self.pellets_remaining -= 1;
            self.score += 10;
        }

        let mut applied = Vec::with_capacity(self.config.pursuers);
        for i in 0..self.config.pursuers {
            let action = pursuers.get(i).copied().unwrap_or_default();
            self.pursuer_cells[i] = self.step_cell(self.pursuer_cells[i], action);
            applied.push(action);
        }

        if self.pursuer_cells.contains(&self.avatar_cell) {
            self.lives -= 1;
            if self.lives > 0 {
                self.reset_positions_after_death();
            }
        }

        let mut last_tick_of_level = false;
        if self.pellets_remaining == 0 {
            last_tick_of_level = true;
            self.level += 1;
            self.score += 100;
            if self.level < self.config.levels {
                self.reset_level();
            }
        }

        Some(TickRecord {
            tick: Tick(self.tick),
            avatar_action: avatar,
            pursuer_actions: applied,
            last_tick_of_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn world(config: CourseConfig) -> CourseWorld {
        CourseWorld::new(config, SmallRng::seed_from_u64(7)).expect("world")
    }

    #[test]
    fn config_is_validated() {
        let err = CourseWorld::new(
            CourseConfig {
                course_len: 2,
                ..CourseConfig::default()
            },
            SmallRng::seed_from_u64(0),
        )
        .expect_err("short course");
        assert_eq!(err, ConfigError::InvalidConfig("course_len must be at least 4"));
    }

    #[test]
    fn clearing_all_pellets_finishes_the_level() {
        let mut world = world(CourseConfig {
            course_len: 4,
            levels: 1,
            lives: 1,
            pursuers: 0,
            tick_limit: 0,
        });
        // Walk the ring once; the last pellet falls on the wrap-around.
        for expected_tick in 1..=3 {
            let record = world
                .advance(MoveAction::Right, &[])
                .expect("tick record");
            assert_eq!(record.tick, Tick(expected_tick));
            assert_eq!(record.last_tick_of_level, expected_tick == 3);
        }
        assert!(world.game_over());
        assert_eq!(world.score(), 3 * 10 + 100);
        assert!(world.advance(MoveAction::Right, &[]).is_none());
    }

    #[test]
    fn pursuer_contact_costs_a_life_and_resets_positions() {
        let mut world = world(CourseConfig {
            course_len: 8,
            levels: 1,
            lives: 2,
            pursuers: 1,
            tick_limit: 0,
        });
        // Single pursuer homes at cell 4; march them into the avatar.
        let mut lived = false;
        for _ in 0..8 {
            let lives_before = world.lives_remaining();
            world
                .advance(MoveAction::Right, &[MoveAction::Left])
                .expect("tick record");
            if world.lives_remaining() < lives_before {
                lived = true;
                assert_eq!(world.avatar_cell(), 0, "avatar returns to start");
                break;
            }
        }
        assert!(lived, "head-on walk must produce a contact");
    }

    #[test]
    fn identical_seeds_and_actions_replay_identically() {
        let config = CourseConfig::default();
        let mut a = CourseWorld::new(config.clone(), SmallRng::seed_from_u64(99)).expect("a");
        let mut b = CourseWorld::new(config, SmallRng::seed_from_u64(99)).expect("b");
        let script = [
            MoveAction::Right,
            MoveAction::Right,
            MoveAction::Left,
            MoveAction::Neutral,
            MoveAction::Right,
        ];
        for action in script {
            let ra = a.advance(action, &[MoveAction::Left, MoveAction::Right]);
            let rb = b.advance(action, &[MoveAction::Left, MoveAction::Right]);
            assert_eq!(ra, rb);
        }
        assert_eq!(a.score(), b.score());
        assert_eq!(a.avatar_cell(), b.avatar_cell());
        assert_eq!(a.pursuer_cells(), b.pursuer_cells());
    }
}
