//! Pause and single-step policy evaluated from controller decisions.

use gridchase_core::Decision;

/// Outcome of one pause evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PauseVerdict {
    /// Whether the scheduler may advance the world this tick.
    pub advance: bool,
    /// Whether consumed step requests must be cleared after this tick.
    pub clear_step_requests: bool,
}

impl PauseVerdict {
    const RUN: Self = Self {
        advance: true,
        clear_step_requests: false,
    };

    const HOLD: Self = Self {
        advance: false,
        clear_step_requests: false,
    };

    const STEP: Self = Self {
        advance: true,
        clear_step_requests: true,
    };
}

/// Interprets pause/step flags published by either controller.
///
/// Disabled outside pausable runs. While paused, a step request from
/// either role buys exactly one advance; the step flags are then cleared
/// while the pause flags stay untouched, so the run remains paused until
/// a controller drops its pause request.
#[derive(Debug, Clone, Copy)]
pub struct PauseController {
    enabled: bool,
}

impl PauseController {
    #[must_use]
    pub const fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Evaluate the snapshotted decisions for this tick.
    pub fn evaluate<A: Decision, P: Decision>(
        &self,
        avatar: &A,
        pursuers: Option<&P>,
    ) -> PauseVerdict {
        if !self.enabled {
            return PauseVerdict::RUN;
        }
        let paused = avatar.pause_requested()
            || pursuers.is_some_and(Decision::pause_requested);
        if !paused {
            return PauseVerdict::RUN;
        }
        let step = avatar.step_requested()
            || pursuers.is_some_and(Decision::step_requested);
        if step {
            PauseVerdict::STEP
        } else {
            PauseVerdict::HOLD
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridchase_core::{AvatarDecision, PursuerDecision};

    fn avatar(pause: bool, step: bool) -> AvatarDecision {
        AvatarDecision {
            pause_requested: pause,
            step_requested: step,
            ..AvatarDecision::default()
        }
    }

    #[test]
    fn disabled_controller_always_advances() {
        let controller = PauseController::new(false);
        let verdict =
            controller.evaluate::<_, PursuerDecision>(&avatar(true, false), None);
        assert_eq!(verdict, PauseVerdict::RUN);
    }

    #[test]
    fn pause_without_step_holds_the_tick() {
        let controller = PauseController::new(true);
        let verdict =
            controller.evaluate::<_, PursuerDecision>(&avatar(true, false), None);
        assert_eq!(verdict, PauseVerdict::HOLD);
    }

    #[test]
    fn step_while_paused_advances_once_and_clears_flags() {
        let controller = PauseController::new(true);
        let verdict =
            controller.evaluate::<_, PursuerDecision>(&avatar(true, true), None);
        assert_eq!(verdict, PauseVerdict::STEP);
    }

    #[test]
    fn either_role_can_pause_or_step() {
        let controller = PauseController::new(true);
        let mut team = PursuerDecision::neutral(2);
        team.pause_requested = true;
        assert_eq!(
            controller.evaluate(&avatar(false, false), Some(&team)),
            PauseVerdict::HOLD
        );

        // Pursuers paused, avatar supplies the step request.
        assert_eq!(
            controller.evaluate(&avatar(false, true), Some(&team)),
            PauseVerdict::STEP
        );
    }

    #[test]
    fn unpaused_step_requests_are_not_consumed() {
        let controller = PauseController::new(true);
        let verdict =
            controller.evaluate::<_, PursuerDecision>(&avatar(false, true), None);
        assert_eq!(verdict, PauseVerdict::RUN);
    }
}
