//! Input commands and the frame-loop state they drive.
//!
//! Commands are applied between two `update` calls only, which keeps the
//! frame loop the sole writer of the solver's gravity.

use serde::{Deserialize, Serialize};
use verlet_core::math::Vec2;
use verlet_core::Solver;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputCommand {
    /// Switch gravity between zero and its configured value.
    ToggleGravity,
    /// Pause or resume the particle emitter.
    ToggleEmit,
}

/// A command fired at the start of a given frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledInput {
    pub frame: u64,
    pub command: InputCommand,
}

impl ScheduledInput {
    /// Commands of `schedule` due at `frame`, in schedule order.
    pub fn due(schedule: &[ScheduledInput], frame: u64) -> impl Iterator<Item = InputCommand> + '_ {
        schedule
            .iter()
            .filter(move |input| input.frame == frame)
            .map(|input| input.command)
    }
}

/// Toggleable state owned by the frame loop.
#[derive(Debug, Clone)]
pub struct Controls {
    pub emit: bool,
    gravity_on: bool,
    gravity: Vec2,
}

impl Controls {
    /// `current` is the solver's gravity at start-up; gravity counts as on
    /// unless it is zero. Toggling it on always sets `gravity`.
    pub fn new(emit: bool, current: Vec2, gravity: Vec2) -> Self {
        Self {
            emit,
            gravity_on: current != Vec2::ZERO,
            gravity,
        }
    }

    pub fn gravity_on(&self) -> bool {
        self.gravity_on
    }

    pub fn apply(&mut self, command: InputCommand, solver: &mut Solver) {
        match command {
            InputCommand::ToggleGravity => {
                self.gravity_on = !self.gravity_on;
                solver.gravity = if self.gravity_on {
                    self.gravity
                } else {
                    Vec2::ZERO
                };
                tracing::info!(gravity = %solver.gravity, "gravity toggled");
            }
            InputCommand::ToggleEmit => {
                self.emit = !self.emit;
                tracing::info!(emit = self.emit, "emitter toggled");
            }
        }
    }
}
