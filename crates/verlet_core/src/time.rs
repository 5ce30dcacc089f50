//! Simulation time
//!
//! Fixed 60Hz frame rate; each frame is split into solver substeps.

use std::time::Duration;

/// Fixed frame rate of the reference frame loop.
pub const TICK_RATE_HZ: u32 = 60;

/// Frame `dt` in seconds matching [`TICK_RATE_HZ`].
pub const TICK_DT: f32 = 1.0 / TICK_RATE_HZ as f32;

/// Simulation time tracker
#[derive(Debug, Clone, Default)]
pub struct SimulationTime {
    frame_count: u64,
    substep_count: u64,
    elapsed_secs: f64,
}

impl SimulationTime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn substep_count(&self) -> u64 {
        self.substep_count
    }

    /// Record one completed `update(dt)` made of `substeps` substeps.
    pub fn advance_frame(&mut self, dt: f32, substeps: u32) {
        self.frame_count += 1;
        self.substep_count += u64::from(substeps);
        self.elapsed_secs += f64::from(dt);
    }

    pub fn total_time(&self) -> Duration {
        Duration::from_secs_f64(self.elapsed_secs)
    }
}
