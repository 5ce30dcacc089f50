//! Particle emitter: the frame loop's capacity policy.
//!
//! Each call drops a vertical column of particles near the left wall with a
//! small rightward launch, until the configured object count is reached.

use verlet_core::math::{rainbow, Vec2};
use verlet_core::{Solver, SolverError, StoreError};
use verlet_metrics::Counter;
use verlet_services::EmitterSettings;

pub struct Emitter {
    settings: EmitterSettings,
}

impl Emitter {
    pub fn new(settings: EmitterSettings) -> Self {
        Self { settings }
    }

    /// Whether the solver still has room under the emitter's cap.
    pub fn wants_more(&self, solver: &Solver) -> bool {
        solver.object_count() < self.settings.max_objects
    }

    /// Emit one column. Returns how many particles were created.
    pub fn emit(&self, solver: &mut Solver, counter: &mut Counter) -> usize {
        let s = &self.settings;
        let mut created = 0;
        for i in (0..s.batch).rev() {
            if !self.wants_more(solver) {
                break;
            }
            let position = s.origin + Vec2::new(0.0, s.spacing * i as f32);
            match solver.create_object(position) {
                Ok(id) => {
                    if let Some(p) = solver.object_mut(id) {
                        p.add_velocity(s.launch);
                        p.color = rainbow(id.raw() as f32 * s.color_rate);
                    }
                    created += 1;
                }
                Err(SolverError::Store(StoreError::CapacityExhausted { capacity })) => {
                    tracing::warn!(capacity, "solver store full, emitter stops");
                    counter.increment("rejected", 1);
                    break;
                }
                Err(err) => {
                    tracing::warn!(%err, %position, "emission rejected");
                    counter.increment("rejected", 1);
                }
            }
        }
        counter.increment("emitted", created);
        created
    }
}
