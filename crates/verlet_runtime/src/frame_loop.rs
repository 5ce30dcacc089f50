//! Fixed-step frame loop
//!
//! One iteration per frame: apply scheduled inputs, emit, step the solver by
//! `TICK_DT`. Inputs and emission only touch the solver between updates.

use crate::emitter::Emitter;
use verlet_core::time::TICK_DT;
use verlet_core::Solver;
use verlet_metrics::{Counter, FrameTimer};
use verlet_services::{Controls, ScheduledInput, Settings};

/// Totals reported when the loop ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    pub objects: usize,
    pub emitted: usize,
}

pub struct FrameLoop {
    solver: Solver,
    emitter: Emitter,
    controls: Controls,
    schedule: Vec<ScheduledInput>,
    frames: u64,
    log_interval: u64,
    timer: FrameTimer,
    counter: Counter,
}

impl FrameLoop {
    pub fn new(solver: Solver, settings: &Settings) -> Self {
        let controls = Controls::new(
            settings.emitter.enabled,
            solver.gravity,
            settings.toggled_gravity,
        );
        Self {
            solver,
            emitter: Emitter::new(settings.emitter.clone()),
            controls,
            schedule: settings.schedule.clone(),
            frames: settings.frames,
            log_interval: settings.log_interval.max(1),
            timer: FrameTimer::new(60),
            counter: Counter::new(),
        }
    }

    pub fn solver(&self) -> &Solver {
        &self.solver
    }

    /// Run one frame.
    pub fn step(&mut self, frame: u64) -> usize {
        for command in ScheduledInput::due(&self.schedule, frame) {
            self.controls.apply(command, &mut self.solver);
        }

        let mut emitted = 0;
        if self.controls.emit && self.emitter.wants_more(&self.solver) {
            emitted = self.emitter.emit(&mut self.solver, &mut self.counter);
        }

        self.solver.update(TICK_DT);
        emitted
    }

    pub fn run(&mut self) -> RunSummary {
        tracing::info!(frames = self.frames, "frame loop started");
        let mut emitted = 0;

        for frame in 0..self.frames {
            self.timer.begin();
            emitted += self.step(frame);
            self.timer.end();

            if (frame + 1) % self.log_interval == 0 {
                tracing::info!(
                    frame = frame + 1,
                    objects = self.solver.object_count(),
                    contacts = self.solver.last_contact_count(),
                    fps = self.timer.fps(),
                    frame_ms = self.timer.frame_time_ms(),
                    "progress"
                );
            }
        }

        self.report();
        RunSummary {
            frames: self.frames,
            objects: self.solver.object_count(),
            emitted,
        }
    }

    fn report(&self) {
        let (min_ms, max_ms) = self.timer.frame_time_range_ms();
        tracing::info!(
            frames = self.timer.frames(),
            objects = self.solver.object_count(),
            simulated_secs = self.solver.time().total_time().as_secs_f32(),
            min_ms,
            max_ms,
            "frame loop finished"
        );
        for (name, timing) in self.solver.profiler().iter() {
            tracing::info!(
                phase = name,
                calls = timing.calls,
                mean_us = timing.mean().as_micros() as u64,
                total_ms = timing.total.as_millis() as u64,
                "phase timing"
            );
        }
        for (name, value) in self.counter.iter() {
            tracing::info!(counter = name, value, "counter");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use verlet_core::math::Vec2;
    use verlet_core::WorkerPool;
    use verlet_services::{EmitterSettings, InputCommand};

    fn small_settings() -> Settings {
        Settings {
            world_size: Vec2::splat(40.0),
            threads: 2,
            frames: 30,
            emitter: EmitterSettings {
                max_objects: 100,
                ..EmitterSettings::default()
            },
            ..Settings::default()
        }
    }

    fn frame_loop(settings: &Settings) -> FrameLoop {
        let pool = Arc::new(WorkerPool::new(settings.threads).unwrap());
        let solver =
            Solver::with_config(settings.world_size, pool, settings.solver.clone()).unwrap();
        FrameLoop::new(solver, settings)
    }

    #[test]
    fn run_emits_up_to_cap_and_stays_in_bounds() {
        let settings = small_settings();
        let mut frame_loop = frame_loop(&settings);
        let summary = frame_loop.run();

        assert_eq!(summary.frames, 30);
        assert_eq!(summary.objects, 100);
        assert_eq!(summary.emitted, 100);

        let domain = frame_loop.solver().domain();
        for (_, p) in frame_loop.solver().objects().iter() {
            assert!(p.position.cmpge(Vec2::splat(p.radius - 1e-3)).all());
            assert!(p.position.cmple(domain - p.radius + 1e-3).all());
        }
        assert_eq!(frame_loop.solver().time().frame_count(), 30);
    }

    #[test]
    fn scheduled_inputs_apply_before_emission() {
        let mut settings = small_settings();
        settings.schedule = vec![
            ScheduledInput { frame: 0, command: InputCommand::ToggleEmit },
            ScheduledInput { frame: 2, command: InputCommand::ToggleGravity },
        ];
        let mut frame_loop = frame_loop(&settings);

        assert_eq!(frame_loop.step(0), 0);
        assert_eq!(frame_loop.solver().object_count(), 0);
        frame_loop.step(1);
        frame_loop.step(2);
        assert_eq!(frame_loop.solver().gravity, Vec2::ZERO);
    }

    #[test]
    fn toggle_switches_on_gravity_in_a_weightless_run() {
        let mut settings = Settings::from_json(
            r#"{
                "solver": { "gravity": [0.0, 0.0] },
                "schedule": [{ "frame": 1, "command": "toggle_gravity" }]
            }"#,
        )
        .unwrap();
        settings.world_size = Vec2::splat(40.0);
        settings.threads = 2;
        let mut frame_loop = frame_loop(&settings);

        frame_loop.step(0);
        assert_eq!(frame_loop.solver().gravity, Vec2::ZERO);
        frame_loop.step(1);
        assert_eq!(frame_loop.solver().gravity, Vec2::new(0.0, 20.0));
    }
}
