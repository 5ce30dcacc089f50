//! Per-phase timing for the solver pipeline

use std::time::{Duration, Instant};

/// Accumulated time spent in one named phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseTiming {
    pub total: Duration,
    pub calls: u64,
}

impl PhaseTiming {
    pub fn mean(&self) -> Duration {
        if self.calls == 0 {
            return Duration::ZERO;
        }
        self.total.div_f64(self.calls as f64)
    }
}

/// Phase timings kept in first-seen order, which for the solver is
/// pipeline order. A handful of phases makes a linear scan cheaper than
/// hashing.
#[derive(Debug, Default)]
pub struct SystemProfiler {
    phases: Vec<(&'static str, PhaseTiming)>,
}

impl SystemProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn time_system<F, R>(&mut self, name: &'static str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let start = Instant::now();
        let result = f();
        self.record(name, start.elapsed());
        result
    }

    pub fn record(&mut self, name: &'static str, elapsed: Duration) {
        let index = match self.phases.iter().position(|(n, _)| *n == name) {
            Some(index) => index,
            None => {
                self.phases.push((name, PhaseTiming::default()));
                self.phases.len() - 1
            }
        };
        let timing = &mut self.phases[index].1;
        timing.total += elapsed;
        timing.calls += 1;
    }

    pub fn get_timing(&self, name: &str) -> PhaseTiming {
        self.phases
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, t)| *t)
            .unwrap_or_default()
    }

    pub fn reset(&mut self) {
        self.phases.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, PhaseTiming)> + '_ {
        self.phases.iter().copied()
    }
}
