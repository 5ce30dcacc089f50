//! Verlet Runtime
//!
//! Headless binary that boots the solver and runs the emitter demo.
//!
//! Usage: `verlet [settings.json]`. Log verbosity follows `RUST_LOG`.

mod emitter;
mod frame_loop;

use anyhow::{Context, Result};
use frame_loop::FrameLoop;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use verlet_core::{Solver, WorkerPool};
use verlet_services::Settings;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("Verlet Engine v{}", verlet_core::VERSION);

    let settings = match std::env::args().nth(1) {
        Some(path) => Settings::load(&path).with_context(|| format!("loading settings from {path}"))?,
        None => Settings::default(),
    };
    settings.validate().context("invalid settings")?;

    let pool = Arc::new(WorkerPool::new(settings.threads).context("starting worker pool")?);
    let solver = Solver::with_config(settings.world_size, pool, settings.solver.clone())
        .context("creating solver")?;

    let summary = FrameLoop::new(solver, &settings).run();
    tracing::info!(
        frames = summary.frames,
        objects = summary.objects,
        emitted = summary.emitted,
        "shutdown"
    );

    Ok(())
}
