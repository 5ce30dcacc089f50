//! Verlet Engine Core
//!
//! Contains the fundamental simulation systems:
//! - Job scheduler (fixed worker pool with barrier batches)
//! - Particle store and uniform collision grid
//! - Verlet solver with lock-free partitioned collision passes
//! - Math, color and time helpers

pub mod grid;
pub mod jobs;
pub mod math;
pub mod particle;
pub mod solver;
pub mod store;
pub mod time;

pub use glam;
pub use grid::{CellCoord, CollisionGrid, GridError};
pub use jobs::{WorkerPool, WorkerPoolError};
pub use particle::{Particle, ParticleId};
pub use solver::{Solver, SolverConfig, SolverError};
pub use store::{ParticleStore, StoreError};

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
