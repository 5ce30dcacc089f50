use crate::math::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors reported by [`SolverConfig::validate`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("substeps must be at least 1")]
    ZeroSubsteps,

    #[error("particle radius must be positive and finite, got {0}")]
    InvalidRadius(f32),

    #[error("air friction must be finite and non-negative, got {0}")]
    InvalidAirFriction(f32),

    #[error("boundary damping must lie in [0, 1], got {0}")]
    InvalidBoundaryDamping(f32),

    #[error("collision response must lie in (0, 1], got {0}")]
    InvalidResponse(f32),

    #[error("gravity must be finite, got {0}")]
    InvalidGravity(Vec2),

    #[error("object capacity must be at least 1")]
    ZeroCapacity,
}

/// Tunables of the solver.
///
/// `particle_radius` is the default and smallest radius; the grid's cell
/// size is its diameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Substeps per `update(dt)`.
    pub substeps: u32,
    pub particle_radius: f32,
    /// Initial gravity. The solver's `gravity` field can change it later.
    pub gravity: Vec2,
    /// Velocity loss per second squared; the per-substep Verlet damping is
    /// `1 - air_friction * dt_sub^2`.
    pub air_friction: f32,
    /// Fraction of the normal velocity kept when bouncing off a wall.
    pub boundary_damping: f32,
    /// Fraction of the overlap removed per contact (1.0 separates fully).
    pub response_coefficient: f32,
    /// Hard cap on live particles, `None` for unbounded.
    pub max_objects: Option<usize>,
    /// Object count from which grid cell indices are computed on the pool.
    pub parallel_rebuild_threshold: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            substeps: 8,
            particle_radius: 0.5,
            gravity: Vec2::new(0.0, 20.0),
            air_friction: 40.0,
            boundary_damping: 0.5,
            response_coefficient: 1.0,
            max_objects: None,
            parallel_rebuild_threshold: 4_096,
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.substeps == 0 {
            return Err(ConfigError::ZeroSubsteps);
        }
        if !(self.particle_radius.is_finite() && self.particle_radius > 0.0) {
            return Err(ConfigError::InvalidRadius(self.particle_radius));
        }
        if !(self.air_friction.is_finite() && self.air_friction >= 0.0) {
            return Err(ConfigError::InvalidAirFriction(self.air_friction));
        }
        if !(0.0..=1.0).contains(&self.boundary_damping) {
            return Err(ConfigError::InvalidBoundaryDamping(self.boundary_damping));
        }
        if !(self.response_coefficient > 0.0 && self.response_coefficient <= 1.0) {
            return Err(ConfigError::InvalidResponse(self.response_coefficient));
        }
        if !self.gravity.is_finite() {
            return Err(ConfigError::InvalidGravity(self.gravity));
        }
        if self.max_objects == Some(0) {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(())
    }

    /// Substep length for a frame of `dt`.
    #[inline]
    pub fn sub_dt(&self, dt: f32) -> f32 {
        dt / self.substeps as f32
    }

    /// Verlet damping factor for a substep of `sub_dt`.
    #[inline]
    pub fn velocity_damping(&self, sub_dt: f32) -> f32 {
        (1.0 - self.air_friction * sub_dt * sub_dt).clamp(0.0, 1.0)
    }

    /// Grid cell size: one diameter of the smallest particle.
    #[inline]
    pub fn cell_size(&self) -> f32 {
        2.0 * self.particle_radius
    }
}
