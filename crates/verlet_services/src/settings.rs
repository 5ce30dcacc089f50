//! Settings management
//!
//! Everything the frame loop needs to set up a run, loadable from JSON.
//! Missing fields fall back to the defaults of the reference demo.

use crate::input::ScheduledInput;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use verlet_core::math::Vec2;
use verlet_core::solver::{ConfigError, SolverConfig};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings from {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed settings: {0}")]
    Json(#[from] serde_json::Error),

    #[error("world size must be positive and finite, got {0}")]
    InvalidWorld(Vec2),

    #[error("at least one worker thread is required")]
    ZeroThreads,

    #[error("toggled gravity must be finite, got {0}")]
    InvalidGravity(Vec2),

    #[error(transparent)]
    Solver(#[from] ConfigError),
}

/// Engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Simulation domain in world units, the unit particle radii are given
    /// in.
    pub world_size: Vec2,
    pub threads: usize,
    /// Frames to simulate before exiting.
    pub frames: u64,
    /// Frames between two progress log lines.
    pub log_interval: u64,
    pub solver: SolverConfig,
    /// Gravity set by `toggle_gravity` when it turns gravity on, whatever
    /// `solver.gravity` started at.
    pub toggled_gravity: Vec2,
    pub emitter: EmitterSettings,
    /// Inputs replayed at fixed frames, standing in for a keyboard.
    pub schedule: Vec<ScheduledInput>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitterSettings {
    pub enabled: bool,
    /// Stop emitting once this many particles exist.
    pub max_objects: usize,
    /// Particles per emitted column.
    pub batch: u32,
    /// Position of the first particle of a column.
    pub origin: Vec2,
    /// Vertical distance between particles of a column.
    pub spacing: f32,
    /// Initial displacement per substep.
    pub launch: Vec2,
    /// Rainbow phase advance per particle id.
    pub color_rate: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            world_size: Vec2::new(300.0, 300.0),
            threads: 10,
            frames: 600,
            log_interval: 60,
            solver: SolverConfig::default(),
            toggled_gravity: Vec2::new(0.0, 20.0),
            emitter: EmitterSettings::default(),
            schedule: Vec::new(),
        }
    }
}

impl Default for EmitterSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_objects: 20_000,
            batch: 20,
            origin: Vec2::new(2.0, 10.0),
            spacing: 1.1,
            launch: Vec2::new(0.2, 0.0),
            color_rate: 0.0001,
        }
    }
}

impl Settings {
    /// Read and validate a JSON settings file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_json(&text)?;
        tracing::info!(path = %path.display(), "settings loaded");
        Ok(settings)
    }

    pub fn from_json(text: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_json::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let world = self.world_size;
        if !(world.is_finite() && world.cmpgt(Vec2::ZERO).all()) {
            return Err(SettingsError::InvalidWorld(world));
        }
        if self.threads == 0 {
            return Err(SettingsError::ZeroThreads);
        }
        if !self.toggled_gravity.is_finite() {
            return Err(SettingsError::InvalidGravity(self.toggled_gravity));
        }
        self.solver.validate()?;
        Ok(())
    }
}
