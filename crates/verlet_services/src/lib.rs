//! Verlet Services Layer
//!
//! Frame-loop side of the engine: settings loading and input commands. The
//! solver never depends on anything in here.

pub mod input;
pub mod settings;

pub use input::{Controls, InputCommand, ScheduledInput};
pub use settings::{EmitterSettings, Settings, SettingsError};
