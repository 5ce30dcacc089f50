//! Particle record and its stable handle.
//!
//! Velocity is implicit: it is the displacement since the previous substep,
//! `position - last_position`. Nothing stores it separately, so positional
//! corrections (collisions, walls) automatically feed into the next step.

use crate::math::{Color, Vec2};

/// Stable particle handle, equal to the particle's slot in the store.
///
/// Ids are never reused while the particle is alive. After removal a slot
/// may be handed out again, but only once the store has been recycled at a
/// frame boundary.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParticleId(u32);

impl ParticleId {
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for ParticleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub position: Vec2,
    pub last_position: Vec2,
    pub acceleration: Vec2,
    pub radius: f32,
    pub color: Color,
    pub(crate) alive: bool,
}

impl Particle {
    /// A particle at rest at `position`.
    pub fn new(position: Vec2, radius: f32) -> Self {
        Self {
            position,
            last_position: position,
            acceleration: Vec2::ZERO,
            radius,
            color: Color::default(),
            alive: true,
        }
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Displacement over the last substep.
    #[inline]
    pub fn displacement(&self) -> Vec2 {
        self.position - self.last_position
    }

    /// Velocity in world units per second for a substep of `dt_sub`.
    #[inline]
    pub fn velocity(&self, dt_sub: f32) -> Vec2 {
        self.displacement() / dt_sub
    }

    /// Displacement length per substep.
    #[inline]
    pub fn speed(&self) -> f32 {
        self.displacement().length()
    }

    #[inline]
    pub fn accelerate(&mut self, a: Vec2) {
        self.acceleration += a;
    }

    /// Add `v` (displacement per substep) to the implicit velocity.
    #[inline]
    pub fn add_velocity(&mut self, v: Vec2) {
        self.last_position -= v;
    }

    /// Teleport and come to rest.
    pub fn set_position(&mut self, position: Vec2) {
        self.position = position;
        self.last_position = position;
    }

    /// Teleport while keeping the current velocity.
    pub fn set_position_same_speed(&mut self, position: Vec2) {
        let to_last = self.last_position - self.position;
        self.position = position;
        self.last_position = position + to_last;
    }

    pub fn stop(&mut self) {
        self.last_position = self.position;
    }

    /// Scale velocity down by `ratio` (0 keeps it, 1 stops the particle).
    pub fn slowdown(&mut self, ratio: f32) {
        self.last_position += ratio * (self.position - self.last_position);
    }

    /// Verlet step. `damping` scales the carried-over displacement.
    #[inline]
    pub fn integrate(&mut self, dt_sub: f32, damping: f32) {
        let new_position =
            self.position + self.displacement() * damping + self.acceleration * (dt_sub * dt_sub);
        self.last_position = self.position;
        self.position = new_position;
        self.acceleration = Vec2::ZERO;
        debug_assert!(
            self.position.is_finite(),
            "particle diverged: {:?}",
            self.position
        );
    }
}
