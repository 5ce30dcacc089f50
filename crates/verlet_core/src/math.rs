//! Deterministic math utilities
//!
//! Re-exports glam with a seeded RNG and the color helpers used to tint
//! particles. Nothing in here is read by the solver.

pub use glam::*;

use serde::{Deserialize, Serialize};

/// Deterministic random number generator (xorshift64*)
///
/// Used to lay out reproducible scenes; the solver itself never draws
/// random numbers.
#[derive(Debug, Clone)]
pub struct DeterministicRng {
    seed: u64,
    state: u64,
}

impl DeterministicRng {
    pub fn new(seed: u64) -> Self {
        // xorshift has a fixed point at zero
        let state = if seed == 0 { 0x9E37_79B9_7F4A_7C15 } else { seed };
        Self { seed, state }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    pub fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    /// Uniform in `[0, 1)`.
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u32() >> 8) as f32 / (1u32 << 24) as f32
    }

    /// Uniform in `[min, max)`.
    pub fn range_f32(&mut self, min: f32, max: f32) -> f32 {
        min + (max - min) * self.next_f32()
    }
}

/// 8-bit RGBA color, presentation only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

/// Smooth rainbow: three phase-shifted squared sines.
pub fn rainbow(t: f32) -> Color {
    use std::f32::consts::PI;

    let channel = |phase: f32| {
        let s = (t + phase).sin();
        (255.0 * s * s) as u8
    };
    Color::rgb(channel(0.0), channel(0.33 * 2.0 * PI), channel(0.66 * 2.0 * PI))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rng_is_reproducible() {
        let mut a = DeterministicRng::new(42);
        let mut b = DeterministicRng::new(42);
        for _ in 0..100 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn rng_zero_seed_does_not_stick() {
        let mut rng = DeterministicRng::new(0);
        assert_ne!(rng.next_u64(), 0);
        assert_eq!(rng.seed(), 0);
    }

    #[test]
    fn range_stays_in_bounds() {
        let mut rng = DeterministicRng::new(7);
        for _ in 0..1_000 {
            let v = rng.range_f32(-2.0, 3.0);
            assert!((-2.0..3.0).contains(&v));
        }
    }

    #[test]
    fn rainbow_is_opaque() {
        for i in 0..50 {
            assert_eq!(rainbow(i as f32 * 0.1).a, 255);
        }
        assert_eq!(rainbow(0.0).r, 0);
    }
}
