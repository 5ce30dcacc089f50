//! The non-collision phases of a substep. Each one is a single pool batch
//! over the particle slots; dead slots are skipped.

use crate::grid::CollisionGrid;
use crate::jobs::WorkerPool;
use crate::math::Vec2;
use crate::particle::{Particle, ParticleId};

/// Marks a dead slot in the cell-index cache.
const NO_CELL: u32 = u32::MAX;

pub fn apply_forces(pool: &WorkerPool, particles: &mut [Particle], gravity: Vec2) {
    pool.for_each_chunk_mut(particles, |_, chunk| {
        for p in chunk.iter_mut().filter(|p| p.alive) {
            p.accelerate(gravity);
        }
    });
}

/// Keep every particle fully inside `[0, domain]`.
pub fn enforce_boundary(
    pool: &WorkerPool,
    particles: &mut [Particle],
    domain: Vec2,
    restitution: f32,
) {
    pool.for_each_chunk_mut(particles, |_, chunk| {
        for p in chunk.iter_mut().filter(|p| p.alive) {
            constrain(p, domain, restitution);
        }
    });
}

#[inline]
pub(crate) fn constrain(p: &mut Particle, domain: Vec2, restitution: f32) {
    let r = p.radius;
    constrain_axis(&mut p.position.x, &mut p.last_position.x, r, domain.x - r, restitution);
    constrain_axis(&mut p.position.y, &mut p.last_position.y, r, domain.y - r, restitution);
}

/// Clamp one axis. The velocity component heading out of the domain is
/// reflected and scaled by `restitution`; an inward one is kept.
#[inline]
fn constrain_axis(pos: &mut f32, last: &mut f32, min: f32, max: f32, restitution: f32) {
    let v = *pos - *last;
    if *pos < min {
        let v = if v < 0.0 { -v * restitution } else { v };
        *pos = min;
        *last = min - v;
    } else if *pos > max {
        let v = if v > 0.0 { -v * restitution } else { v };
        *pos = max;
        *last = max - v;
    }
}

/// Clear `grid` and register every live particle.
///
/// From `parallel_threshold` slots on, cell indices are computed on the pool
/// into `cell_cache` first; the bucket fill is always serial.
pub fn rebuild_grid(
    pool: &WorkerPool,
    grid: &mut CollisionGrid,
    particles: &[Particle],
    cell_cache: &mut Vec<u32>,
    parallel_threshold: usize,
) {
    grid.clear();
    if particles.len() < parallel_threshold {
        for (i, p) in particles.iter().enumerate().filter(|(_, p)| p.alive) {
            grid.insert(ParticleId::new(i as u32), p.position);
        }
        return;
    }

    cell_cache.resize(particles.len(), NO_CELL);
    {
        let grid = &*grid;
        pool.for_each_chunk_mut(cell_cache.as_mut_slice(), |offset, chunk| {
            for (slot, p) in chunk.iter_mut().zip(&particles[offset..]) {
                *slot = if p.alive {
                    grid.index_of(grid.cell_of(p.position)) as u32
                } else {
                    NO_CELL
                };
            }
        });
    }
    for (i, &cell) in cell_cache.iter().enumerate() {
        if cell != NO_CELL {
            grid.insert_at(ParticleId::new(i as u32), cell as usize);
        }
    }
}

pub fn integrate(pool: &WorkerPool, particles: &mut [Particle], dt_sub: f32, damping: f32) {
    pool.for_each_chunk_mut(particles, |_, chunk| {
        for p in chunk.iter_mut().filter(|p| p.alive) {
            p.integrate(dt_sub, damping);
        }
    });
}
