//! Pairwise overlap resolution and the partitioned parallel passes.

use super::partition::ColumnPartition;
use crate::grid::CollisionGrid;
use crate::jobs::WorkerPool;
use crate::math::Vec2;
use crate::particle::Particle;
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Relative squared distance under which two centres count as coincident.
pub const CONTACT_EPSILON: f32 = 1e-4;

/// Separation axis used when two centres coincide.
pub const FALLBACK_NORMAL: Vec2 = Vec2::X;

/// Push `a` and `b` apart if they overlap. Each one moves by half of
/// `response * overlap` along the line between their centres; `a` is pushed
/// towards +[`FALLBACK_NORMAL`] when the centres coincide. Returns whether
/// the pair was in contact.
#[inline]
pub fn solve_contact(a: &mut Particle, b: &mut Particle, response: f32) -> bool {
    let min_dist = a.radius + b.radius;
    let min_dist2 = min_dist * min_dist;
    let axis = a.position - b.position;
    let dist2 = axis.length_squared();
    if dist2 >= min_dist2 {
        return false;
    }
    let dist = dist2.sqrt();
    let normal = if dist2 > CONTACT_EPSILON * min_dist2 {
        axis / dist
    } else {
        FALLBACK_NORMAL
    };
    let correction = normal * (0.5 * response * (min_dist - dist));
    a.position += correction;
    b.position -= correction;
    true
}

/// Raw view of the particle slots shared by the jobs of one pass.
///
/// Each job only dereferences particles registered in the cells of its own
/// slice and their `reach` neighbourhood; the column partition keeps those
/// sets disjoint between jobs of the same pass.
struct SharedParticles {
    ptr: *mut Particle,
    len: usize,
}

unsafe impl Send for SharedParticles {}
unsafe impl Sync for SharedParticles {}

impl SharedParticles {
    fn new(particles: &mut [Particle]) -> Self {
        Self {
            ptr: particles.as_mut_ptr(),
            len: particles.len(),
        }
    }

    /// # Safety
    /// No other live reference to slot `idx` may exist.
    #[allow(clippy::mut_from_ref)]
    #[inline(always)]
    unsafe fn get_mut(&self, idx: usize) -> &mut Particle {
        debug_assert!(idx < self.len);
        &mut *self.ptr.add(idx)
    }
}

/// Resolve every overlapping pair registered in `grid`, one pool batch per
/// pass of `partition`. Returns the number of contacts resolved.
pub fn resolve_collisions(
    pool: &WorkerPool,
    grid: &CollisionGrid,
    particles: &mut [Particle],
    partition: &ColumnPartition,
    response: f32,
) -> usize {
    let shared = SharedParticles::new(particles);
    let contacts = AtomicUsize::new(0);

    for pass in 0..partition.pass_count() {
        pool.run_batch(partition.jobs_in_pass(pass), |job| {
            let columns = partition.slice(pass, job);
            // SAFETY: slices of one pass are at least 2 * reach columns apart,
            // so no particle is reachable from two jobs of the same batch.
            let found = unsafe {
                resolve_columns(grid, &shared, columns, partition.reach(), response)
            };
            contacts.fetch_add(found, Ordering::Relaxed);
        });
    }
    contacts.into_inner()
}

/// Each unordered pair is visited once: from the lower cell index, and
/// within a cell from the earlier entry.
///
/// # Safety
/// The caller guarantees exclusive access to every particle registered in
/// columns `columns.start - reach .. columns.end + reach`.
unsafe fn resolve_columns(
    grid: &CollisionGrid,
    particles: &SharedParticles,
    columns: Range<usize>,
    reach: usize,
    response: f32,
) -> usize {
    let height = grid.height();
    let mut contacts = 0;
    for index in grid.column_cells(columns) {
        let cell = grid.cell_at(index);
        if cell.is_empty() {
            continue;
        }
        let (xs, ys) = grid.neighborhood(grid.coord_of(index), reach);
        for (i, &a) in cell.iter().enumerate() {
            for x in xs.clone() {
                for y in ys.clone() {
                    let other_index = x * height + y;
                    if other_index < index {
                        continue;
                    }
                    let skip = if other_index == index { i + 1 } else { 0 };
                    for &b in &grid.cell_at(other_index)[skip..] {
                        debug_assert_ne!(a, b, "particle registered twice");
                        let pa = particles.get_mut(a.index());
                        let pb = particles.get_mut(b.index());
                        if solve_contact(pa, pb, response) {
                            contacts += 1;
                        }
                    }
                }
            }
        }
    }
    contacts
}
