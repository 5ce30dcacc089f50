//! Uniform collision grid.
//!
//! The domain is cut into square cells one particle diameter wide, so two
//! touching particles of that size always sit in the same or adjacent
//! cells. The grid is rebuilt from scratch every substep; nothing tracks
//! cell membership across substeps.
//!
//! Cells are stored column-major (`index = x * height + y`): a run of
//! columns is a contiguous run of cells, which is the unit of work handed to
//! the collision passes.

use crate::math::Vec2;
use crate::particle::ParticleId;
use smallvec::SmallVec;
use std::ops::Range;
use thiserror::Error;

/// Ids stored inline before a cell spills to the heap.
pub const CELL_INLINE_CAPACITY: usize = 4;

pub type CellBucket = SmallVec<[ParticleId; CELL_INLINE_CAPACITY]>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridError {
    #[error("cell size must be positive and finite, got {0}")]
    InvalidCellSize(f32),

    #[error("domain {width}x{height} is smaller than one {cell_size} cell")]
    DomainTooSmall {
        width: f32,
        height: f32,
        cell_size: f32,
    },
}

/// Grid cell coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellCoord {
    pub x: usize,
    pub y: usize,
}

impl CellCoord {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

#[derive(Debug)]
pub struct CollisionGrid {
    width: usize,
    height: usize,
    cell_size: f32,
    inv_cell_size: f32,
    cells: Vec<CellBucket>,
}

impl CollisionGrid {
    /// Grid covering `domain` (world units) with square cells of `cell_size`.
    /// The cell count per axis is `floor(domain / cell_size)`; a trailing
    /// partial cell is folded into the last one.
    pub fn new(domain: Vec2, cell_size: f32) -> Result<Self, GridError> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(GridError::InvalidCellSize(cell_size));
        }
        let too_small = || GridError::DomainTooSmall {
            width: domain.x,
            height: domain.y,
            cell_size,
        };
        if !domain.is_finite() || domain.x < cell_size || domain.y < cell_size {
            return Err(too_small());
        }
        let width = (domain.x / cell_size).floor() as usize;
        let height = (domain.y / cell_size).floor() as usize;
        if width == 0 || height == 0 {
            return Err(too_small());
        }

        tracing::debug!(width, height, cell_size, "collision grid allocated");
        Ok(Self {
            width,
            height,
            cell_size,
            inv_cell_size: 1.0 / cell_size,
            cells: vec![CellBucket::new(); width * height],
        })
    }

    /// Number of columns.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows.
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Empty every cell, keeping allocations.
    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.clear();
        }
    }

    /// Cell containing `position`. Points on a cell boundary go to the cell
    /// starting there; points outside the grid clamp to the nearest cell.
    #[inline]
    pub fn cell_of(&self, position: Vec2) -> CellCoord {
        let scaled = position * self.inv_cell_size;
        CellCoord::new(
            Self::clamp_axis(scaled.x, self.width),
            Self::clamp_axis(scaled.y, self.height),
        )
    }

    #[inline]
    fn clamp_axis(scaled: f32, len: usize) -> usize {
        // `as` saturates: NaN and negatives land on 0
        (scaled.floor() as usize).min(len - 1)
    }

    /// Linear index of a cell.
    #[inline]
    pub fn index_of(&self, cell: CellCoord) -> usize {
        debug_assert!(cell.x < self.width && cell.y < self.height);
        cell.x * self.height + cell.y
    }

    /// Coordinates of a linear cell index.
    #[inline]
    pub fn coord_of(&self, index: usize) -> CellCoord {
        CellCoord::new(index / self.height, index % self.height)
    }

    /// Cell index range covering columns `columns`.
    #[inline]
    pub fn column_cells(&self, columns: Range<usize>) -> Range<usize> {
        columns.start * self.height..columns.end.min(self.width) * self.height
    }

    /// Append `id` to the cell containing `position`.
    #[inline]
    pub fn insert(&mut self, id: ParticleId, position: Vec2) {
        let index = self.index_of(self.cell_of(position));
        self.cells[index].push(id);
    }

    /// Append `id` to the cell at linear `index` (see [`index_of`](Self::index_of)).
    #[inline]
    pub fn insert_at(&mut self, id: ParticleId, index: usize) {
        self.cells[index].push(id);
    }

    /// Drop `id` from the grid, searching the cells around `near` before
    /// the rest. Returns whether the id was registered.
    pub fn remove(&mut self, id: ParticleId, near: Vec2) -> bool {
        let (xs, ys) = self.neighborhood(self.cell_of(near), 1);
        for x in xs {
            for y in ys.clone() {
                let index = x * self.height + y;
                if Self::take(&mut self.cells[index], id) {
                    return true;
                }
            }
        }
        self.cells.iter_mut().any(|cell| Self::take(cell, id))
    }

    fn take(cell: &mut CellBucket, id: ParticleId) -> bool {
        match cell.iter().position(|&other| other == id) {
            Some(i) => {
                cell.remove(i);
                true
            }
            None => false,
        }
    }

    #[inline]
    pub fn cell(&self, cell: CellCoord) -> &[ParticleId] {
        &self.cells[self.index_of(cell)]
    }

    #[inline]
    pub fn cell_at(&self, index: usize) -> &[ParticleId] {
        &self.cells[index]
    }

    /// Call `f` for every id in the 3x3 block centred on `cell`.
    pub fn for_each_in_cell_and_neighbors<F>(&self, cell: CellCoord, f: F)
    where
        F: FnMut(ParticleId),
    {
        self.for_each_in_neighborhood(cell, 1, f);
    }

    /// Call `f` for every id in the `(2 * reach + 1)^2` block centred on
    /// `cell`, clipped to the grid.
    pub fn for_each_in_neighborhood<F>(&self, cell: CellCoord, reach: usize, mut f: F)
    where
        F: FnMut(ParticleId),
    {
        let (xs, ys) = self.neighborhood(cell, reach);
        for x in xs {
            let column = x * self.height;
            for y in ys.clone() {
                for &id in &self.cells[column + y] {
                    f(id);
                }
            }
        }
    }

    /// Column and row ranges of the block around `cell`.
    #[inline]
    pub fn neighborhood(&self, cell: CellCoord, reach: usize) -> (Range<usize>, Range<usize>) {
        (
            cell.x.saturating_sub(reach)..(cell.x + reach + 1).min(self.width),
            cell.y.saturating_sub(reach)..(cell.y + reach + 1).min(self.height),
        )
    }

    /// Total ids currently stored.
    pub fn occupancy(&self) -> usize {
        self.cells.iter().map(|c| c.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn grid() -> CollisionGrid {
        CollisionGrid::new(Vec2::new(10.0, 6.0), 1.0).unwrap()
    }

    #[test]
    fn dimensions_follow_domain() {
        let g = grid();
        assert_eq!((g.width(), g.height()), (10, 6));
        assert_eq!(g.cell_count(), 60);

        let g = CollisionGrid::new(Vec2::new(10.5, 3.9), 2.0).unwrap();
        assert_eq!((g.width(), g.height()), (5, 1));
    }

    #[test]
    fn rejects_bad_geometry() {
        assert_eq!(
            CollisionGrid::new(Vec2::splat(10.0), 0.0).unwrap_err(),
            GridError::InvalidCellSize(0.0)
        );
        assert!(matches!(
            CollisionGrid::new(Vec2::new(0.5, 10.0), 1.0),
            Err(GridError::DomainTooSmall { .. })
        ));
        assert!(CollisionGrid::new(Vec2::splat(1.0), 1.0).is_ok());
    }

    #[test]
    fn boundary_points_use_floor() {
        let g = grid();
        assert_eq!(g.cell_of(Vec2::new(2.0, 3.0)), CellCoord::new(2, 3));
        assert_eq!(g.cell_of(Vec2::new(1.999, 2.999)), CellCoord::new(1, 2));
    }

    #[test]
    fn outside_points_are_clamped() {
        let g = grid();
        assert_eq!(g.cell_of(Vec2::new(-5.0, -0.1)), CellCoord::new(0, 0));
        assert_eq!(g.cell_of(Vec2::new(10.0, 6.0)), CellCoord::new(9, 5));
        assert_eq!(g.cell_of(Vec2::new(1e9, 2.5)), CellCoord::new(9, 2));
    }

    #[test]
    fn cells_are_column_major() {
        let g = grid();
        assert_eq!(g.index_of(CellCoord::new(1, 0)), 6);
        assert_eq!(g.coord_of(13), CellCoord::new(2, 1));
        assert_eq!(g.column_cells(2..4), 12..24);
        assert_eq!(g.column_cells(8..12), 48..60);
    }

    #[test]
    fn crowded_cells_spill() {
        let mut g = grid();
        for i in 0..10 {
            g.insert(ParticleId::new(i), Vec2::new(4.5, 4.5));
        }
        assert_eq!(g.cell(CellCoord::new(4, 4)).len(), 10);
        g.clear();
        assert_eq!(g.occupancy(), 0);
    }

    #[test]
    fn removal_clears_the_bucket() {
        let mut g = grid();
        g.insert(ParticleId::new(0), Vec2::new(4.5, 4.5));
        g.insert(ParticleId::new(1), Vec2::new(4.6, 4.4));
        g.insert(ParticleId::new(2), Vec2::new(8.5, 1.5));

        assert!(g.remove(ParticleId::new(0), Vec2::new(5.2, 4.5)));
        assert_eq!(g.cell(CellCoord::new(4, 4)), &[ParticleId::new(1)]);

        // far from where it was registered
        assert!(g.remove(ParticleId::new(2), Vec2::new(0.5, 0.5)));
        assert!(!g.remove(ParticleId::new(2), Vec2::new(8.5, 1.5)));
        assert_eq!(g.occupancy(), 1);
    }

    #[test]
    fn neighbor_query_is_clipped_at_edges() {
        let mut g = grid();
        let mut next = 0;
        for x in 0..10 {
            for y in 0..6 {
                g.insert(ParticleId::new(next), Vec2::new(x as f32 + 0.5, y as f32 + 0.5));
                next += 1;
            }
        }
        let mut corner = 0;
        g.for_each_in_cell_and_neighbors(CellCoord::new(0, 0), |_| corner += 1);
        assert_eq!(corner, 4);

        let mut inner = Vec::new();
        g.for_each_in_cell_and_neighbors(CellCoord::new(4, 3), |id| inner.push(id));
        assert_eq!(inner.len(), 9);

        let mut wide = 0;
        g.for_each_in_neighborhood(CellCoord::new(4, 3), 2, |_| wide += 1);
        assert_eq!(wide, 25);
    }

    proptest! {
        #[test]
        fn insertion_cell_contains_position(x in 0.0f32..10.0, y in 0.0f32..6.0) {
            let g = grid();
            let c = g.cell_of(Vec2::new(x, y));
            let min = Vec2::new(c.x as f32, c.y as f32) * g.cell_size();
            let max = min + Vec2::splat(g.cell_size());
            prop_assert!(x >= min.x && x < max.x);
            prop_assert!(y >= min.y && y < max.y);
        }

        #[test]
        fn neighbor_query_finds_everything_in_range(
            ax in 0.0f32..10.0, ay in 0.0f32..6.0,
            bx in 0.0f32..10.0, by in 0.0f32..6.0,
        ) {
            // cell size 1.0 == diameter of radius-0.5 particles
            let mut g = grid();
            let a = Vec2::new(ax, ay);
            let b = Vec2::new(bx, by);
            g.insert(ParticleId::new(0), a);
            g.insert(ParticleId::new(1), b);

            let mut found = false;
            g.for_each_in_cell_and_neighbors(g.cell_of(a), |id| found |= id == ParticleId::new(1));
            if a.distance(b) < 1.0 {
                prop_assert!(found);
            }
        }
    }
}
