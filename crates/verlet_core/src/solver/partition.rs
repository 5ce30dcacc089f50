//! Column partition for lock-free collision passes.
//!
//! The grid's columns are cut into slices of `slice_width` columns. Slice `k`
//! runs in pass `k % pass_count`. A job working on a slice touches particles
//! up to `reach` columns to either side of it, so two slices of the same
//! pass must be at least `2 * reach` columns apart:
//!
//! ```text
//! (pass_count - 1) * slice_width >= 2 * reach
//! ```
//!
//! With the usual `reach == 1` and a slice width of two or more columns this
//! gives the classic two-pass even/odd scheme.

use std::ops::Range;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPartition {
    columns: usize,
    slice_width: usize,
    slice_count: usize,
    pass_count: usize,
    reach: usize,
}

impl ColumnPartition {
    /// Partition `columns` columns for `thread_count` workers, aiming for one
    /// slice per worker per pass over two passes.
    pub fn new(columns: usize, thread_count: usize, reach: usize) -> Self {
        let reach = reach.max(1);
        let slice_width = columns.div_ceil(2 * thread_count.max(1)).max(1);
        let pass_count = (1 + (2 * reach).div_ceil(slice_width)).max(2);
        Self {
            columns,
            slice_width,
            slice_count: columns.div_ceil(slice_width),
            pass_count,
            reach,
        }
    }

    #[inline]
    pub fn pass_count(&self) -> usize {
        self.pass_count
    }

    #[inline]
    pub fn slice_width(&self) -> usize {
        self.slice_width
    }

    #[inline]
    pub fn reach(&self) -> usize {
        self.reach
    }

    /// Number of slices processed in `pass`.
    pub fn jobs_in_pass(&self, pass: usize) -> usize {
        if pass >= self.slice_count {
            return 0;
        }
        (self.slice_count - pass).div_ceil(self.pass_count)
    }

    /// Columns of the `job`-th slice of `pass`.
    pub fn slice(&self, pass: usize, job: usize) -> Range<usize> {
        let k = pass + job * self.pass_count;
        debug_assert!(k < self.slice_count);
        let start = k * self.slice_width;
        start..(start + self.slice_width).min(self.columns)
    }
}
