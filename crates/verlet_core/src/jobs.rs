//! Fixed-size worker pool.
//!
//! A thin wrapper over a dedicated rayon [`ThreadPool`] that exposes the two
//! shapes of work the solver submits:
//!
//! - [`WorkerPool::run_batch`]: `job_count` indexed jobs, returning only once
//!   every job has finished (barrier semantics).
//! - [`WorkerPool::for_each_chunk_mut`]: a mutable slice split into one
//!   contiguous chunk per worker.
//!
//! Jobs within a batch have no ordering guarantee relative to each other.
//! Batches never overlap: every call blocks the submitting thread until the
//! whole batch is done.

use rayon::{ThreadPool, ThreadPoolBuilder};
use thiserror::Error;

/// Errors raised while building a [`WorkerPool`].
#[derive(Debug, Error)]
pub enum WorkerPoolError {
    #[error("worker pool needs at least one thread")]
    ZeroThreads,

    #[error("failed to spawn worker threads: {0}")]
    Build(#[from] rayon::ThreadPoolBuildError),
}

pub struct WorkerPool {
    pool: ThreadPool,
    thread_count: usize,
}

impl WorkerPool {
    /// Spawn `thread_count` worker threads. The threads live as long as the
    /// pool.
    pub fn new(thread_count: usize) -> Result<Self, WorkerPoolError> {
        if thread_count == 0 {
            return Err(WorkerPoolError::ZeroThreads);
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(thread_count)
            .thread_name(|i| format!("verlet-worker-{i}"))
            .build()?;
        tracing::debug!(thread_count, "worker pool started");
        Ok(Self { pool, thread_count })
    }

    #[inline]
    pub fn thread_count(&self) -> usize {
        self.thread_count
    }

    /// Run `job(i)` for every `i in 0..job_count` on the workers.
    pub fn run_batch<F>(&self, job_count: usize, job: F)
    where
        F: Fn(usize) + Sync,
    {
        match job_count {
            0 => {}
            1 => self.pool.install(|| job(0)),
            _ => {
                let job = &job;
                self.pool.scope(|scope| {
                    for index in 0..job_count {
                        scope.spawn(move |_| job(index));
                    }
                });
            }
        }
    }

    /// Split `items` into at most `thread_count` contiguous chunks and run
    /// `job(offset, chunk)` on each one, `offset` being the index of the
    /// chunk's first element in `items`.
    pub fn for_each_chunk_mut<T, F>(&self, items: &mut [T], job: F)
    where
        T: Send,
        F: Fn(usize, &mut [T]) + Sync,
    {
        let batch = self.batch_size(items.len());
        if batch == 0 {
            return;
        }
        let job = &job;
        self.pool.scope(|scope| {
            for (i, chunk) in items.chunks_mut(batch).enumerate() {
                scope.spawn(move |_| job(i * batch, chunk));
            }
        });
    }

    fn batch_size(&self, element_count: usize) -> usize {
        element_count.div_ceil(self.thread_count)
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("thread_count", &self.thread_count)
            .finish()
    }
}
