//! Fixed-size worker pool.
//!
//! A [`WorkerPool`] owns a dedicated [`rayon::ThreadPool`] so that matching
//! never touches rayon's global pool. The pool is built once per
//! [`FrameMatcher`](crate::FrameMatcher) and its threads are joined when the
//! pool is dropped.

use rayon::{
    ThreadPool, ThreadPoolBuilder,
    iter::{IntoParallelRefIterator, ParallelIterator},
};

use crate::error::SeamError;

/// Worker count used when the number of logical processors is unknown.
pub const FALLBACK_WORKER_COUNT: usize = 4;

/// Number of logical processors, or [`FALLBACK_WORKER_COUNT`] when the
/// platform cannot report it.
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|count| count.get())
        .unwrap_or(FALLBACK_WORKER_COUNT)
        .max(1)
}

/// A fixed-size pool of worker threads.
pub struct WorkerPool {
    pool: ThreadPool,
    worker_count: usize,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("worker_count", &self.worker_count)
            .finish()
    }
}

impl WorkerPool {
    /// Build a pool with exactly `worker_count` threads.
    ///
    /// # Errors
    ///
    /// Returns [`SeamError::InvalidOptions`] for a zero count and
    /// [`SeamError::WorkerPool`] if the threads cannot be spawned.
    pub fn new(worker_count: usize) -> Result<Self, SeamError> {
        if worker_count == 0 {
            return Err(SeamError::InvalidOptions(
                "worker count must be greater than zero".to_string(),
            ));
        }
        let pool = ThreadPoolBuilder::new()
            .thread_name(|index| format!("seamfind-worker-{index}"))
            .num_threads(worker_count)
            .build()
            .map_err(|error| SeamError::WorkerPool(error.to_string()))?;
        Ok(Self { pool, worker_count })
    }

    /// Build a pool sized to the machine.
    pub fn with_default_size() -> Result<Self, SeamError> {
        Self::new(default_worker_count())
    }

    /// Number of worker threads.
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Apply `f` to every item on the pool, returning results in input order.
    pub fn map<T, R, F>(&self, items: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        self.pool.install(|| items.par_iter().map(f).collect())
    }
}
