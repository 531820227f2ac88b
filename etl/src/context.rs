//! The execution context of a single run.

use std::time::{Duration, Instant};

use log::{debug, info};
use playlake_core::format_duration;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use ulid::Ulid;

/// Everything a run needs besides its settings: a worker pool to run the transformations
/// on, and an id to tell runs apart in the logs.
///
/// Created at the start of a run and torn down with [`ExecutionContext::stop`] at the end.
#[derive(Debug)]
pub struct ExecutionContext {
    run_id: Ulid,
    pool: ThreadPool,
    started: Instant,
}

impl ExecutionContext {
    /// Start the worker pool, `workers == 0` uses one thread per core.
    ///
    /// # Errors
    ///
    /// Fails if the pool's threads can't be spawned.
    pub fn new(run_id: Ulid, workers: usize) -> Result<Self, ThreadPoolBuildError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|idx| format!("playlake-worker-{idx}"))
            .build()?;
        debug!(
            "run {run_id}: started a pool of {} workers",
            pool.current_num_threads()
        );

        Ok(Self {
            run_id,
            pool,
            started: Instant::now(),
        })
    }

    #[must_use]
    pub const fn run_id(&self) -> Ulid {
        self.run_id
    }

    #[must_use]
    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `op` on the worker pool, rayon's parallel iterators used inside it run on the pool too.
    pub fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }

    /// Tear down the worker pool, returns how long the context was alive.
    pub fn stop(self) -> Duration {
        let elapsed = self.started.elapsed();
        drop(self.pool);
        info!("run {} took {}s", self.run_id, format_duration(&elapsed));
        elapsed
    }
}
