//! Parallel execution of independent tasks.
//!
//! A dedicated rayon pool runs the batch. The model is cloned once per rayon
//! job and each clone serves every task of that job, so no model is ever
//! shared between concurrently running tasks. Results come back in submission
//! order regardless of completion order.

use std::thread;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{info, warn};

use crate::error::{HistOptError, Result};
use crate::global_opt::GlobalOptimizer;
use crate::model::Model;
use crate::optimizer::TaskOptimizer;
use crate::progress::BatchProgress;
use crate::task::{Task, TaskResult};

/// Smallest accepted worker count.
pub const MIN_WORKERS: usize = 2;

/// Fixed-size pool of optimization workers.
pub struct WorkerPool {
    workers: usize,
    pool: ThreadPool,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers)
            .finish()
    }
}

impl WorkerPool {
    /// Create a pool with `workers` threads.
    ///
    /// Fewer than two workers is a configuration error. A request above the
    /// machine's available parallelism is reduced to it (never below two).
    pub fn new(workers: usize) -> Result<Self> {
        if workers < MIN_WORKERS {
            return Err(HistOptError::WorkerPool(format!(
                "Worker count must be at least {}, got {}",
                MIN_WORKERS, workers
            )));
        }

        let available = available_parallelism();
        let workers = if workers > available {
            let reduced = available.max(MIN_WORKERS);
            warn!(
                requested = workers,
                available, "Requested more workers than available cores, using {}", reduced
            );
            reduced
        } else {
            workers
        };

        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("histopt-worker-{}", i))
            .build()
            .map_err(|e| HistOptError::WorkerPool(e.to_string()))?;

        Ok(Self { workers, pool })
    }

    /// Pool sized to all available cores.
    pub fn with_available_parallelism() -> Result<Self> {
        Self::new(available_parallelism().max(MIN_WORKERS))
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Optimize every task and return one result per task, in task order.
    ///
    /// A failure inside one task is reported on that task's result and never
    /// aborts the others.
    pub fn run<M, O>(&self, tasks: &[Task], model: &M, optimizer: &TaskOptimizer<O>) -> Vec<TaskResult>
    where
        M: Model + Clone + Send + Sync,
        O: GlobalOptimizer + Sync,
    {
        let progress = BatchProgress::new(tasks.len());
        info!(
            tasks = tasks.len(),
            workers = self.workers,
            "Dispatching optimization tasks"
        );

        self.pool.install(|| {
            tasks
                .par_iter()
                .map_init(
                    || model.clone(),
                    |local_model, task| {
                        let result = optimizer.run(task, &*local_model);
                        progress.tick();
                        result
                    },
                )
                .collect()
        })
    }
}

fn available_parallelism() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(MIN_WORKERS)
}
