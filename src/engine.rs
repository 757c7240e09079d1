//! Batch entry point.
//!
//! `HistoricalOptimizer::run` takes a historical table and a model and
//! returns one optimized row per input row:
//!
//! ```text
//! filter -> bounds -> tasks -> worker pool -> aggregate
//! ```
//!
//! Bounds and tasks are fully built before any dispatch, so configuration
//! and data errors surface before a single search runs.

use std::borrow::Cow;
use std::time::Instant;

use tracing::{info, warn};

use crate::aggregate::{ResultAggregator, ResultTable};
use crate::config::OptimizationConfig;
use crate::error::Result;
use crate::global_opt::GlobalOptimizer;
use crate::model::Model;
use crate::optimizer::{TaskOptimizer, DEFAULT_SEED};
use crate::pool::WorkerPool;
use crate::table::HistoricalTable;
use crate::task::{Task, TaskFormatter};

/// Runs per-timestamp optimization over a whole historical table.
#[derive(Debug)]
pub struct HistoricalOptimizer {
    config: OptimizationConfig,
    pool: WorkerPool,
}

impl HistoricalOptimizer {
    /// Validate `config` and build the worker pool it asks for.
    pub fn new(config: OptimizationConfig) -> Result<Self> {
        config.validate()?;
        let pool = match config.worker_count {
            Some(workers) => WorkerPool::new(workers)?,
            None => WorkerPool::with_available_parallelism()?,
        };
        Ok(Self { config, pool })
    }

    pub fn config(&self) -> &OptimizationConfig {
        &self.config
    }

    pub fn workers(&self) -> usize {
        self.pool.workers()
    }

    /// Optimize every row with the configured strategy.
    pub fn run<M>(&self, table: &HistoricalTable, model: &M) -> Result<ResultTable>
    where
        M: Model + Clone + Send + Sync,
    {
        self.run_with(table, model, self.config.strategy)
    }

    /// Optimize every row with an explicit search strategy.
    pub fn run_with<M, O>(&self, table: &HistoricalTable, model: &M, strategy: O) -> Result<ResultTable>
    where
        M: Model + Clone + Send + Sync,
        O: GlobalOptimizer + Sync,
    {
        let control_variables = self.config.control_variables();
        let aggregator = ResultAggregator::new(table.timestamp_label(), control_variables);

        let tasks = self.prepare(table)?;
        if tasks.is_empty() {
            info!("No rows to optimize");
            return aggregator.aggregate(Vec::new());
        }

        let start = Instant::now();
        let optimizer = TaskOptimizer::new(strategy, self.config.seed.unwrap_or(DEFAULT_SEED));
        let results = self.pool.run(&tasks, model, &optimizer);
        let table = aggregator.aggregate(results)?;

        let failed = table.failed_count();
        if failed > 0 {
            warn!(failed, total = table.len(), "Some rows did not converge");
        }
        info!(
            rows = table.len(),
            elapsed_secs = start.elapsed().as_secs_f64(),
            "Optimization batch finished"
        );

        Ok(table)
    }

    /// Build the full task sequence for `table`: row filter, bounds, tasks.
    pub fn prepare(&self, table: &HistoricalTable) -> Result<Vec<Task>> {
        if table.is_empty() {
            return Ok(Vec::new());
        }

        let table = match self.config.outlet_min {
            Some(min) => {
                let kept = table.retain_at_least(&self.config.outlet_column, min)?;
                let dropped = table.len() - kept.len();
                if dropped > 0 {
                    info!(
                        dropped,
                        kept = kept.len(),
                        "Dropped rows with {} below {}",
                        self.config.outlet_column,
                        min
                    );
                }
                Cow::Owned(kept)
            }
            None => Cow::Borrowed(table),
        };

        let bounds = self.config.bounds_calculator().compute(&table)?;
        let outlet = table.column_owned(&self.config.outlet_column)?.to_vec();

        let formatter = TaskFormatter::new(
            self.config.control_variables(),
            self.config.noncontrollable.clone(),
            self.config.max_iterations,
            self.config.c,
        );
        formatter.format(&table, &bounds, &outlet)
    }
}
