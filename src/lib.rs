//! # histopt-rs
//!
//! `histopt-rs` replays a historical process-control dataset and computes,
//! for every timestamp, the control-variable settings that minimize an
//! economic/deviation cost against a predictive model.
//!
//! The library provides:
//! - Per-row bounds from configured deltas, with non-negative clamping
//! - A pluggable bounded global search (`DualAnnealing` by default)
//! - A worker pool that optimizes rows in parallel and returns them in order
//! - Per-task fault containment: a failing row is flagged, never fatal
//!
//! ## Basic Usage
//!
//! ```
//! use histopt_rs::{ControlDelta, HistoricalOptimizer, HistoricalTable, LinearModel, OptimizationConfig};
//! use ndarray::array;
//!
//! let table = HistoricalTable::new(
//!     "Date",
//!     vec!["2022-03-01 00:00:00".to_string()],
//!     vec!["OIL".into(), "GAS".into(), "AIR".into(), "OUTLET".into()],
//!     array![[10.0, 5.0, 2.0, 17.0]],
//! )
//! .unwrap();
//!
//! let mut config = OptimizationConfig::new(
//!     vec![ControlDelta::new("OIL", -2.0, 2.0), ControlDelta::new("GAS", -2.0, 2.0)],
//!     vec!["AIR".to_string()],
//! );
//! config.worker_count = Some(2);
//! config.seed = Some(7);
//!
//! let model = LinearModel::new(vec![1.0, 1.0, 1.0], 0.0);
//! let result = HistoricalOptimizer::new(config).unwrap().run(&table, &model).unwrap();
//!
//! assert_eq!(result.columns(), &["OIL_Optimized", "GAS_Optimized"]);
//! assert_eq!(result.len(), 1);
//! ```

pub mod error;

pub mod bounds;
pub mod model;
pub mod objective;
pub mod problem;
pub mod table;

pub mod global_opt;
pub mod optimizer;
pub mod task;

pub mod aggregate;
pub mod pool;
pub mod progress;

pub mod config;
pub mod engine;
pub mod io;

// Re-exports for convenience
pub use aggregate::{ResultAggregator, ResultTable};
pub use bounds::{Bounds, BoundsCalculator, ControlDelta};
pub use config::OptimizationConfig;
pub use engine::HistoricalOptimizer;
pub use error::{HistOptError, Result};
pub use global_opt::{
    DifferentialEvolution, DualAnnealing, GlobalOptResult, GlobalOptimizer, SimulatedAnnealing,
    Strategy,
};
pub use model::{FnModel, LinearModel, Model};
pub use objective::{objective, ControlObjective};
pub use optimizer::TaskOptimizer;
pub use pool::WorkerPool;
pub use problem::Problem;
pub use table::HistoricalTable;
pub use task::{Task, TaskFormatter, TaskResult};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
