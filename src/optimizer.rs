//! Runs one task's global search with fault containment.
//!
//! A task never fails the batch: model errors, search errors and panics
//! raised while optimizing a task are caught here and reported on that task's
//! result as `converged = false`, carrying the clipped initial guess.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, warn};

use crate::error::Result;
use crate::global_opt::{clip_to_bounds, GlobalOptResult, GlobalOptimizer};
use crate::model::Model;
use crate::objective::ControlObjective;
use crate::problem::Problem;
use crate::task::{Task, TaskResult};

/// Default base seed when none is configured.
pub const DEFAULT_SEED: u64 = 0x5EED;

/// Per-task driver around a `GlobalOptimizer` strategy.
///
/// Each task's random stream is seeded with `seed + position`, so a task's
/// result depends only on the task and the seed, never on which worker ran
/// it or when.
#[derive(Debug, Clone)]
pub struct TaskOptimizer<O> {
    strategy: O,
    seed: u64,
}

impl<O: GlobalOptimizer> TaskOptimizer<O> {
    /// Driver running `strategy` with per-task seeds derived from `seed`.
    pub fn new(strategy: O, seed: u64) -> Self {
        Self { strategy, seed }
    }

    pub fn strategy(&self) -> &O {
        &self.strategy
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Optimize one task against `model`.
    pub fn run<M: Model + ?Sized>(&self, task: &Task, model: &M) -> TaskResult {
        let start = clip_to_bounds(&task.initial_controls, &task.bounds);
        let seed = self.seed.wrapping_add(task.position as u64);

        if let Some(message) = unusable_input(task) {
            warn!(position = task.position, timestamp = %task.timestamp, "{}", message);
            return TaskResult::failed(task, start, message);
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.search(task, model, seed)));

        match outcome {
            Ok(Ok((initial_objective, result))) => {
                debug!(
                    position = task.position,
                    cost = result.cost,
                    iterations = result.iterations,
                    func_evals = result.func_evals,
                    success = result.success,
                    "Task optimized"
                );
                TaskResult {
                    position: task.position,
                    timestamp: task.timestamp.clone(),
                    controls: result.params,
                    converged: result.success,
                    initial_objective,
                    optimized_objective: Some(result.cost),
                    message: result.message,
                }
            }
            Ok(Err(err)) => {
                warn!(position = task.position, timestamp = %task.timestamp, error = %err, "Task search failed");
                TaskResult::failed(task, start, err.to_string())
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(position = task.position, timestamp = %task.timestamp, panic = %message, "Task search panicked");
                TaskResult::failed(task, start, format!("panic: {}", message))
            }
        }
    }

    fn search<M: Model + ?Sized>(
        &self,
        task: &Task,
        model: &M,
        seed: u64,
    ) -> Result<(Option<f64>, GlobalOptResult)> {
        let problem = ControlObjective::new(
            &task.noncontrols,
            model,
            task.outlet,
            task.c,
            task.initial_controls.len(),
        );
        let start = clip_to_bounds(&task.initial_controls, &task.bounds);
        let initial_objective = problem.eval_cost(&start).ok();

        let result =
            self.strategy
                .minimize(&problem, &task.bounds, &start, task.max_iterations, seed)?;

        Ok((initial_objective, result))
    }
}

/// A missing outlet or non-control reading makes every evaluation NaN.
fn unusable_input(task: &Task) -> Option<String> {
    if !task.outlet.is_finite() {
        return Some(format!("Outlet value {} is not finite", task.outlet));
    }
    task.noncontrols
        .iter()
        .position(|v| !v.is_finite())
        .map(|i| format!("Non-control value {} is not finite", i))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::Bounds;
    use crate::error::HistOptError;
    use crate::global_opt::{within_bounds, DualAnnealing};
    use crate::model::FnModel;
    use ndarray::{array, Array1};

    fn scenario_task() -> Task {
        Task {
            position: 0,
            timestamp: "2022-03-01 00:00:00".to_string(),
            initial_controls: array![10.0, 5.0],
            noncontrols: array![2.0],
            bounds: vec![Bounds::from((8.0, 12.0)), Bounds::from((3.0, 7.0))],
            outlet: 17.0,
            c: 0.01,
            max_iterations: 50,
        }
    }

    #[test]
    fn test_scenario_improves_on_initial_guess() {
        let model = FnModel::new(|v: &Array1<f64>| Ok(v[0] + v[1] + v[2]));
        let optimizer = TaskOptimizer::new(DualAnnealing::new(), 42);
        let task = scenario_task();

        let result = optimizer.run(&task, &model);

        assert!(result.converged);
        assert!(within_bounds(&result.controls, &task.bounds));
        assert_eq!(result.initial_objective, Some(15.0));
        let optimized = result.optimized_objective.unwrap();
        assert!(optimized <= 15.0);
        assert!(optimized < 11.05, "objective was {}", optimized);
    }

    #[test]
    fn test_model_error_is_contained() {
        let model = FnModel::new(|_: &Array1<f64>| {
            Err(HistOptError::FunctionEvaluation("sensor offline".to_string()))
        });
        let optimizer = TaskOptimizer::new(DualAnnealing::new(), 1);
        let task = scenario_task();

        let result = optimizer.run(&task, &model);

        assert!(!result.converged);
        assert_eq!(result.controls, task.initial_controls);
        assert!(result.message.contains("sensor offline"));
    }

    #[test]
    fn test_model_panic_is_contained() {
        let model = FnModel::new(|_: &Array1<f64>| -> Result<f64> { panic!("model exploded") });
        let optimizer = TaskOptimizer::new(DualAnnealing::new(), 1);
        let task = scenario_task();

        let result = optimizer.run(&task, &model);

        assert!(!result.converged);
        assert!(result.message.contains("model exploded"));
        assert_eq!(result.position, task.position);
    }

    #[test]
    fn test_missing_readings_fail_without_model_calls() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let model = FnModel::new(move |v: &Array1<f64>| {
            counter.fetch_add(1, Ordering::Relaxed);
            Ok(v.sum())
        });
        let optimizer = TaskOptimizer::new(DualAnnealing::new(), 1);

        let mut no_outlet = scenario_task();
        no_outlet.outlet = f64::NAN;
        let mut no_reading = scenario_task();
        no_reading.noncontrols = array![f64::NAN];

        for task in [no_outlet, no_reading] {
            let result = optimizer.run(&task, &model);
            assert!(!result.converged);
            assert_eq!(result.controls, task.initial_controls);
            assert!(result.message.contains("not finite"));
        }
        assert_eq!(calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_out_of_bounds_start_is_clipped() {
        let model = FnModel::new(|v: &Array1<f64>| Ok(v.sum()));
        let optimizer = TaskOptimizer::new(DualAnnealing::new(), 3);
        let mut task = scenario_task();
        task.initial_controls = array![20.0, -1.0];

        let result = optimizer.run(&task, &model);
        assert!(within_bounds(&result.controls, &task.bounds));
    }
}
