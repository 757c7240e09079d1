//! Order-tagged optimization tasks and their results.
//!
//! Every table row becomes exactly one `Task`. A task's `position` is its
//! 0-based row index and is the only key used to put results back in order;
//! timestamps ride along for bookkeeping.

use ndarray::Array1;

use crate::bounds::Bounds;
use crate::error::{HistOptError, Result};
use crate::table::HistoricalTable;

/// One independent per-timestamp optimization problem.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    /// 0-based row index in submission order
    pub position: usize,

    /// Row timestamp, carried through unchanged
    pub timestamp: String,

    /// Historical control values, used as the initial guess
    pub initial_controls: Array1<f64>,

    /// Non-control values fed to the model
    pub noncontrols: Array1<f64>,

    /// Feasible interval per control variable
    pub bounds: Vec<Bounds>,

    /// Target outlet value for the deviation penalty
    pub outlet: f64,

    /// Weight of the deviation penalty
    pub c: f64,

    /// Iteration cap for the search
    pub max_iterations: usize,
}

/// Outcome of one task. Produced exactly once per task, same position.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskResult {
    pub position: usize,
    pub timestamp: String,

    /// Optimized control values (best point found)
    pub controls: Array1<f64>,

    /// Best-effort success signal from the search
    pub converged: bool,

    /// Objective at the initial guess, if it could be evaluated
    pub initial_objective: Option<f64>,

    /// Objective at `controls`, if the search completed
    pub optimized_objective: Option<f64>,

    /// Termination message or fault description
    pub message: String,
}

impl TaskResult {
    /// Result for a task whose search faulted: keeps `fallback` as the point.
    pub fn failed(task: &Task, fallback: Array1<f64>, message: impl Into<String>) -> Self {
        Self {
            position: task.position,
            timestamp: task.timestamp.clone(),
            controls: fallback,
            converged: false,
            initial_objective: None,
            optimized_objective: None,
            message: message.into(),
        }
    }
}

/// Slices a historical table into one task per row.
#[derive(Debug, Clone)]
pub struct TaskFormatter {
    control_variables: Vec<String>,
    noncontrol_variables: Vec<String>,
    max_iterations: usize,
    c: f64,
}

impl TaskFormatter {
    /// Formatter for the given column selections and per-task search settings.
    pub fn new(
        control_variables: Vec<String>,
        noncontrol_variables: Vec<String>,
        max_iterations: usize,
        c: f64,
    ) -> Self {
        Self {
            control_variables,
            noncontrol_variables,
            max_iterations,
            c,
        }
    }

    /// Control columns, in the order tasks carry them.
    pub fn control_variables(&self) -> &[String] {
        &self.control_variables
    }

    /// Build the task sequence for `table`.
    ///
    /// # Arguments
    ///
    /// * `table` - Rows in submission order
    /// * `bounds` - One bounds set per row
    /// * `outlet` - One outlet target per row
    ///
    /// # Returns
    ///
    /// * One task per row, `position == row index`
    pub fn format(
        &self,
        table: &HistoricalTable,
        bounds: &[Vec<Bounds>],
        outlet: &[f64],
    ) -> Result<Vec<Task>> {
        let rows = table.len();
        if bounds.len() != rows {
            return Err(HistOptError::DimensionMismatch(format!(
                "Expected {} bounds rows, got {}",
                rows,
                bounds.len()
            )));
        }
        if outlet.len() != rows {
            return Err(HistOptError::DimensionMismatch(format!(
                "Expected {} outlet values, got {}",
                rows,
                outlet.len()
            )));
        }

        let controls = table.select(&self.control_variables)?;
        let noncontrols = table.select(&self.noncontrol_variables)?;

        let tasks = table
            .timestamps()
            .iter()
            .enumerate()
            .map(|(position, timestamp)| Task {
                position,
                timestamp: timestamp.clone(),
                initial_controls: controls.row(position).to_owned(),
                noncontrols: noncontrols.row(position).to_owned(),
                bounds: bounds[position].clone(),
                outlet: outlet[position],
                c: self.c,
                max_iterations: self.max_iterations,
            })
            .collect();

        Ok(tasks)
    }
}
