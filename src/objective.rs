//! Economic/deviation cost for one timestamp.
//!
//! The cost trades resource consumption against keeping the model's
//! predicted outlet near its target:
//!
//! ```text
//! cost = sum(x[..PRIMARY_INPUTS]) + c * |model.predict([x, noncontrol]) - outlet|
//! ```
//!
//! The primary inputs are the first two control variables (oil and gas by
//! convention). `c` weights the deviation term.

use ndarray::Array1;

use crate::error::{HistOptError, Result};
use crate::model::Model;
use crate::problem::Problem;

/// Number of leading control variables counted as consumed resources.
pub const PRIMARY_INPUTS: usize = 2;

/// Evaluate the objective for one control vector.
///
/// # Arguments
///
/// * `x` - Candidate control values
/// * `noncontrol` - Fixed non-control values for the row
/// * `model` - Predictive model for the outlet
/// * `outlet` - Target outlet value
/// * `c` - Weight of the deviation term
///
/// # Examples
///
/// ```
/// use histopt_rs::model::FnModel;
/// use histopt_rs::objective::objective;
/// use ndarray::{array, Array1};
///
/// let model = FnModel::new(|v: &Array1<f64>| Ok(v.sum()));
/// let cost = objective(&array![10.0, 5.0], &array![2.0], &model, 17.0, 0.01).unwrap();
/// assert_eq!(cost, 15.0);
/// ```
pub fn objective<M: Model + ?Sized>(
    x: &Array1<f64>,
    noncontrol: &Array1<f64>,
    model: &M,
    outlet: f64,
    c: f64,
) -> Result<f64> {
    ControlObjective::new(noncontrol, model, outlet, c, x.len()).eval_cost(x)
}

/// The objective for one task, bound to its row data and model.
#[derive(Debug)]
pub struct ControlObjective<'a, M: ?Sized> {
    noncontrol: &'a Array1<f64>,
    model: &'a M,
    outlet: f64,
    c: f64,
    control_count: usize,
}

impl<'a, M: Model + ?Sized> ControlObjective<'a, M> {
    pub fn new(
        noncontrol: &'a Array1<f64>,
        model: &'a M,
        outlet: f64,
        c: f64,
        control_count: usize,
    ) -> Self {
        Self {
            noncontrol,
            model,
            outlet,
            c,
            control_count,
        }
    }

    /// Concatenate controls and non-controls into the model input.
    fn model_input(&self, x: &Array1<f64>) -> Array1<f64> {
        x.iter().chain(self.noncontrol.iter()).copied().collect()
    }
}

impl<M: Model + ?Sized> Problem for ControlObjective<'_, M> {
    fn eval_cost(&self, x: &Array1<f64>) -> Result<f64> {
        if x.len() != self.control_count {
            return Err(HistOptError::DimensionMismatch(format!(
                "Expected {} control values, got {}",
                self.control_count,
                x.len()
            )));
        }

        let prediction = self.model.predict(&self.model_input(x))?;
        if !prediction.is_finite() {
            return Err(HistOptError::FunctionEvaluation(format!(
                "Model returned a non-finite prediction: {}",
                prediction
            )));
        }

        let consumed: f64 = x.iter().take(PRIMARY_INPUTS).sum();

        Ok(consumed + self.c * (prediction - self.outlet).abs())
    }

    fn parameter_count(&self) -> usize {
        self.control_count
    }
}
