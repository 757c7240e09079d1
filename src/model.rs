//! Predictive model boundary.
//!
//! The optimizer only ever asks a model for one thing: a scalar prediction for
//! a concatenated `[controls..., noncontrols...]` input vector. The `Model`
//! trait captures exactly that capability. Implementations must behave as pure
//! functions for the duration of a batch, because the same model is evaluated
//! many times per task and from several workers at once.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{HistOptError, Result};

/// A read-only predictive model.
///
/// Workers each receive their own clone of the model, so implementations
/// should be cheap to clone (wrap large state in an `Arc`).
pub trait Model {
    /// Predict the outlet quantity for the given input vector.
    ///
    /// # Arguments
    ///
    /// * `input` - Control values followed by non-control values
    ///
    /// # Returns
    ///
    /// * The scalar prediction, or an error if the model cannot evaluate the input
    fn predict(&self, input: &Array1<f64>) -> Result<f64>;
}

impl<M: Model + ?Sized> Model for &M {
    fn predict(&self, input: &Array1<f64>) -> Result<f64> {
        (**self).predict(input)
    }
}

impl<M: Model + ?Sized> Model for std::sync::Arc<M> {
    fn predict(&self, input: &Array1<f64>) -> Result<f64> {
        (**self).predict(input)
    }
}

/// A model backed by a closure.
///
/// # Examples
///
/// ```
/// use histopt_rs::model::{FnModel, Model};
/// use ndarray::{array, Array1};
///
/// let model = FnModel::new(|v: &Array1<f64>| Ok(v.sum()));
/// assert_eq!(model.predict(&array![10.0, 5.0, 2.0]).unwrap(), 17.0);
/// ```
#[derive(Clone)]
pub struct FnModel<F> {
    func: F,
}

impl<F> FnModel<F>
where
    F: Fn(&Array1<f64>) -> Result<f64>,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> fmt::Debug for FnModel<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnModel").finish_non_exhaustive()
    }
}

impl<F> Model for FnModel<F>
where
    F: Fn(&Array1<f64>) -> Result<f64>,
{
    fn predict(&self, input: &Array1<f64>) -> Result<f64> {
        (self.func)(input)
    }
}

/// Adapts a model that returns a vector of outputs; the first output is used.
#[derive(Clone)]
pub struct FirstOutput<F> {
    func: F,
}

impl<F> FirstOutput<F>
where
    F: Fn(&Array1<f64>) -> Result<Array1<f64>>,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> Model for FirstOutput<F>
where
    F: Fn(&Array1<f64>) -> Result<Array1<f64>>,
{
    fn predict(&self, input: &Array1<f64>) -> Result<f64> {
        let outputs = (self.func)(input)?;
        outputs.first().copied().ok_or_else(|| {
            HistOptError::FunctionEvaluation("Model returned an empty prediction".to_string())
        })
    }
}

/// Linear regression model `intercept + coefficients · input`.
///
/// This is the serializable model the command line tool loads from JSON,
/// so it can be materialized independently in every worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    /// One coefficient per input feature, in input order
    pub coefficients: Vec<f64>,

    /// Constant term
    #[serde(default)]
    pub intercept: f64,
}

impl LinearModel {
    pub fn new(coefficients: Vec<f64>, intercept: f64) -> Self {
        Self {
            coefficients,
            intercept,
        }
    }

    /// Number of input features the model expects.
    pub fn input_len(&self) -> usize {
        self.coefficients.len()
    }
}

impl Model for LinearModel {
    fn predict(&self, input: &Array1<f64>) -> Result<f64> {
        if input.len() != self.coefficients.len() {
            return Err(HistOptError::DimensionMismatch(format!(
                "Expected {} model inputs, got {}",
                self.coefficients.len(),
                input.len()
            )));
        }

        Ok(self.intercept
            + self
                .coefficients
                .iter()
                .zip(input.iter())
                .map(|(c, x)| c * x)
                .sum::<f64>())
    }
}
