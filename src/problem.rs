//! Problem definition trait.
//!
//! This module defines the `Problem` trait, a scalar cost function over a
//! fixed-length parameter vector. Every global optimizer in the crate
//! minimizes a `Problem`.

use ndarray::Array1;

use crate::error::Result;

/// A trait representing a scalar minimization problem.
pub trait Problem {
    /// Evaluate the cost at the given parameters.
    ///
    /// # Arguments
    ///
    /// * `params` - The parameter values at which to evaluate the cost
    ///
    /// # Returns
    ///
    /// * The cost value, or an error if the evaluation fails
    fn eval_cost(&self, params: &Array1<f64>) -> Result<f64>;

    /// Get the number of parameters in the problem.
    fn parameter_count(&self) -> usize;
}

impl<P: Problem + ?Sized> Problem for &P {
    fn eval_cost(&self, params: &Array1<f64>) -> Result<f64> {
        (**self).eval_cost(params)
    }

    fn parameter_count(&self) -> usize {
        (**self).parameter_count()
    }
}
