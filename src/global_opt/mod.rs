//! Bounded global optimization methods.
//!
//! Every per-timestamp task is solved by a bounded, derivative-free global
//! search seeded with the row's historical controls. The `GlobalOptimizer`
//! trait is the pluggable strategy interface:
//! `minimize(problem, bounds, x0, max_iterations, seed) -> GlobalOptResult`.
//! Implementations must return a point inside `bounds` and must be
//! deterministic for a given seed.

use ndarray::Array1;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::bounds::Bounds;
use crate::error::{HistOptError, Result};
use crate::problem::Problem;

/// Trait for global optimization methods.
pub trait GlobalOptimizer {
    /// Minimize `problem` inside `bounds`, starting from `x0`.
    ///
    /// # Arguments
    ///
    /// * `problem` - The problem to solve
    /// * `bounds` - Feasible interval for each parameter
    /// * `x0` - Initial guess; clipped into `bounds` before use
    /// * `max_iterations` - Maximum number of iterations
    /// * `seed` - Seed for the random number generator
    ///
    /// # Returns
    ///
    /// * The best point found, its cost and the algorithm's convergence signal
    fn minimize<P: Problem>(
        &self,
        problem: &P,
        bounds: &[Bounds],
        x0: &Array1<f64>,
        max_iterations: usize,
        seed: u64,
    ) -> Result<GlobalOptResult>;
}

/// Result of a global optimization.
#[derive(Debug, Clone)]
pub struct GlobalOptResult {
    /// The best parameters found
    pub params: Array1<f64>,

    /// The best cost found
    pub cost: f64,

    /// The number of iterations performed
    pub iterations: usize,

    /// The number of function evaluations
    pub func_evals: usize,

    /// Whether the search terminated under its own success criteria
    pub success: bool,

    /// A message describing the result
    pub message: String,
}

impl fmt::Display for GlobalOptResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Global Optimization Result:")?;
        writeln!(f, "  Success: {}", self.success)?;
        writeln!(f, "  Cost: {:.6e}", self.cost)?;
        writeln!(f, "  Iterations: {}", self.iterations)?;
        writeln!(f, "  Function evaluations: {}", self.func_evals)?;
        writeln!(f, "  Message: {}", self.message)?;
        writeln!(f, "  Parameters: {:?}", self.params)?;
        Ok(())
    }
}

mod differential_evolution;
mod dual_annealing;
mod simulated_annealing;

pub use differential_evolution::{DEStrategy, DifferentialEvolution};
pub use dual_annealing::DualAnnealing;
pub use simulated_annealing::SimulatedAnnealing;

/// Search strategy selectable from configuration or the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Generalized simulated annealing with local refinement
    #[default]
    DualAnnealing,

    /// Classic simulated annealing with geometric cooling
    SimulatedAnnealing,

    /// Differential evolution seeded with the initial guess
    DifferentialEvolution,
}

impl FromStr for Strategy {
    type Err = HistOptError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "dual-annealing" => Ok(Self::DualAnnealing),
            "simulated-annealing" => Ok(Self::SimulatedAnnealing),
            "differential-evolution" => Ok(Self::DifferentialEvolution),
            other => Err(HistOptError::InvalidConfig(format!(
                "Unknown strategy '{}'; expected dual-annealing, simulated-annealing or differential-evolution",
                other
            ))),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DualAnnealing => "dual-annealing",
            Self::SimulatedAnnealing => "simulated-annealing",
            Self::DifferentialEvolution => "differential-evolution",
        };
        f.write_str(name)
    }
}

impl GlobalOptimizer for Strategy {
    fn minimize<P: Problem>(
        &self,
        problem: &P,
        bounds: &[Bounds],
        x0: &Array1<f64>,
        max_iterations: usize,
        seed: u64,
    ) -> Result<GlobalOptResult> {
        match self {
            Self::DualAnnealing => {
                DualAnnealing::default().minimize(problem, bounds, x0, max_iterations, seed)
            }
            Self::SimulatedAnnealing => {
                SimulatedAnnealing::default().minimize(problem, bounds, x0, max_iterations, seed)
            }
            Self::DifferentialEvolution => DifferentialEvolution::default()
                .minimize(problem, bounds, x0, max_iterations, seed),
        }
    }
}

/// Check that the problem, bounds and initial guess agree on dimension.
fn check_dimensions<P: Problem>(problem: &P, bounds: &[Bounds], x0: &Array1<f64>) -> Result<()> {
    let n_params = problem.parameter_count();
    if n_params != bounds.len() {
        return Err(HistOptError::DimensionMismatch(format!(
            "Expected {} bounds for parameters, got {}",
            n_params,
            bounds.len()
        )));
    }
    if x0.len() != bounds.len() {
        return Err(HistOptError::DimensionMismatch(format!(
            "Expected {} initial values, got {}",
            bounds.len(),
            x0.len()
        )));
    }
    Ok(())
}

/// Generate a random point within the given bounds.
///
/// Degenerate intervals (`low == high`) always yield `low`.
pub(crate) fn random_point(bounds: &[Bounds], rng: &mut impl Rng) -> Array1<f64> {
    bounds
        .iter()
        .map(|b| {
            if b.range() > 0.0 {
                rng.gen_range(b.low..b.high)
            } else {
                b.low
            }
        })
        .collect()
}

/// Clip a point to the given bounds.
pub(crate) fn clip_to_bounds(point: &Array1<f64>, bounds: &[Bounds]) -> Array1<f64> {
    let mut clipped = point.clone();

    for (value, b) in clipped.iter_mut().zip(bounds.iter()) {
        *value = if value.is_nan() { b.low } else { b.clamp(*value) };
    }

    clipped
}

/// Check that every component of `point` lies within its bounds.
pub fn within_bounds(point: &Array1<f64>, bounds: &[Bounds]) -> bool {
    point.len() == bounds.len()
        && point
            .iter()
            .zip(bounds.iter())
            .all(|(value, b)| b.contains(*value))
}

/// Function evaluator that counts calls against a budget.
struct Evaluator<'p, P> {
    problem: &'p P,
    evals: usize,
    max_evals: usize,
}

impl<'p, P: Problem> Evaluator<'p, P> {
    fn new(problem: &'p P, max_evals: usize) -> Self {
        Self {
            problem,
            evals: 0,
            max_evals,
        }
    }

    fn eval(&mut self, point: &Array1<f64>) -> Result<f64> {
        self.evals += 1;
        self.problem.eval_cost(point)
    }

    fn exhausted(&self) -> bool {
        self.evals >= self.max_evals
    }
}
