//! Simulated Annealing algorithm for global optimization.
//!
//! Classic Metropolis annealing with geometric cooling. The first walk starts
//! at the caller's initial guess; optional restarts start from random points
//! inside the bounds and the best walk wins.

use ndarray::Array1;
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::bounds::Bounds;
use crate::error::Result;
use crate::global_opt::{
    check_dimensions, clip_to_bounds, random_point, Evaluator, GlobalOptResult, GlobalOptimizer,
};
use crate::problem::Problem;

/// Simulated Annealing algorithm for global optimization.
#[derive(Debug, Clone)]
pub struct SimulatedAnnealing {
    /// Initial temperature
    pub initial_temp: f64,

    /// Cooling rate
    pub cooling_rate: f64,

    /// Additional walks from random starting points
    pub restarts: usize,

    /// Step size as a fraction of each parameter's range
    pub step_size: f64,

    /// Stop a walk after this many iterations without a new best
    pub max_no_improvement: usize,
}

impl Default for SimulatedAnnealing {
    fn default() -> Self {
        Self {
            initial_temp: 100.0,
            cooling_rate: 0.95,
            restarts: 2,
            step_size: 0.1,
            max_no_improvement: 100,
        }
    }
}

impl SimulatedAnnealing {
    /// Create a new SimulatedAnnealing optimizer with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new SimulatedAnnealing optimizer with custom parameters.
    ///
    /// # Arguments
    ///
    /// * `initial_temp` - Initial temperature
    /// * `cooling_rate` - Cooling rate (0.9-0.99 is typical)
    /// * `restarts` - Additional random-start walks
    /// * `step_size` - Step size for perturbations
    pub fn with_params(initial_temp: f64, cooling_rate: f64, restarts: usize, step_size: f64) -> Self {
        Self {
            initial_temp,
            cooling_rate,
            restarts,
            step_size,
            ..Self::default()
        }
    }

    /// One annealing walk from `start`.
    fn walk<P: Problem>(
        &self,
        evaluator: &mut Evaluator<'_, P>,
        start: Array1<f64>,
        bounds: &[Bounds],
        max_iterations: usize,
        rng: &mut StdRng,
    ) -> Result<(Array1<f64>, f64, usize)> {
        let mut current_solution = start;
        let mut current_cost = evaluator.eval(&current_solution)?;

        let mut best_solution = current_solution.clone();
        let mut best_cost = current_cost;

        let mut temperature = self.initial_temp;
        let mut iterations = 0;
        let mut no_improvement = 0;

        while iterations < max_iterations && no_improvement < self.max_no_improvement {
            let candidate = self.perturb_solution(&current_solution, bounds, rng);
            let candidate_cost = evaluator.eval(&candidate)?;

            let cost_diff = candidate_cost - current_cost;

            // Worse candidates pass with probability exp(-diff / T)
            let accept = if cost_diff <= 0.0 {
                true
            } else {
                let probability = (-cost_diff / temperature).exp();
                rng.gen::<f64>() < probability
            };

            if accept {
                current_solution = candidate;
                current_cost = candidate_cost;

                if current_cost < best_cost {
                    best_solution = current_solution.clone();
                    best_cost = current_cost;
                    no_improvement = 0;
                } else {
                    no_improvement += 1;
                }
            } else {
                no_improvement += 1;
            }

            temperature *= self.cooling_rate;
            iterations += 1;
        }

        Ok((best_solution, best_cost, iterations))
    }

    /// Perturb a solution by adding random values to each parameter.
    fn perturb_solution(
        &self,
        solution: &Array1<f64>,
        bounds: &[Bounds],
        rng: &mut impl Rng,
    ) -> Array1<f64> {
        let mut new_solution = solution.clone();

        for (value, b) in new_solution.iter_mut().zip(bounds.iter()) {
            let step = b.range() * self.step_size;
            if step > 0.0 {
                *value += Uniform::new(-step, step).sample(rng);
            }
        }

        clip_to_bounds(&new_solution, bounds)
    }
}

impl GlobalOptimizer for SimulatedAnnealing {
    fn minimize<P: Problem>(
        &self,
        problem: &P,
        bounds: &[Bounds],
        x0: &Array1<f64>,
        max_iterations: usize,
        seed: u64,
    ) -> Result<GlobalOptResult> {
        check_dimensions(problem, bounds, x0)?;

        let mut rng = StdRng::seed_from_u64(seed);
        let mut evaluator = Evaluator::new(problem, usize::MAX);

        let (mut best_solution, mut best_cost, mut iterations) = self.walk(
            &mut evaluator,
            clip_to_bounds(x0, bounds),
            bounds,
            max_iterations,
            &mut rng,
        )?;

        for _ in 0..self.restarts {
            let start = random_point(bounds, &mut rng);
            let (solution, cost, walked) =
                self.walk(&mut evaluator, start, bounds, max_iterations, &mut rng)?;
            iterations += walked;

            if cost < best_cost {
                best_solution = solution;
                best_cost = cost;
            }
        }

        let success = best_cost.is_finite();
        let message = if success {
            format!("Completed {} walks", self.restarts + 1)
        } else {
            "Best cost is not finite".to_string()
        };

        Ok(GlobalOptResult {
            params: best_solution,
            cost: best_cost,
            iterations,
            func_evals: evaluator.evals,
            success,
            message,
        })
    }
}
