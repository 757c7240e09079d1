//! Differential Evolution algorithm for global optimization.
//!
//! A population-based stochastic minimizer. The initial population holds the
//! caller's initial guess plus random points inside the bounds. The search
//! reports convergence when the population's cost spread falls below
//! `tol * |mean cost|`.

use ndarray::Array1;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::bounds::Bounds;
use crate::error::Result;
use crate::global_opt::{
    check_dimensions, clip_to_bounds, random_point, Evaluator, GlobalOptResult, GlobalOptimizer,
};
use crate::problem::Problem;

/// Differential Evolution algorithm for global optimization.
#[derive(Debug, Clone)]
pub struct DifferentialEvolution {
    /// Population size multiplier (population size = multiplier * max(parameter count, 4))
    pub pop_size_multiplier: usize,

    /// Differential weight (F) in range [0, 2]
    pub differential_weight: f64,

    /// Crossover probability (CR) in range [0, 1]
    pub crossover_prob: f64,

    /// Relative tolerance on the population cost spread
    pub tol: f64,

    /// Strategy for creating candidate solutions
    pub strategy: DEStrategy,
}

/// Strategies for creating candidate solutions in Differential Evolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DEStrategy {
    /// DE/rand/1: x_r1 + F * (x_r2 - x_r3)
    Rand1,

    /// DE/best/1: x_best + F * (x_r1 - x_r2)
    Best1,

    /// DE/current-to-best/1: x_i + F * (x_best - x_i) + F * (x_r1 - x_r2)
    CurrentToBest1,
}

impl Default for DifferentialEvolution {
    fn default() -> Self {
        Self {
            pop_size_multiplier: 5,
            differential_weight: 0.8,
            crossover_prob: 0.9,
            tol: 0.01,
            strategy: DEStrategy::Best1,
        }
    }
}

impl DifferentialEvolution {
    /// Create a new DifferentialEvolution optimizer with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new DifferentialEvolution optimizer with custom parameters.
    pub fn with_params(
        pop_size_multiplier: usize,
        differential_weight: f64,
        crossover_prob: f64,
        strategy: DEStrategy,
    ) -> Self {
        Self {
            pop_size_multiplier,
            differential_weight,
            crossover_prob,
            strategy,
            ..Self::default()
        }
    }

    /// Create a trial vector for `target_idx` using the configured strategy.
    fn create_trial_vector(
        &self,
        target_idx: usize,
        best_idx: usize,
        population: &[Array1<f64>],
        bounds: &[Bounds],
        rng: &mut impl Rng,
    ) -> Array1<f64> {
        let n_params = population[target_idx].len();
        let f = self.differential_weight;

        let mut others: Vec<usize> = (0..population.len())
            .filter(|&i| i != target_idx && i != best_idx)
            .collect();
        others.shuffle(rng);

        let mut trial = match self.strategy {
            DEStrategy::Rand1 => {
                let (r1, r2, r3) = (others[0], others[1], others[2]);
                &population[r1] + &((&population[r2] - &population[r3]) * f)
            }
            DEStrategy::Best1 => {
                let (r1, r2) = (others[0], others[1]);
                &population[best_idx] + &((&population[r1] - &population[r2]) * f)
            }
            DEStrategy::CurrentToBest1 => {
                let (r1, r2) = (others[0], others[1]);
                let target = &population[target_idx];
                target
                    + &((&population[best_idx] - target) * f)
                    + &((&population[r1] - &population[r2]) * f)
            }
        };

        // Binomial crossover with the target vector
        let target = &population[target_idx];
        let j_rand = rng.gen_range(0..n_params);
        for j in 0..n_params {
            if rng.gen::<f64>() > self.crossover_prob && j != j_rand {
                trial[j] = target[j];
            }
        }

        clip_to_bounds(&trial, bounds)
    }
}

fn best_index(costs: &[f64]) -> usize {
    costs
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Population has converged when its cost spread is small relative to its mean.
fn population_converged(costs: &[f64], tol: f64) -> bool {
    let n = costs.len() as f64;
    let mean = costs.iter().sum::<f64>() / n;
    let variance = costs.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt() <= tol * mean.abs() + f64::EPSILON
}

impl GlobalOptimizer for DifferentialEvolution {
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

        // The strategies draw up to three distinct partners besides target and best
        let pop_size = (self.pop_size_multiplier * bounds.len().max(4)).max(5);
        let mut population = Vec::with_capacity(pop_size);
        population.push(clip_to_bounds(x0, bounds));
        while population.len() < pop_size {
            population.push(random_point(bounds, &mut rng));
        }

        let mut costs = population
            .iter()
            .map(|p| evaluator.eval(p))
            .collect::<Result<Vec<f64>>>()?;

        let mut iterations = 0;
        let mut converged = population_converged(&costs, self.tol);

        while !converged && iterations < max_iterations {
            for i in 0..pop_size {
                let best_idx = best_index(&costs);
                let trial = self.create_trial_vector(i, best_idx, &population, bounds, &mut rng);
                let trial_cost = evaluator.eval(&trial)?;

                if trial_cost <= costs[i] {
                    population[i] = trial;
                    costs[i] = trial_cost;
                }
            }

            iterations += 1;
            converged = population_converged(&costs, self.tol);
        }

        let best_idx = best_index(&costs);
        let best_cost = costs[best_idx];
        let success = converged && best_cost.is_finite();
        let message = if success {
            "Optimization terminated successfully".to_string()
        } else {
            "Maximum number of iterations has been exceeded".to_string()
        };

        Ok(GlobalOptResult {
            params: population.swap_remove(best_idx),
            cost: best_cost,
            iterations,
            func_evals: evaluator.evals,
            success,
            message,
        })
    }
}
