//! Dual annealing: generalized simulated annealing with local refinement.
//!
//! Candidates are drawn from a distorted Cauchy-Lorentz visiting
//! distribution whose width shrinks with the generalized temperature
//! `T(t) = T0 * (2^(qv-1) - 1) / ((1+t)^(qv-1) - 1)`. Worse candidates are
//! accepted with the generalized Metropolis probability controlled by `qa`.
//! When the temperature falls below `T0 * restart_temp_ratio` the walker
//! restarts from a random point while keeping the best solution. After each
//! annealing chain that improves the best point, a bounded compass search
//! refines it.

use ndarray::Array1;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use statrs::function::gamma::ln_gamma;
use std::f64::consts::PI;

use crate::bounds::Bounds;
use crate::error::{HistOptError, Result};
use crate::global_opt::{
    check_dimensions, clip_to_bounds, random_point, Evaluator, GlobalOptResult, GlobalOptimizer,
};
use crate::problem::Problem;

/// Visits farther than this are resampled inside the tail.
const TAIL_LIMIT: f64 = 1.0e8;

/// Visits landing this close to a lower bound are nudged inside.
const MIN_VISIT_BOUND: f64 = 1.0e-10;

/// Random re-initializations tried when the start point has a non-finite cost.
const MAX_REINIT_COUNT: usize = 1000;

/// Chains without improvement before a local search is forced.
const NOT_IMPROVED_MAX: usize = 1000;

/// Compass-search evaluations allowed per dimension and call.
const LOCAL_EVALS_PER_DIM: usize = 100;

/// Relative step below which the compass search stops.
const LOCAL_STEP_TOL: f64 = 1.0e-8;

/// Dual annealing optimizer.
#[derive(Debug, Clone)]
pub struct DualAnnealing {
    /// Initial temperature `T0`
    pub initial_temp: f64,

    /// Restart when the temperature drops below `initial_temp * restart_temp_ratio`
    pub restart_temp_ratio: f64,

    /// Visiting distribution parameter `qv`, in (1, 3)
    pub visit: f64,

    /// Acceptance distribution parameter `qa`, in (-1e4, -5]
    pub accept: f64,

    /// Function evaluation budget; hitting it clears the success flag
    pub max_function_evals: usize,

    /// Whether to refine improved points with a compass search
    pub local_search: bool,
}

impl Default for DualAnnealing {
    fn default() -> Self {
        Self {
            initial_temp: 5230.0,
            restart_temp_ratio: 2.0e-5,
            visit: 2.62,
            accept: -5.0,
            max_function_evals: 10_000_000,
            local_search: true,
        }
    }
}

impl DualAnnealing {
    /// Create a new DualAnnealing optimizer with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the function evaluation budget.
    pub fn with_max_function_evals(mut self, max_function_evals: usize) -> Self {
        self.max_function_evals = max_function_evals;
        self
    }

    /// Enable or disable the local refinement step.
    pub fn with_local_search(mut self, local_search: bool) -> Self {
        self.local_search = local_search;
        self
    }

    fn validate(&self) -> Result<()> {
        if !(self.visit > 1.0 && self.visit < 3.0) {
            return Err(HistOptError::InvalidConfig(format!(
                "visit parameter must be in (1, 3), got {}",
                self.visit
            )));
        }
        if !(self.accept > -1.0e4 && self.accept <= -5.0) {
            return Err(HistOptError::InvalidConfig(format!(
                "accept parameter must be in (-1e4, -5], got {}",
                self.accept
            )));
        }
        if !(self.initial_temp > 0.01 && self.initial_temp <= 5.0e4) {
            return Err(HistOptError::InvalidConfig(format!(
                "initial temperature must be in (0.01, 5e4], got {}",
                self.initial_temp
            )));
        }
        if !(self.restart_temp_ratio > 0.0 && self.restart_temp_ratio < 1.0) {
            return Err(HistOptError::InvalidConfig(format!(
                "restart temperature ratio must be in (0, 1), got {}",
                self.restart_temp_ratio
            )));
        }
        Ok(())
    }

    /// Bounded compass search from `start`.
    ///
    /// Each coordinate is stepped up and down by a fraction of its range,
    /// clipped to the bounds; steps halve whenever a full sweep fails.
    fn compass_search<P: Problem>(
        &self,
        evaluator: &mut Evaluator<'_, P>,
        bounds: &[Bounds],
        start: &Array1<f64>,
        start_energy: f64,
    ) -> Result<(Array1<f64>, f64)> {
        let mut x = start.clone();
        let mut energy = start_energy;
        let mut steps: Vec<f64> = bounds.iter().map(|b| 0.1 * b.range()).collect();
        let min_steps: Vec<f64> = bounds
            .iter()
            .map(|b| LOCAL_STEP_TOL * b.range().max(1.0))
            .collect();
        let budget = evaluator.evals + LOCAL_EVALS_PER_DIM * bounds.len();

        while evaluator.evals < budget
            && !evaluator.exhausted()
            && steps.iter().zip(&min_steps).any(|(s, m)| s > m)
        {
            let mut improved = false;

            'sweep: for i in 0..x.len() {
                for direction in [-1.0, 1.0] {
                    if steps[i] <= min_steps[i] {
                        continue;
                    }

                    let mut candidate = x.clone();
                    candidate[i] = bounds[i].clamp(x[i] + direction * steps[i]);
                    if candidate[i] == x[i] {
                        continue;
                    }

                    let candidate_energy = evaluator.eval(&candidate)?;
                    if candidate_energy < energy {
                        x = candidate;
                        energy = candidate_energy;
                        improved = true;
                        break 'sweep;
                    }
                    if evaluator.evals >= budget || evaluator.exhausted() {
                        break 'sweep;
                    }
                }
            }

            if !improved {
                steps.iter_mut().for_each(|s| *s *= 0.5);
            }
        }

        Ok((x, energy))
    }
}

/// Distorted Cauchy-Lorentz visiting distribution.
#[derive(Debug, Clone)]
struct VisitingDistribution {
    visit: f64,
    factor4_p: f64,
    factor6: f64,
}

impl VisitingDistribution {
    fn new(visit: f64) -> Self {
        let factor2 = ((4.0 - visit) * (visit - 1.0).ln()).exp();
        let factor3 = ((2.0 - visit) * 2f64.ln() / (visit - 1.0)).exp();
        let factor4_p = PI.sqrt() * factor2 / (factor3 * (3.0 - visit));
        let factor5 = 1.0 / (visit - 1.0) - 0.5;
        let d1 = 2.0 - factor5;
        let factor6 = PI * (1.0 - factor5) / (PI * (1.0 - factor5)).sin() / ln_gamma(d1).exp();

        Self {
            visit,
            factor4_p,
            factor6,
        }
    }

    /// Draw one step length at the given temperature.
    fn sample(&self, temperature: f64, rng: &mut impl Rng) -> f64 {
        let x: f64 = rng.sample(StandardNormal);
        let y: f64 = rng.sample(StandardNormal);

        let factor1 = (temperature.ln() / (self.visit - 1.0)).exp();
        let factor4 = self.factor4_p * factor1;
        let x = x
            * (-(self.visit - 1.0) * (self.factor6 / factor4).ln() / (3.0 - self.visit)).exp();
        let den = ((self.visit - 1.0) * y.abs().ln() / (3.0 - self.visit)).exp();
        let step = x / den;

        if step.is_nan() {
            0.0
        } else if step > TAIL_LIMIT {
            TAIL_LIMIT * rng.gen::<f64>()
        } else if step < -TAIL_LIMIT {
            -TAIL_LIMIT * rng.gen::<f64>()
        } else {
            step
        }
    }

    /// Produce the `step`-th visit of a chain.
    ///
    /// The first `dim` visits move every coordinate; the next `dim` move one
    /// coordinate each. Coordinates leaving their interval wrap around.
    fn visit_from(
        &self,
        current: &Array1<f64>,
        step: usize,
        temperature: f64,
        bounds: &[Bounds],
        rng: &mut impl Rng,
    ) -> Array1<f64> {
        let dim = current.len();
        let mut next = current.clone();

        if step < dim {
            for (i, value) in next.iter_mut().enumerate() {
                *value = wrap_into(*value + self.sample(temperature, rng), &bounds[i]);
            }
        } else {
            let i = step - dim;
            next[i] = wrap_into(current[i] + self.sample(temperature, rng), &bounds[i]);
        }

        next
    }
}

/// Fold a value back into `[low, high)` periodically.
fn wrap_into(value: f64, bounds: &Bounds) -> f64 {
    let range = bounds.range();
    if range <= 0.0 || !value.is_finite() {
        return bounds.low;
    }

    let offset = value - bounds.low;
    let mut wrapped = (offset % range + range) % range + bounds.low;
    if (wrapped - bounds.low).abs() < MIN_VISIT_BOUND {
        wrapped += MIN_VISIT_BOUND;
    }
    bounds.clamp(wrapped)
}

/// Walker position plus the best point seen so far.
struct EnergyState {
    current: Array1<f64>,
    current_energy: f64,
    best: Array1<f64>,
    best_energy: f64,
}

impl EnergyState {
    /// Start (or restart) the walker at `start`, or at a random point.
    ///
    /// Non-finite starting energies trigger random re-draws. The best point
    /// is only initialized on the first call.
    fn reset<P: Problem>(
        state: Option<Self>,
        start: Option<&Array1<f64>>,
        evaluator: &mut Evaluator<'_, P>,
        bounds: &[Bounds],
        rng: &mut impl Rng,
    ) -> Result<Self> {
        let mut current = match start {
            Some(x) => x.clone(),
            None => random_point(bounds, rng),
        };

        let mut reinit = 0;
        let current_energy = loop {
            let energy = evaluator.eval(&current)?;
            if energy.is_finite() {
                break energy;
            }
            if reinit >= MAX_REINIT_COUNT {
                return Err(HistOptError::OptimizationFailure(
                    "Objective returns non-finite values even at new random points".to_string(),
                ));
            }
            current = random_point(bounds, rng);
            reinit += 1;
        };

        Ok(match state {
            Some(previous) => Self {
                current,
                current_energy,
                best: previous.best,
                best_energy: previous.best_energy,
            },
            None => Self {
                best: current.clone(),
                best_energy: current_energy,
                current,
                current_energy,
            },
        })
    }

    fn update_current(&mut self, energy: f64, x: Array1<f64>) {
        self.current = x;
        self.current_energy = energy;
    }

    /// Record a new best; returns true if it improved.
    fn update_best(&mut self, energy: f64, x: &Array1<f64>) -> bool {
        if energy < self.best_energy {
            self.best = x.clone();
            self.best_energy = energy;
            true
        } else {
            false
        }
    }
}

impl GlobalOptimizer for DualAnnealing {
    fn minimize<P: Problem>(
        &self,
        problem: &P,
        bounds: &[Bounds],
        x0: &Array1<f64>,
        max_iterations: usize,
        seed: u64,
    ) -> Result<GlobalOptResult> {
        check_dimensions(problem, bounds, x0)?;
        self.validate()?;

        let mut rng = StdRng::seed_from_u64(seed);
        let mut evaluator = Evaluator::new(problem, self.max_function_evals);
        let visiting = VisitingDistribution::new(self.visit);
        let dim = bounds.len();

        let start = clip_to_bounds(x0, bounds);
        let mut state = EnergyState::reset(None, Some(&start), &mut evaluator, bounds, &mut rng)?;

        let temperature_restart = self.initial_temp * self.restart_temp_ratio;
        let t1 = ((self.visit - 1.0) * 2f64.ln()).exp() - 1.0;
        let acceptance_exponent = 1.0 / (1.0 - self.accept);

        let mut iterations = 0;
        let mut not_improved = 0;
        let mut exhausted = false;

        'annealing: while iterations < max_iterations {
            for step in 0..max_iterations {
                if iterations >= max_iterations {
                    break 'annealing;
                }

                let s = step as f64 + 2.0;
                let t2 = ((self.visit - 1.0) * s.ln()).exp() - 1.0;
                let temperature = self.initial_temp * t1 / t2;

                if temperature < temperature_restart {
                    state = EnergyState::reset(Some(state), None, &mut evaluator, bounds, &mut rng)?;
                    break;
                }

                // Markov chain of 2 * dim visits at this temperature
                let temperature_step = temperature / (step as f64 + 1.0);
                let mut improved = step == 0;
                not_improved += 1;

                for j in 0..2 * dim {
                    let candidate = visiting.visit_from(&state.current, j, temperature, bounds, &mut rng);
                    let energy = evaluator.eval(&candidate)?;

                    if energy < state.current_energy {
                        if state.update_best(energy, &candidate) {
                            improved = true;
                            not_improved = 0;
                        }
                        state.update_current(energy, candidate);
                    } else {
                        let pqv_temp = 1.0
                            - (1.0 - self.accept) * (energy - state.current_energy)
                                / temperature_step;
                        let pqv = if pqv_temp <= 0.0 {
                            0.0
                        } else {
                            (pqv_temp.ln() * acceptance_exponent).exp()
                        };
                        if rng.gen::<f64>() <= pqv {
                            state.update_current(energy, candidate);
                        }
                    }

                    if evaluator.exhausted() {
                        exhausted = true;
                        break 'annealing;
                    }
                }

                if self.local_search && (improved || not_improved >= NOT_IMPROVED_MAX) {
                    let (from, from_energy) = if improved {
                        (state.best.clone(), state.best_energy)
                    } else {
                        (state.current.clone(), state.current_energy)
                    };
                    let (x, energy) =
                        self.compass_search(&mut evaluator, bounds, &from, from_energy)?;
                    not_improved = 0;
                    if state.update_best(energy, &x) {
                        state.update_current(energy, x);
                    }
                    if evaluator.exhausted() {
                        exhausted = true;
                        break 'annealing;
                    }
                }

                iterations += 1;
            }
        }

        let success = !exhausted && state.best_energy.is_finite();
        let message = if exhausted {
            "Maximum number of function call reached during annealing".to_string()
        } else {
            "Maximum number of iteration reached".to_string()
        };

        Ok(GlobalOptResult {
            params: clip_to_bounds(&state.best, bounds),
            cost: state.best_energy,
            iterations,
            func_evals: evaluator.evals,
            success,
            message,
        })
    }
}
