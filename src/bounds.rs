//! Per-row feasible intervals for the control variables.
//!
//! Bounds are derived from each row's baseline values and a configured
//! `(max_decrease, max_increase)` offset per control variable:
//! `low = baseline + max_decrease`, `high = baseline + max_increase`.
//! Variables flagged non-negative have their lower bound clamped at zero
//! before the `low <= high` check, since flows cannot go below zero.

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{HistOptError, Result};
use crate::table::HistoricalTable;

/// Feasible interval for one control variable at one row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Lower end of the interval
    pub low: f64,

    /// Upper end of the interval
    pub high: f64,
}

impl Bounds {
    /// Create new bounds, rejecting `low > high` and non-finite ends.
    ///
    /// # Examples
    ///
    /// ```
    /// use histopt_rs::bounds::Bounds;
    ///
    /// let bounds = Bounds::new(8.0, 12.0).unwrap();
    /// assert_eq!(bounds.range(), 4.0);
    /// assert!(Bounds::new(2.0, 1.0).is_err());
    /// ```
    pub fn new(low: f64, high: f64) -> Result<Self> {
        if !low.is_finite() || !high.is_finite() || low > high {
            return Err(HistOptError::InvalidBounds {
                row: 0,
                variable: String::new(),
                low,
                high,
            });
        }

        Ok(Self { low, high })
    }

    /// Width of the interval.
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Check if a value is within the bounds
    pub fn contains(&self, value: f64) -> bool {
        value >= self.low && value <= self.high
    }

    /// Clamp a value to be within the bounds
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.low, self.high)
    }
}

impl From<(f64, f64)> for Bounds {
    fn from((low, high): (f64, f64)) -> Self {
        Self { low, high }
    }
}

/// Allowed signed offset range for one control variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlDelta {
    /// Column name of the control variable
    pub name: String,

    /// Signed offset added to the baseline for the lower bound (typically <= 0)
    pub max_decrease: f64,

    /// Signed offset added to the baseline for the upper bound
    pub max_increase: f64,
}

impl ControlDelta {
    /// Delta for `name` with signed lower and upper offsets.
    pub fn new(name: impl Into<String>, max_decrease: f64, max_increase: f64) -> Self {
        Self {
            name: name.into(),
            max_decrease,
            max_increase,
        }
    }
}

/// Derives per-row bounds from baseline values and configured deltas.
#[derive(Debug, Clone, Default)]
pub struct BoundsCalculator {
    deltas: Vec<ControlDelta>,
    non_negative: HashSet<String>,
}

impl BoundsCalculator {
    /// Create a calculator over the given control variables, in order.
    pub fn new(deltas: Vec<ControlDelta>) -> Self {
        Self {
            deltas,
            non_negative: HashSet::new(),
        }
    }

    /// Flag variables whose lower bound may not go below zero.
    pub fn with_non_negative<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.non_negative.extend(names.into_iter().map(Into::into));
        self
    }

    /// Control variable names in their fixed order.
    pub fn variable_names(&self) -> Vec<String> {
        self.deltas.iter().map(|d| d.name.clone()).collect()
    }

    pub fn is_non_negative(&self, name: &str) -> bool {
        self.non_negative.contains(name)
    }

    /// Compute the bounds for one row of baseline values.
    ///
    /// `baseline` must hold one value per control variable, in the
    /// calculator's order. `row` is only used for error reporting.
    pub fn row_bounds(&self, row: usize, baseline: ArrayView1<'_, f64>) -> Result<Vec<Bounds>> {
        if baseline.len() != self.deltas.len() {
            return Err(HistOptError::DimensionMismatch(format!(
                "Expected {} baseline values at row {}, got {}",
                self.deltas.len(),
                row,
                baseline.len()
            )));
        }

        self.deltas
            .iter()
            .zip(baseline.iter())
            .map(|(delta, &base)| {
                let mut low = base + delta.max_decrease;
                let high = base + delta.max_increase;

                if self.non_negative.contains(&delta.name) && low < 0.0 {
                    low = 0.0;
                }

                if !low.is_finite() || !high.is_finite() || low > high {
                    return Err(HistOptError::InvalidBounds {
                        row,
                        variable: delta.name.clone(),
                        low,
                        high,
                    });
                }

                Ok(Bounds { low, high })
            })
            .collect()
    }

    /// Compute bounds for every row of `table`.
    ///
    /// Fails on the first row with an empty or non-finite interval, before
    /// any optimization work is scheduled.
    pub fn compute(&self, table: &HistoricalTable) -> Result<Vec<Vec<Bounds>>> {
        let baselines = table.select(&self.variable_names())?;

        baselines
            .outer_iter()
            .enumerate()
            .map(|(row, baseline)| self.row_bounds(row, baseline))
            .collect()
    }
}
