//! Batch configuration.
//!
//! Read from a JSON document such as:
//!
//! ```json
//! {
//!     "controllable": {"OIL": [-5, 5], "GAS": [-2, 2]},
//!     "noncontrollable": ["COMBUSTION_AIR"],
//!     "non_negative": ["OIL"],
//!     "outlet_column": "OUTLET",
//!     "outlet_min": 280,
//!     "c": 0.01,
//!     "max_iterations": 75
//! }
//! ```
//!
//! The key order of `controllable` fixes the control-variable order for the
//! whole batch.

use std::collections::HashSet;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::bounds::{BoundsCalculator, ControlDelta};
use crate::error::{HistOptError, Result};
use crate::global_opt::Strategy;

pub const DEFAULT_OUTLET_COLUMN: &str = "OUTLET";
pub const DEFAULT_C: f64 = 0.01;
pub const DEFAULT_MAX_ITERATIONS: usize = 75;

fn default_outlet_column() -> String {
    DEFAULT_OUTLET_COLUMN.to_string()
}

fn default_c() -> f64 {
    DEFAULT_C
}

fn default_max_iterations() -> usize {
    DEFAULT_MAX_ITERATIONS
}

/// Everything a batch needs besides the table and the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationConfig {
    /// Control variables with their `[max_decrease, max_increase]` deltas
    #[serde(
        serialize_with = "serialize_controllable",
        deserialize_with = "deserialize_controllable"
    )]
    pub controllable: Vec<ControlDelta>,

    /// Variables fed to the model but held fixed
    #[serde(default)]
    pub noncontrollable: Vec<String>,

    /// Control variables whose lower bound is clamped at zero
    #[serde(default)]
    pub non_negative: Vec<String>,

    /// Column holding the outlet target
    #[serde(default = "default_outlet_column")]
    pub outlet_column: String,

    /// Rows with an outlet value below this are dropped
    #[serde(default)]
    pub outlet_min: Option<f64>,

    /// Weight of the outlet deviation penalty
    #[serde(default = "default_c")]
    pub c: f64,

    /// Iteration cap per task
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Worker count; all available cores when absent
    #[serde(default)]
    pub worker_count: Option<usize>,

    /// Base seed for the per-task random streams
    #[serde(default)]
    pub seed: Option<u64>,

    #[serde(default)]
    pub strategy: Strategy,
}

impl OptimizationConfig {
    /// Configuration with defaults for everything but the variables.
    pub fn new(controllable: Vec<ControlDelta>, noncontrollable: Vec<String>) -> Self {
        Self {
            controllable,
            noncontrollable,
            non_negative: Vec::new(),
            outlet_column: default_outlet_column(),
            outlet_min: None,
            c: DEFAULT_C,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            worker_count: None,
            seed: None,
            strategy: Strategy::default(),
        }
    }

    /// Parse and validate a JSON configuration document.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Control variable names in their fixed order.
    pub fn control_variables(&self) -> Vec<String> {
        self.controllable.iter().map(|d| d.name.clone()).collect()
    }

    pub fn bounds_calculator(&self) -> BoundsCalculator {
        BoundsCalculator::new(self.controllable.clone())
            .with_non_negative(self.non_negative.iter().cloned())
    }

    /// Reject configurations that cannot produce a meaningful batch.
    pub fn validate(&self) -> Result<()> {
        if self.controllable.is_empty() {
            return Err(HistOptError::InvalidConfig(
                "At least one controllable variable is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for delta in &self.controllable {
            if !seen.insert(delta.name.as_str()) {
                return Err(HistOptError::InvalidConfig(format!(
                    "Controllable variable '{}' listed twice",
                    delta.name
                )));
            }
            if !delta.max_decrease.is_finite() || !delta.max_increase.is_finite() {
                return Err(HistOptError::InvalidConfig(format!(
                    "Deltas for '{}' must be finite",
                    delta.name
                )));
            }
            if delta.max_decrease > delta.max_increase {
                return Err(HistOptError::InvalidConfig(format!(
                    "max_decrease {} exceeds max_increase {} for '{}'",
                    delta.max_decrease, delta.max_increase, delta.name
                )));
            }
        }

        for name in &self.noncontrollable {
            if seen.contains(name.as_str()) {
                return Err(HistOptError::InvalidConfig(format!(
                    "'{}' is both controllable and noncontrollable",
                    name
                )));
            }
        }

        if let Some(name) = self.non_negative.iter().find(|n| !seen.contains(n.as_str())) {
            return Err(HistOptError::InvalidConfig(format!(
                "Non-negative variable '{}' is not controllable",
                name
            )));
        }

        if self.max_iterations == 0 {
            return Err(HistOptError::InvalidConfig(
                "max_iterations must be positive".to_string(),
            ));
        }
        if !self.c.is_finite() {
            return Err(HistOptError::InvalidConfig(format!(
                "c must be finite, got {}",
                self.c
            )));
        }
        if matches!(self.outlet_min, Some(min) if min.is_nan()) {
            return Err(HistOptError::InvalidConfig(
                "outlet_min must be a number".to_string(),
            ));
        }

        Ok(())
    }
}

fn serialize_controllable<S>(deltas: &[ControlDelta], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(deltas.len()))?;
    for delta in deltas {
        map.serialize_entry(&delta.name, &[delta.max_decrease, delta.max_increase])?;
    }
    map.end()
}

fn deserialize_controllable<'de, D>(deserializer: D) -> std::result::Result<Vec<ControlDelta>, D::Error>
where
    D: Deserializer<'de>,
{
    struct ControllableVisitor;

    impl<'de> Visitor<'de> for ControllableVisitor {
        type Value = Vec<ControlDelta>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of variable name to [max_decrease, max_increase]")
        }

        fn visit_map<A>(self, mut access: A) -> std::result::Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut deltas = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((name, [max_decrease, max_increase])) =
                access.next_entry::<String, [f64; 2]>()?
            {
                deltas.push(ControlDelta::new(name, max_decrease, max_increase));
            }
            Ok(deltas)
        }
    }

    deserializer.deserialize_map(ControllableVisitor)
}
