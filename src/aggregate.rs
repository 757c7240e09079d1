//! Reassembly of task results into the output table.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use csv::Writer;
use ndarray::{Array2, ArrayView1};

use crate::error::{HistOptError, Result};
use crate::task::TaskResult;

/// Suffix appended to each control variable's output column.
pub const OPTIMIZED_SUFFIX: &str = "_Optimized";

/// Name of the convergence column.
pub const SUCCESS_COLUMN: &str = "Success";

/// Objective at the clipped historical controls, written on request.
pub const BASELINE_OBJECTIVE_COLUMN: &str = "Baseline_Objective";
/// Objective at the optimized controls, written on request.
pub const OPTIMIZED_OBJECTIVE_COLUMN: &str = "Optimized_Objective";

/// Time-indexed optimization results, one row per task in submission order.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable {
    timestamp_label: String,
    timestamps: Vec<String>,
    columns: Vec<String>,
    values: Array2<f64>,
    success: Vec<bool>,
    baseline_objective: Vec<Option<f64>>,
    optimized_objective: Vec<Option<f64>>,
    include_objectives: bool,
}

impl ResultTable {
    /// Empty result table with the given output columns.
    pub fn empty(timestamp_label: impl Into<String>, control_variables: &[String]) -> Self {
        Self {
            timestamp_label: timestamp_label.into(),
            timestamps: Vec::new(),
            columns: optimized_columns(control_variables),
            values: Array2::zeros((0, control_variables.len())),
            success: Vec::new(),
            baseline_objective: Vec::new(),
            optimized_objective: Vec::new(),
            include_objectives: false,
        }
    }

    /// Also emit the baseline and optimized objective columns when writing.
    pub fn with_objectives(mut self, include: bool) -> Self {
        self.include_objectives = include;
        self
    }

    pub fn timestamp_label(&self) -> &str {
        &self.timestamp_label
    }

    pub fn timestamps(&self) -> &[String] {
        &self.timestamps
    }

    /// `{variable}_Optimized` column names, in control-variable order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn success(&self) -> &[bool] {
        &self.success
    }

    pub fn baseline_objective(&self) -> &[Option<f64>] {
        &self.baseline_objective
    }

    pub fn optimized_objective(&self) -> &[Option<f64>] {
        &self.optimized_objective
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Number of rows flagged as not converged.
    pub fn failed_count(&self) -> usize {
        self.success.iter().filter(|s| !**s).count()
    }

    /// Optimized values for one output column, e.g. `OIL_Optimized`.
    pub fn column(&self, name: &str) -> Result<ArrayView1<'_, f64>> {
        let idx = self
            .columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| HistOptError::MissingColumn(name.to_string()))?;
        Ok(self.values.column(idx))
    }

    /// Write the table as comma separated text with a header row.
    ///
    /// Fields holding a comma, quote or line break are quoted.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = Writer::from_writer(writer);

        let mut header = Vec::with_capacity(self.columns.len() + 4);
        header.push(self.timestamp_label.clone());
        header.extend(self.columns.iter().cloned());
        header.push(SUCCESS_COLUMN.to_string());
        if self.include_objectives {
            header.push(BASELINE_OBJECTIVE_COLUMN.to_string());
            header.push(OPTIMIZED_OBJECTIVE_COLUMN.to_string());
        }
        writer.write_record(&header)?;

        for (i, timestamp) in self.timestamps.iter().enumerate() {
            let mut fields = Vec::with_capacity(header.len());
            fields.push(timestamp.clone());
            fields.extend(self.values.row(i).iter().map(|v| v.to_string()));
            fields.push(if self.success[i] { "True" } else { "False" }.to_string());
            if self.include_objectives {
                fields.push(optional_field(self.baseline_objective[i]));
                fields.push(optional_field(self.optimized_objective[i]));
            }
            writer.write_record(&fields)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Write the table to `path`, replacing any existing file.
    pub fn save_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())?;
        self.write_csv(file)
    }
}

fn optional_field(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn optimized_columns(control_variables: &[String]) -> Vec<String> {
    control_variables
        .iter()
        .map(|name| format!("{}{}", name, OPTIMIZED_SUFFIX))
        .collect()
}

/// Builds a `ResultTable` from position-aligned task results.
#[derive(Debug, Clone)]
pub struct ResultAggregator {
    timestamp_label: String,
    control_variables: Vec<String>,
}

impl ResultAggregator {
    /// Aggregator writing `{variable}_Optimized` columns under `timestamp_label`.
    pub fn new(timestamp_label: impl Into<String>, control_variables: Vec<String>) -> Self {
        Self {
            timestamp_label: timestamp_label.into(),
            control_variables,
        }
    }

    /// Assemble results into a table, one row per result in the given order.
    ///
    /// Results must be position-aligned: the i-th result carries position i.
    /// A misaligned or wrongly sized result is a `DimensionMismatch`.
    pub fn aggregate(&self, results: Vec<TaskResult>) -> Result<ResultTable> {
        let mut table = ResultTable::empty(self.timestamp_label.clone(), &self.control_variables);
        if results.is_empty() {
            return Ok(table);
        }

        let n_vars = self.control_variables.len();
        let mut values = Array2::zeros((results.len(), n_vars));

        for (i, result) in results.into_iter().enumerate() {
            if result.position != i {
                return Err(HistOptError::DimensionMismatch(format!(
                    "Result at index {} carries position {}",
                    i, result.position
                )));
            }
            if result.controls.len() != n_vars {
                return Err(HistOptError::DimensionMismatch(format!(
                    "Expected {} optimized values at position {}, got {}",
                    n_vars,
                    i,
                    result.controls.len()
                )));
            }

            values.row_mut(i).assign(&result.controls);
            table.timestamps.push(result.timestamp);
            table.success.push(result.converged);
            table.baseline_objective.push(result.initial_objective);
            table.optimized_objective.push(result.optimized_objective);
        }

        table.values = values;
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn result(position: usize, timestamp: &str, controls: [f64; 2], converged: bool) -> TaskResult {
        TaskResult {
            position,
            timestamp: timestamp.to_string(),
            controls: array![controls[0], controls[1]],
            converged,
            initial_objective: Some(15.0),
            optimized_objective: if converged { Some(11.04) } else { None },
            message: String::new(),
        }
    }

    fn aggregator() -> ResultAggregator {
        ResultAggregator::new("Date", vec!["OIL".to_string(), "GAS".to_string()])
    }

    #[test]
    fn test_rows_keep_submission_order() {
        let table = aggregator()
            .aggregate(vec![
                result(0, "2021-01-02", [8.0, 3.0], true),
                result(1, "2021-01-01", [9.0, 4.0], false),
                result(2, "2021-01-01", [7.0, 2.0], true),
            ])
            .unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.timestamps(), &["2021-01-02", "2021-01-01", "2021-01-01"]);
        assert_eq!(table.columns(), &["OIL_Optimized", "GAS_Optimized"]);
        assert_eq!(table.column("GAS_Optimized").unwrap().to_vec(), vec![3.0, 4.0, 2.0]);
        assert_eq!(table.success(), &[true, false, true]);
        assert_eq!(table.failed_count(), 1);
    }

    #[test]
    fn test_misaligned_position_rejected() {
        let err = aggregator()
            .aggregate(vec![result(1, "a", [0.0, 0.0], true)])
            .unwrap_err();
        assert!(matches!(err, HistOptError::DimensionMismatch(_)));
    }

    #[test]
    fn test_empty_results() {
        let table = aggregator().aggregate(Vec::new()).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.values().dim(), (0, 2));
    }

    #[test]
    fn test_write_csv() {
        let table = aggregator()
            .aggregate(vec![
                result(0, "2021-01-01 00:00", [8.0, 3.5], true),
                result(1, "2021-01-01 01:00", [9.0, 4.0], false),
            ])
            .unwrap();

        let mut buf = Vec::new();
        table.write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert_eq!(
            text,
            "Date,OIL_Optimized,GAS_Optimized,Success\n\
             2021-01-01 00:00,8,3.5,True\n\
             2021-01-01 01:00,9,4,False\n"
        );
    }

    #[test]
    fn test_write_csv_with_objectives() {
        let table = aggregator()
            .aggregate(vec![
                result(0, "t0", [8.0, 3.0], true),
                result(1, "t1", [9.0, 4.0], false),
            ])
            .unwrap()
            .with_objectives(true);

        let mut buf = Vec::new();
        table.write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "Date,OIL_Optimized,GAS_Optimized,Success,Baseline_Objective,Optimized_Objective"
        );
        assert_eq!(lines[1], "t0,8,3,True,15,11.04");
        assert_eq!(lines[2], "t1,9,4,False,15,");
    }

    #[test]
    fn test_write_csv_quotes_timestamps() {
        let table = aggregator()
            .aggregate(vec![
                result(0, "Jan 1, 2021", [8.0, 3.0], true),
                result(1, "shift \"B\"", [9.0, 4.0], true),
            ])
            .unwrap();

        let mut buf = Vec::new();
        table.write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert_eq!(
            text,
            "Date,OIL_Optimized,GAS_Optimized,Success\n\
             \"Jan 1, 2021\",8,3,True\n\
             \"shift \"\"B\"\"\",9,4,True\n"
        );

        let mut reader = csv::Reader::from_reader(text.as_bytes());
        assert_eq!(reader.headers().unwrap().len(), 4);
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.len() == 4));
        assert_eq!(&rows[0][0], "Jan 1, 2021");
        assert_eq!(&rows[1][0], "shift \"B\"");
        assert_eq!(&rows[1][3], "True");
    }
}
