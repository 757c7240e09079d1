//! Time-indexed historical table.
//!
//! A `HistoricalTable` is the tabular input to a batch: one timestamp per row,
//! named numeric columns, and rows kept in the order they were loaded. Row
//! order is the submission order for the whole pipeline; nothing in this
//! module sorts by timestamp.

use ndarray::{Array1, Array2, ArrayView1, Axis};

use crate::error::{HistOptError, Result};

/// Historical process data keyed by a timestamp column.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalTable {
    timestamp_label: String,
    timestamps: Vec<String>,
    columns: Vec<String>,
    data: Array2<f64>,
}

impl HistoricalTable {
    /// Create a table from its parts.
    ///
    /// # Arguments
    ///
    /// * `timestamp_label` - Name of the timestamp column (e.g. `Date`)
    /// * `timestamps` - One timestamp per row, carried through verbatim
    /// * `columns` - Names of the numeric columns
    /// * `data` - Row-major values, shape `(timestamps.len(), columns.len())`
    pub fn new(
        timestamp_label: impl Into<String>,
        timestamps: Vec<String>,
        columns: Vec<String>,
        data: Array2<f64>,
    ) -> Result<Self> {
        if data.nrows() != timestamps.len() {
            return Err(HistOptError::DimensionMismatch(format!(
                "Expected {} rows of data for {} timestamps, got {}",
                timestamps.len(),
                timestamps.len(),
                data.nrows()
            )));
        }
        if data.ncols() != columns.len() {
            return Err(HistOptError::DimensionMismatch(format!(
                "Expected {} data columns, got {}",
                columns.len(),
                data.ncols()
            )));
        }

        Ok(Self {
            timestamp_label: timestamp_label.into(),
            timestamps,
            columns,
            data,
        })
    }

    /// Build a table from row vectors.
    pub fn from_rows(
        timestamp_label: impl Into<String>,
        columns: Vec<String>,
        rows: Vec<(String, Vec<f64>)>,
    ) -> Result<Self> {
        let width = columns.len();
        let mut timestamps = Vec::with_capacity(rows.len());
        let mut values = Vec::with_capacity(rows.len() * width);

        for (i, (timestamp, row)) in rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(HistOptError::DimensionMismatch(format!(
                    "Row {} has {} values, expected {}",
                    i,
                    row.len(),
                    width
                )));
            }
            timestamps.push(timestamp);
            values.extend(row);
        }

        let data = Array2::from_shape_vec((timestamps.len(), width), values)
            .map_err(|e| HistOptError::DimensionMismatch(e.to_string()))?;

        Self::new(timestamp_label, timestamps, columns, data)
    }

    /// Name of the timestamp column.
    pub fn timestamp_label(&self) -> &str {
        &self.timestamp_label
    }

    pub fn timestamps(&self) -> &[String] {
        &self.timestamps
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Position of a named column, or `MissingColumn`.
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| HistOptError::MissingColumn(name.to_string()))
    }

    /// View of a single named column.
    pub fn column(&self, name: &str) -> Result<ArrayView1<'_, f64>> {
        let idx = self.column_index(name)?;
        Ok(self.data.column(idx))
    }

    /// Copy the named columns, in the order given, into a new matrix.
    ///
    /// Fails with `MissingColumn` on the first name that is not present.
    pub fn select(&self, names: &[String]) -> Result<Array2<f64>> {
        let indices = names
            .iter()
            .map(|name| self.column_index(name))
            .collect::<Result<Vec<_>>>()?;

        Ok(take(&self.data, Axis(1), &indices))
    }

    /// Keep only the rows for which `keep` returns true, preserving order.
    pub fn filter_rows<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(usize, ArrayView1<'_, f64>) -> bool,
    {
        let kept: Vec<usize> = self
            .data
            .outer_iter()
            .enumerate()
            .filter(|(i, row)| keep(*i, row.view()))
            .map(|(i, _)| i)
            .collect();

        Self {
            timestamp_label: self.timestamp_label.clone(),
            timestamps: kept.iter().map(|&i| self.timestamps[i].clone()).collect(),
            columns: self.columns.clone(),
            data: take(&self.data, Axis(0), &kept),
        }
    }

    /// Drop rows whose `column` value is below `min`.
    pub fn retain_at_least(&self, column: &str, min: f64) -> Result<Self> {
        let idx = self.column_index(column)?;
        Ok(self.filter_rows(|_, row| row[idx] >= min))
    }

    /// Remove a column if present; returns whether one was removed.
    pub fn drop_column(&mut self, name: &str) -> bool {
        let Some(idx) = self.columns.iter().position(|c| c == name) else {
            return false;
        };

        let keep: Vec<usize> = (0..self.columns.len()).filter(|&i| i != idx).collect();
        self.data = take(&self.data, Axis(1), &keep);
        self.columns.remove(idx);
        true
    }

    /// Owned copy of a named column.
    pub fn column_owned(&self, name: &str) -> Result<Array1<f64>> {
        Ok(self.column(name)?.to_owned())
    }
}

/// `Array2::select` that also handles an empty index list.
fn take(data: &Array2<f64>, axis: Axis, indices: &[usize]) -> Array2<f64> {
    if indices.is_empty() {
        let mut shape = data.raw_dim();
        shape[axis.index()] = 0;
        return Array2::zeros(shape);
    }
    data.select(axis, indices)
}
