//! Loading batch inputs from disk.
//!
//! Tables come from comma separated text (`.csv`, `.txt`) or JSON (`.json`,
//! either an array of records or a column-oriented object). Configuration
//! and the linear model are JSON documents.

use std::fs;
use std::path::Path;

use csv::{ReaderBuilder, Trim};
use ndarray::Array2;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::OptimizationConfig;
use crate::error::{HistOptError, Result};
use crate::model::LinearModel;
use crate::table::HistoricalTable;

/// File extensions `read_table` understands.
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["csv", "txt", "json"];

/// Column dropped from loaded tables when present (a saved row index).
pub const INDEX_COLUMN: &str = "index";

/// Read a historical table, using `date_label` as the timestamp column.
pub fn read_table<P: AsRef<Path>>(path: P, date_label: &str) -> Result<HistoricalTable> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_string();

    let mut table = match extension.to_ascii_lowercase().as_str() {
        "csv" | "txt" => parse_csv(&fs::read_to_string(path)?, date_label)?,
        "json" => parse_json_table(&fs::read_to_string(path)?, date_label)?,
        _ => {
            return Err(HistOptError::UnsupportedInputFormat {
                extension,
                supported: SUPPORTED_EXTENSIONS.join(", "),
            })
        }
    };

    if table.drop_column(INDEX_COLUMN) {
        debug!("Dropped '{}' column from {}", INDEX_COLUMN, path.display());
    }

    debug!(
        rows = table.len(),
        columns = table.columns().len(),
        "Loaded {}",
        path.display()
    );
    Ok(table)
}

/// Read and validate an `OptimizationConfig` JSON file.
pub fn read_config<P: AsRef<Path>>(path: P) -> Result<OptimizationConfig> {
    OptimizationConfig::from_json(&fs::read_to_string(path)?)
}

/// Read a `LinearModel` JSON file.
pub fn read_model<P: AsRef<Path>>(path: P) -> Result<LinearModel> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Parse comma separated text with a header row.
///
/// Quoted fields may contain commas and doubled quotes. Cells are trimmed and
/// an empty numeric cell is a missing value (NaN).
pub fn parse_csv(text: &str, date_label: &str) -> Result<HistoricalTable> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if header.is_empty() {
        return Err(HistOptError::Parse("Input has no header row".to_string()));
    }

    let date_idx = header
        .iter()
        .position(|h| h == date_label)
        .ok_or_else(|| HistOptError::MissingColumn(date_label.to_string()))?;
    let columns: Vec<String> = header
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != date_idx)
        .map(|(_, h)| h.clone())
        .collect();

    let mut rows = Vec::new();
    for (line_no, record) in reader.records().enumerate() {
        let record = record?;
        if record.len() != header.len() {
            return Err(HistOptError::Parse(format!(
                "Row {} has {} fields, expected {}",
                line_no + 1,
                record.len(),
                header.len()
            )));
        }

        let mut values = Vec::with_capacity(columns.len());
        let mut timestamp = String::new();
        for (i, field) in record.iter().enumerate() {
            if i == date_idx {
                timestamp = field.to_string();
            } else {
                values.push(parse_cell(field, line_no + 1, &header[i])?);
            }
        }
        rows.push((timestamp, values));
    }

    HistoricalTable::from_rows(date_label, columns, rows)
}

/// Empty cells are missing values.
fn parse_cell(field: &str, row: usize, column: &str) -> Result<f64> {
    let field = field.trim();
    if field.is_empty() {
        return Ok(f64::NAN);
    }
    field.parse::<f64>().map_err(|_| {
        HistOptError::Parse(format!(
            "Row {}, column '{}': '{}' is not a number",
            row, column, field
        ))
    })
}

/// Parse a JSON table: `[{col: value, ...}, ...]` or `{col: [values] | {key: value}}`.
pub fn parse_json_table(text: &str, date_label: &str) -> Result<HistoricalTable> {
    match serde_json::from_str::<Value>(text)? {
        Value::Array(records) => json_records(&records, date_label),
        Value::Object(columns) => json_columns(&columns, date_label),
        _ => Err(HistOptError::Parse(
            "JSON table must be an array of records or an object of columns".to_string(),
        )),
    }
}

fn json_records(records: &[Value], date_label: &str) -> Result<HistoricalTable> {
    let Some(first) = records.first() else {
        return HistoricalTable::new(date_label, Vec::new(), Vec::new(), Array2::zeros((0, 0)));
    };
    let first = first
        .as_object()
        .ok_or_else(|| HistOptError::Parse("JSON record 0 is not an object".to_string()))?;
    let columns: Vec<String> = first.keys().filter(|k| *k != date_label).cloned().collect();

    let rows = records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let record = record
                .as_object()
                .ok_or_else(|| HistOptError::Parse(format!("JSON record {} is not an object", i)))?;
            let timestamp = record
                .get(date_label)
                .map(json_timestamp)
                .ok_or_else(|| HistOptError::MissingColumn(date_label.to_string()))?;
            let values = columns
                .iter()
                .map(|c| {
                    let value = record
                        .get(c)
                        .ok_or_else(|| HistOptError::MissingColumn(c.clone()))?;
                    json_number(value, i, c)
                })
                .collect::<Result<Vec<f64>>>()?;
            Ok((timestamp, values))
        })
        .collect::<Result<Vec<_>>>()?;

    HistoricalTable::from_rows(date_label, columns, rows)
}

fn json_columns(object: &Map<String, Value>, date_label: &str) -> Result<HistoricalTable> {
    let timestamps: Vec<String> = column_cells(
        object
            .get(date_label)
            .ok_or_else(|| HistOptError::MissingColumn(date_label.to_string()))?,
        date_label,
    )?
    .into_iter()
    .map(json_timestamp)
    .collect();

    let columns: Vec<String> = object.keys().filter(|k| *k != date_label).cloned().collect();
    let mut data = Array2::zeros((timestamps.len(), columns.len()));

    for (j, name) in columns.iter().enumerate() {
        let cells = column_cells(&object[name.as_str()], name)?;
        if cells.len() != timestamps.len() {
            return Err(HistOptError::DimensionMismatch(format!(
                "Column '{}' has {} values, expected {}",
                name,
                cells.len(),
                timestamps.len()
            )));
        }
        for (i, cell) in cells.into_iter().enumerate() {
            data[[i, j]] = json_number(cell, i, name)?;
        }
    }

    HistoricalTable::new(date_label, timestamps, columns, data)
}

/// Cells of one column, from an array or an index-keyed object.
fn column_cells<'a>(value: &'a Value, name: &str) -> Result<Vec<&'a Value>> {
    match value {
        Value::Array(cells) => Ok(cells.iter().collect()),
        Value::Object(cells) => Ok(cells.values().collect()),
        _ => Err(HistOptError::Parse(format!(
            "Column '{}' must be an array or an object",
            name
        ))),
    }
}

fn json_timestamp(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn json_number(value: &Value, row: usize, column: &str) -> Result<f64> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| {
            HistOptError::Parse(format!("Row {}, column '{}': {} out of range", row, column, n))
        }),
        Value::Null => Ok(f64::NAN),
        Value::String(s) => parse_cell(s, row, column),
        other => Err(HistOptError::Parse(format!(
            "Row {}, column '{}': {} is not a number",
            row, column, other
        ))),
    }
}
