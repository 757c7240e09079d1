//! Loading inputs from disk and writing results.

use std::fs;

use histopt_rs::error::{HistOptError, Result};
use histopt_rs::{io, HistoricalOptimizer, Model, Strategy};
use ndarray::array;
use tempfile::tempdir;

const CONFIG: &str = r#"{
    "controllable": {"OIL": [-2, 2], "GAS": [-2, 2]},
    "noncontrollable": ["COMBUSTION_AIR"],
    "non_negative": ["OIL"],
    "outlet_min": 15,
    "max_iterations": 10,
    "worker_count": 2,
    "seed": 5,
    "strategy": "simulated-annealing"
}"#;

const HISTORY: &str = "index,Date,OIL,GAS,COMBUSTION_AIR,OUTLET\n\
                       0,2022-03-01 00:00:00,10,5,2,17\n\
                       1,2022-03-01 01:00:00,1,5,2,12\n\
                       2,2022-03-01 02:00:00,11,4,3,18\n";

#[test]
fn test_unsupported_extension() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("history.xlsx");
    fs::write(&path, "not a spreadsheet").unwrap();

    let err = io::read_table(&path, "Date").unwrap_err();
    assert!(matches!(err, HistOptError::UnsupportedInputFormat { .. }));
    assert_eq!(
        err.to_string(),
        "xlsx is not supported. Supported file types are: csv, txt, json"
    );
}

#[test]
fn test_read_csv_drops_index_column() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("history.csv");
    fs::write(&path, HISTORY)?;

    let table = io::read_table(&path, "Date")?;

    assert_eq!(table.len(), 3);
    assert_eq!(table.columns(), &["OIL", "GAS", "COMBUSTION_AIR", "OUTLET"]);
    assert_eq!(table.timestamp_label(), "Date");
    Ok(())
}

#[test]
fn test_read_txt_as_csv() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("history.txt");
    fs::write(&path, HISTORY)?;

    assert_eq!(io::read_table(&path, "Date")?.len(), 3);
    Ok(())
}

#[test]
fn test_read_json_records() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("history.json");
    fs::write(
        &path,
        r#"[{"Date": "t0", "OIL": 10, "GAS": 5}, {"Date": "t1", "OIL": 9, "GAS": 4}]"#,
    )?;

    let table = io::read_table(&path, "Date")?;
    assert_eq!(table.timestamps(), &["t0", "t1"]);
    assert_eq!(table.column("OIL")?.to_vec(), vec![10.0, 9.0]);
    Ok(())
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempdir().unwrap();
    let err = io::read_table(dir.path().join("absent.csv"), "Date").unwrap_err();
    assert!(matches!(err, HistOptError::IoError(_)));
}

#[test]
fn test_read_config_and_model() -> Result<()> {
    let dir = tempdir()?;
    let config_path = dir.path().join("controllable.json");
    let model_path = dir.path().join("model.json");
    fs::write(&config_path, CONFIG)?;
    fs::write(&model_path, r#"{"coefficients": [1.0, 1.0, 1.0], "intercept": 0.5}"#)?;

    let config = io::read_config(&config_path)?;
    let model = io::read_model(&model_path)?;

    assert_eq!(config.control_variables(), vec!["OIL", "GAS"]);
    assert_eq!(config.strategy, Strategy::SimulatedAnnealing);
    assert_eq!(config.seed, Some(5));
    assert_eq!(model.predict(&array![10.0, 5.0, 2.0])?, 17.5);
    Ok(())
}

#[test]
fn test_invalid_config_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("controllable.json");
    fs::write(&path, r#"{"controllable": {"OIL": [3, -3]}}"#).unwrap();

    assert!(matches!(
        io::read_config(&path),
        Err(HistOptError::InvalidConfig(_))
    ));
}

#[test]
fn test_batch_from_files_to_csv() -> Result<()> {
    let dir = tempdir()?;
    let input = dir.path().join("history.csv");
    let config_path = dir.path().join("controllable.json");
    let output = dir.path().join("out.csv");
    fs::write(&input, HISTORY)?;
    fs::write(&config_path, CONFIG)?;

    let table = io::read_table(&input, "Date")?;
    let config = io::read_config(&config_path)?;
    let model = histopt_rs::LinearModel::new(vec![1.0, 1.0, 1.0], 0.0);

    let result = HistoricalOptimizer::new(config)?.run(&table, &model)?;
    result.save_csv(&output)?;

    let text = fs::read_to_string(&output)?;
    let lines: Vec<&str> = text.lines().collect();
    // The row with OUTLET 12 is below outlet_min
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "Date,OIL_Optimized,GAS_Optimized,Success");
    assert!(lines[1].starts_with("2022-03-01 00:00:00,"));
    assert!(lines[2].starts_with("2022-03-01 02:00:00,"));
    assert!(lines[1].ends_with(",True"));
    Ok(())
}

#[test]
fn test_quoted_timestamps_survive_round_trip() -> Result<()> {
    let dir = tempdir()?;
    let input = dir.path().join("history.csv");
    let config_path = dir.path().join("controllable.json");
    let output = dir.path().join("out.csv");
    fs::write(
        &input,
        "OIL,\"Date\",GAS,COMBUSTION_AIR,OUTLET\n\
         10,\"Jan 1, 2021\",5,2,17\n\
         11,\"Jan 2, 2021 \"\"night\"\"\",4,3,18\n",
    )?;
    fs::write(&config_path, CONFIG)?;

    let table = io::read_table(&input, "Date")?;
    let config = io::read_config(&config_path)?;
    let model = histopt_rs::LinearModel::new(vec![1.0, 1.0, 1.0], 0.0);
    HistoricalOptimizer::new(config)?
        .run(&table, &model)?
        .save_csv(&output)?;

    let mut reader = csv::Reader::from_path(&output)?;
    let header = reader.headers()?.clone();
    assert_eq!(header.len(), 4);
    assert_eq!(&header[0], "Date");

    let rows = reader.records().collect::<std::result::Result<Vec<_>, _>>()?;
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.len() == header.len()));
    assert_eq!(&rows[0][0], "Jan 1, 2021");
    assert_eq!(&rows[1][0], "Jan 2, 2021 \"night\"");
    Ok(())
}
