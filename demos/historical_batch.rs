//! Example of optimizing a day of furnace history.
//!
//! Builds a synthetic hourly history, optimizes every hour with the default
//! dual annealing search and prints the savings per row.

use histopt_rs::{
    ControlDelta, FnModel, HistoricalOptimizer, HistoricalTable, OptimizationConfig,
};
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Historical batch example");
    println!("========================\n");

    let mut rng = ChaCha8Rng::seed_from_u64(2022);
    let hours = 24;

    let timestamps = (0..hours)
        .map(|h| format!("2022-03-01 {:02}:00:00", h))
        .collect();
    let data = Array2::from_shape_fn((hours, 5), |(_, j)| match j {
        0 => rng.gen_range(8.0..14.0),   // OIL
        1 => rng.gen_range(3.0..7.0),    // GAS
        2 => rng.gen_range(40.0..60.0),  // COMBUSTION_AIR
        3 => rng.gen_range(140.0..160.0), // INLET_TEMP
        _ => rng.gen_range(275.0..320.0), // OUTLET
    });
    let table = HistoricalTable::new(
        "Date",
        timestamps,
        vec![
            "OIL".into(),
            "GAS".into(),
            "COMBUSTION_AIR".into(),
            "INLET_TEMP".into(),
            "OUTLET".into(),
        ],
        data,
    )?;

    let mut config = OptimizationConfig::new(
        vec![
            ControlDelta::new("OIL", -3.0, 3.0),
            ControlDelta::new("GAS", -2.0, 2.0),
            ControlDelta::new("COMBUSTION_AIR", -10.0, 10.0),
        ],
        vec!["INLET_TEMP".to_string()],
    );
    config.non_negative = vec!["OIL".to_string(), "COMBUSTION_AIR".to_string()];
    config.outlet_min = Some(280.0);
    config.worker_count = Some(2);
    config.seed = Some(7);

    // Outlet temperature rises with fuel and inlet temperature, falls with excess air
    let model = FnModel::new(|v: &Array1<f64>| {
        Ok(6.0 * v[0] + 8.0 * v[1] - 0.4 * v[2] + 1.2 * v[3] + 50.0)
    });

    let engine = HistoricalOptimizer::new(config)?;
    println!("Optimizing {} rows on {} workers\n", table.len(), engine.workers());
    let result = engine.run(&table, &model)?;

    println!(
        "{:<20} {:>8} {:>8} {:>10} {:>10} {:>8}",
        "Date", "OIL", "GAS", "before", "after", "success"
    );
    for i in 0..result.len() {
        let before = result.baseline_objective()[i].unwrap_or(f64::NAN);
        let after = result.optimized_objective()[i].unwrap_or(f64::NAN);
        println!(
            "{:<20} {:>8.3} {:>8.3} {:>10.3} {:>10.3} {:>8}",
            result.timestamps()[i],
            result.values()[[i, 0]],
            result.values()[[i, 1]],
            before,
            after,
            result.success()[i]
        );
    }

    println!(
        "\n{} of {} rows kept after the outlet filter, {} did not converge",
        result.len(),
        table.len(),
        result.failed_count()
    );

    let mut csv = Vec::new();
    result.with_objectives(true).write_csv(&mut csv)?;
    println!("\nCSV output:\n{}", String::from_utf8(csv)?);

    Ok(())
}
