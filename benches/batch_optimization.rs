//! Benchmarks for per-row optimization.
//!
//! Compares the search strategies on a single furnace row and measures a
//! whole batch through the worker pool.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use histopt_rs::{
    Bounds, ControlDelta, ControlObjective, GlobalOptimizer, HistoricalOptimizer, HistoricalTable,
    LinearModel, OptimizationConfig, Strategy,
};
use ndarray::{array, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn furnace_history(rows: usize) -> HistoricalTable {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let timestamps = (0..rows).map(|i| format!("2021-01-01 {:02}:00", i % 24)).collect();
    let data = Array2::from_shape_fn((rows, 4), |(_, j)| match j {
        0 => rng.gen_range(8.0..15.0),
        1 => rng.gen_range(3.0..8.0),
        2 => rng.gen_range(1.0..4.0),
        _ => rng.gen_range(280.0..320.0),
    });
    HistoricalTable::new(
        "Date",
        timestamps,
        vec![
            "OIL".into(),
            "GAS".into(),
            "COMBUSTION_AIR".into(),
            "OUTLET".into(),
        ],
        data,
    )
    .unwrap()
}

fn bench_strategies(c: &mut Criterion) {
    let model = LinearModel::new(vec![10.0, 12.0, 5.0], 150.0);
    let noncontrol = array![2.0];
    let problem = ControlObjective::new(&noncontrol, &model, 300.0, 0.01, 2);
    let bounds = vec![Bounds::from((8.0, 12.0)), Bounds::from((3.0, 7.0))];
    let x0 = array![10.0, 5.0];

    let mut group = c.benchmark_group("single_row");
    for strategy in [
        Strategy::DualAnnealing,
        Strategy::SimulatedAnnealing,
        Strategy::DifferentialEvolution,
    ] {
        group.bench_with_input(
            BenchmarkId::from_parameter(strategy),
            &strategy,
            |b, strategy| {
                b.iter(|| {
                    strategy
                        .minimize(black_box(&problem), &bounds, &x0, 75, 1)
                        .unwrap()
                })
            },
        );
    }
    group.finish();
}

fn bench_batch(c: &mut Criterion) {
    let model = LinearModel::new(vec![10.0, 12.0, 5.0], 150.0);
    let mut config = OptimizationConfig::new(
        vec![
            ControlDelta::new("OIL", -2.0, 2.0),
            ControlDelta::new("GAS", -2.0, 2.0),
        ],
        vec!["COMBUSTION_AIR".to_string()],
    );
    config.worker_count = Some(2);
    config.seed = Some(1);
    let engine = HistoricalOptimizer::new(config).unwrap();

    let mut group = c.benchmark_group("batch");
    group.sample_size(10);
    for rows in [24, 96] {
        let table = furnace_history(rows);
        group.bench_with_input(BenchmarkId::from_parameter(rows), &table, |b, table| {
            b.iter(|| engine.run(black_box(table), &model).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_strategies, bench_batch);
criterion_main!(benches);
