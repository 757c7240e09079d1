//! Command line front end: load a historical table, optimize every row,
//! write the results as CSV.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use histopt_rs::{io, HistoricalOptimizer, Strategy};

#[derive(Debug, Parser)]
#[command(author, version, about = "Historical per-timestamp control optimization", long_about = None)]
struct Cli {
    /// Historical data file (.csv, .txt or .json)
    input_file: PathBuf,

    /// Output CSV path; missing directories are created
    out_path: PathBuf,

    /// Weight of the outlet deviation penalty
    c_value: f64,

    /// Name of the timestamp column
    #[arg(long, default_value = "Date")]
    date_label: String,

    /// Worker count (at least 2); all cores when omitted
    #[arg(long)]
    n_cores: Option<usize>,

    /// Iteration cap per row
    #[arg(long)]
    max_iter: Option<usize>,

    /// Optimization config JSON
    #[arg(long, default_value = "controllable.json")]
    config_path: PathBuf,

    /// Linear model JSON
    #[arg(long, default_value = "model.json")]
    model_path: PathBuf,

    /// Base seed for the per-row random streams
    #[arg(long, env = "HISTOPT_SEED")]
    seed: Option<u64>,

    /// dual-annealing, simulated-annealing or differential-evolution
    #[arg(long)]
    strategy: Option<Strategy>,

    /// Also write baseline and optimized objective columns
    #[arg(long)]
    with_objectives: bool,

    /// Copy log output to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    if let Err(err) = init_logging(cli.log_file.as_deref()) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }

    if let Err(err) = run(cli) {
        tracing::error!("{err:#}");
        std::process::exit(1);
    }
}

fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let file_layer = match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("creating log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .init();
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let start = Instant::now();

    info!("Reading config and data");
    let mut config = io::read_config(&cli.config_path)
        .with_context(|| format!("reading config {}", cli.config_path.display()))?;
    config.c = cli.c_value;
    if let Some(n_cores) = cli.n_cores {
        config.worker_count = Some(n_cores);
    }
    if let Some(max_iter) = cli.max_iter {
        config.max_iterations = max_iter;
    }
    if let Some(seed) = cli.seed {
        config.seed = Some(seed);
    }
    if let Some(strategy) = cli.strategy {
        config.strategy = strategy;
    }

    let model = io::read_model(&cli.model_path)
        .with_context(|| format!("reading model {}", cli.model_path.display()))?;
    let table = io::read_table(&cli.input_file, &cli.date_label)
        .with_context(|| format!("reading {}", cli.input_file.display()))?;

    let engine = HistoricalOptimizer::new(config)?;
    info!(
        rows = table.len(),
        workers = engine.workers(),
        strategy = %engine.config().strategy,
        "Optimizing"
    );
    let result = engine.run(&table, &model)?.with_objectives(cli.with_objectives);

    info!("Saving results to {}", cli.out_path.display());
    if let Some(dir) = cli.out_path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            info!("Output directory not found, creating {}", dir.display());
            fs::create_dir_all(dir)
                .with_context(|| format!("creating output directory {}", dir.display()))?;
        }
    }
    result
        .save_csv(&cli.out_path)
        .with_context(|| format!("writing {}", cli.out_path.display()))?;

    info!(
        "Total run time: {:.3} (minutes)",
        start.elapsed().as_secs_f64() / 60.0
    );
    Ok(())
}
