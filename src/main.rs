use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use log::info;

use route_learning_sim::simulation::{Experiment, ExperimentOptions, Scenario};

#[derive(Parser)]
#[command(name = "route_learning_sim")]
#[command(about = "Traffic simulation with route-choice learning across rounds")]
struct Cli {
    /// Maximum number of simulation ticks per round
    #[arg(long, default_value = "20000")]
    ticks: u64,

    /// Time delta per tick in seconds
    #[arg(long, default_value = "0.05")]
    delta: f64,

    /// Number of rounds to play
    #[arg(long, default_value = "10")]
    rounds: u32,

    /// Seed for route sampling and driver parameters
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Scenario JSON file; the built-in merge network when omitted
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Write trip records and learner state to this JSON file
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if !cli.delta.is_finite() || cli.delta <= 0.0 {
        bail!("Time delta must be positive, got {}", cli.delta);
    }

    let scenario = match &cli.scenario {
        Some(path) => Scenario::from_json_file(path)?,
        None => Scenario::default(),
    };
    info!(
        "Scenario: {} roads, {} vehicles per round",
        scenario.roads.len(),
        scenario.generator.vehicle_limit
    );

    let options = ExperimentOptions {
        rounds: cli.rounds,
        max_ticks: cli.ticks,
        dt: cli.delta,
        seed: cli.seed,
    };
    let report = Experiment::new(scenario, options)?.run()?;

    if let Some(path) = &cli.output {
        report.write_json(path)?;
        info!("Report written to {}", path.display());
    }

    Ok(())
}
