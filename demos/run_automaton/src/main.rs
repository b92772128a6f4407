//! Run Automaton - runs a simulation from a RON config
//!
//! Loads a `SimulationConfig` (or uses the defaults), runs it through the
//! controller until the step limit, and prints the final lattice.

use clap::Parser;
use lattica_hub::{
    PopulationHistory, Simulation, SimulationConfig, SimulationController, StopReason,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "run_automaton")]
#[command(about = "Run a cellular automaton and print the final lattice")]
struct Cli {
    /// Path to a RON simulation config (defaults are used when omitted)
    config: Option<PathBuf>,

    /// Number of generations to run (overrides the config)
    #[arg(long)]
    steps: Option<u64>,

    /// Worker shards per generation (overrides the config)
    #[arg(long)]
    processors: Option<usize>,

    /// Rule id (overrides the config)
    #[arg(long)]
    rule: Option<String>,

    /// Print the effective config as RON and exit
    #[arg(long)]
    dump_config: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "run_automaton=info,lattica_hub=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match SimulationConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => SimulationConfig::default(),
    };
    config.max_steps = cli.steps.or(config.max_steps).or(Some(50));
    if let Some(processors) = cli.processors {
        config.processor_count = processors;
    }
    if let Some(rule) = cli.rule {
        config.rule = rule;
    }

    if cli.dump_config {
        return match config.to_ron_string() {
            Ok(text) => {
                println!("{}", text);
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("{}", e);
                ExitCode::FAILURE
            }
        };
    }

    let simulation = match Simulation::setup(config) {
        Ok(simulation) => simulation,
        Err(e) => {
            error!("Setup failed: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let outcome = simulation.build_outcome();
    if outcome.degraded() {
        warn!(
            "Requested lattice did not fit; running the {} configuration ({}x{})",
            outcome.tier, outcome.config.rows, outcome.config.columns
        );
    }

    let mut controller = SimulationController::new(simulation);
    let population = PopulationHistory::new();
    let log = population.log();
    controller.add_analysis(Box::new(population));

    if let Err(e) = controller.start() {
        error!("Could not start: {}", e);
        return ExitCode::FAILURE;
    }
    let reason = controller.wait_until_stopped();
    info!("{}", controller.status_message());

    controller.with_simulation(|sim| print!("{}", sim.lattice().to_grid_string()));
    if let Ok(log) = log.lock() {
        if let (Some(first), Some(last)) = (log.first(), log.last()) {
            println!(
                "population: {} at generation {} -> {} at generation {}",
                first.1, first.0, last.1, last.0
            );
        }
    }

    match reason {
        Some(StopReason::Fault(_)) => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    }
}
