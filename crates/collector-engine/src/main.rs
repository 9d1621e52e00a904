//! Engine binary for the Collector simulation.
//!
//! This is the main entry point that wires together configuration, the
//! population, checkpoint resume, the buffered logs, and interrupt
//! handling around the sequential draw loop.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `collector-config.yaml` (or `COLLECTOR_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Validate configuration
//! 4. Load the population source
//! 5. Resume from checkpoint or start a fresh run
//! 6. Install the interrupt handler
//! 7. Run the draw loop on a blocking thread
//! 8. Log the final report and write `results.json`

mod error;
mod observer;
mod session;

use std::path::PathBuf;

use collector_core::config::SimulationConfig;
use collector_core::operator::{EndReason, StopSignal};
use collector_core::population::Population;
use collector_core::report::RunReport;
use collector_core::runner;
use collector_store::atomic;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::observer::{EngineObserver, format_duration};
use crate::session::StartKind;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "collector-config.yaml";

/// Application entry point for the engine.
///
/// An interrupted run is not a failure: the loop stops after the current
/// draw, the checkpoint and report are written, and the process exits
/// successfully.
///
/// # Errors
///
/// Returns an error if any initialization step or the draw loop fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration. Logging is not up yet, so remember where it came from.
    let (config, config_path) = load_config()?;

    // 2. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!("collector-engine starting");

    // 3. Validate configuration.
    config.validate().map_err(EngineError::from)?;
    match &config_path {
        Some(path) => info!(path = %path.display(), "Configuration file loaded"),
        None => info!("Config file not found, using defaults"),
    }
    info!(
        run = config.run.name,
        seed = config.run.seed,
        reports_dir = %config.run.reports_dir.display(),
        special_rate = %config.encounter.special_rate.label(),
        guaranteed_retention = config.encounter.guaranteed_retention,
        checkpoint_interval = config.cadence.checkpoint_interval,
        "Configuration loaded"
    );

    // 4. Load the population.
    let population = Population::load(&config.population.source, &config.population)
        .map_err(EngineError::from)?;
    info!(
        source = %config.population.source.display(),
        members = population.len(),
        total_weight = population.total_weight(),
        "Population loaded"
    );

    // 5. Resume or start fresh.
    let session = session::prepare(&config, population)?;
    let paths = session.paths;
    if session.start == StartKind::Resumed && session.simulation.is_complete() {
        info!("Run already complete, regenerating final report");
    }

    // 6. Interrupts request a stop; the loop notices after the current draw.
    let stop = StopSignal::new();
    let signal = stop.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, saving progress");
                signal.request_stop();
            }
            Err(e) => warn!(error = %e, "Failed to listen for interrupt signal"),
        }
    });

    // 7. Run the draw loop off the async runtime.
    let observer = EngineObserver::new(paths.clone(), &config.logging);
    let cadence = config.cadence;
    let mut simulation = session.simulation;
    let (simulation, observer, result) = tokio::task::spawn_blocking(move || {
        let mut observer = observer;
        let result = runner::run(&mut simulation, &mut observer, &stop, &cadence);
        (simulation, observer, result)
    })
    .await
    .map_err(EngineError::from)?;
    let outcome = result.map_err(EngineError::from)?;
    runner::log_run_end(&outcome);

    let stats = observer.logger_stats();
    info!(
        events_written = stats.events.written,
        events_dropped = stats.events.dropped,
        milestones_written = stats.milestones.written,
        milestones_dropped = stats.milestones.dropped,
        checkpoints_saved = observer.checkpoints_saved(),
        checkpoint_failures = observer.checkpoint_failures(),
        "Persistence summary"
    );

    // 8. Final report.
    let report = RunReport::from_simulation(&simulation, outcome.end_reason);
    log_report(&report);
    atomic::write_json(&paths.results, &report).map_err(EngineError::from)?;
    info!(path = %paths.results.display(), "Final report written");

    match outcome.end_reason {
        EndReason::Completed => info!(
            total_draws = outcome.total_draws,
            "Simulation completed, every member retained"
        ),
        EndReason::Interrupted => info!(
            run = %simulation.identity().name,
            total_draws = outcome.total_draws,
            "Run paused, start again with the same run name to resume"
        ),
    }

    info!("collector-engine shutdown complete");
    Ok(())
}

/// Load the simulation configuration.
///
/// Reads `COLLECTOR_CONFIG` if set, otherwise `collector-config.yaml` in
/// the current working directory. A missing file yields the defaults
/// with environment overrides applied. Returns the path that was read.
fn load_config() -> Result<(SimulationConfig, Option<PathBuf>), EngineError> {
    let config_path = std::env::var("COLLECTOR_CONFIG")
        .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    if config_path.exists() {
        let config = SimulationConfig::from_file(&config_path)?;
        Ok((config, Some(config_path)))
    } else {
        let mut config = SimulationConfig::default();
        config.apply_env_overrides();
        Ok((config, None))
    }
}

/// Log the final report field by field.
fn log_report(report: &RunReport) {
    info!(
        run = report.run_name,
        status = report.status,
        rate = report.rate_label,
        guaranteed_retention = report.guaranteed_retention,
        total_draws = report.total_draws,
        elapsed = format_duration(report.elapsed_seconds),
        draws_per_second = format!("{:.2}", report.draws_per_second),
        retained_per_second = format!("{:.6}", report.retained_per_second),
        "Run summary"
    );
    info!(
        special_seen = report.special_seen,
        special_retained = report.special_retained,
        special_missed = report.special_missed,
        retention_success_percent = format!("{:.2}", report.retention_success_percent),
        configured_special_rate = report.configured_special_rate,
        observed_special_rate = report.observed_special_rate,
        special_variance_percent = format!("{:+.2}", report.special_variance_percent),
        "Special draw statistics"
    );
    info!(
        unique_retained = report.unique_retained,
        unique_ordinary = report.unique_ordinary,
        population = report.population_size,
        expected_remaining_draws = report.expected_remaining_draws.map(|d| format!("{d:.0}")),
        "Coverage"
    );
    if let Some(prediction) = &report.prediction {
        info!(
            predicted_draws = format!("{:.0}", prediction.predicted_draws),
            actual_draws = prediction.actual_draws,
            difference = format!("{:+.0}", prediction.difference),
            difference_percent = format!("{:+.2}", prediction.difference_percent),
            "Prediction accuracy"
        );
    }
}
