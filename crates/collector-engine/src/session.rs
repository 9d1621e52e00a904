//! Session preparation: fresh start or resume from checkpoint.
//!
//! The configured run name selects a directory under the reports
//! directory. If that directory holds a valid checkpoint, the run resumes
//! from it and the checkpoint's rate settings win over the configuration.
//! A missing checkpoint starts a fresh run; a corrupt one is reported and
//! also starts fresh. `run.fresh` ignores any existing checkpoint.
//!
//! The logs always agree with the counters the loop starts from. A resumed
//! run cuts both logs back to the checkpoint's draw count, dropping rows
//! flushed after the last save; every fresh start discards them.

use std::io::ErrorKind;
use std::path::Path;

use collector_core::config::SimulationConfig;
use collector_core::population::Population;
use collector_core::simulation::{RunIdentity, Simulation};
use collector_events::truncate_after;
use collector_store::{CheckpointStore, LoadOutcome, RunPaths};
use collector_types::RunName;
use tracing::{info, warn};

use crate::error::EngineError;

/// How the session started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartKind {
    /// No usable checkpoint; counters start at zero.
    Fresh,
    /// Restored from the run's checkpoint.
    Resumed,
}

/// A simulation ready to enter the draw loop.
#[derive(Debug)]
pub struct Session {
    /// The simulation.
    pub simulation: Simulation,
    /// File layout of the run.
    pub paths: RunPaths,
    /// Whether the run was resumed.
    pub start: StartKind,
}

/// Build the session for the configured run.
///
/// # Errors
///
/// Returns [`EngineError`] for an invalid run name, a simulation that
/// cannot be constructed, or stale logs that cannot be removed or
/// truncated.
pub fn prepare(config: &SimulationConfig, population: Population) -> Result<Session, EngineError> {
    let name = config.run_name()?;
    let paths = RunPaths::new(&config.run.reports_dir, &name);
    let store = CheckpointStore::new(&paths.checkpoint);

    if config.run.fresh {
        if store.exists() {
            info!(
                run = %name,
                checkpoint = %paths.checkpoint.display(),
                "Fresh run requested, existing checkpoint will be overwritten"
            );
        }
        discard_logs(&paths)?;
        return start_fresh(config, name, population, paths);
    }

    match store.load(&name, &population) {
        LoadOutcome::Restored(checkpoint) => {
            let configured_rate = config.encounter.special_rate.probability();
            let configured_guaranteed = config.encounter.guaranteed_retention;
            if (checkpoint.state.special_rate - configured_rate).abs() > f64::EPSILON
                || checkpoint.state.guaranteed_retention != configured_guaranteed
            {
                warn!(
                    run = %name,
                    checkpoint_rate = checkpoint.state.special_rate,
                    checkpoint_guaranteed = checkpoint.state.guaranteed_retention,
                    configured_rate,
                    configured_guaranteed,
                    "Checkpoint settings differ from configuration, keeping checkpoint settings"
                );
            }

            let checkpoint = *checkpoint;
            truncate_logs(&paths, checkpoint.state.draw_count)?;
            let identity = RunIdentity {
                name,
                rate_label: checkpoint.rate_label,
            };
            let simulation = Simulation::restore(
                identity,
                population,
                checkpoint.state,
                checkpoint.rng.into(),
                checkpoint.initial_prediction,
            )?;
            info!(
                run = %simulation.identity().name,
                saved_at = %checkpoint.saved_at,
                draws = simulation.state().draw_count,
                retained = simulation.state().unique_retained(),
                population = simulation.population().len(),
                elapsed_seconds = simulation.state().elapsed_seconds_prior,
                "Checkpoint restored"
            );
            log_prediction(&simulation);
            Ok(Session {
                simulation,
                paths,
                start: StartKind::Resumed,
            })
        }
        LoadOutcome::NotFound => {
            info!(run = %name, "No checkpoint found, starting fresh run");
            discard_logs(&paths)?;
            start_fresh(config, name, population, paths)
        }
        LoadOutcome::Corrupt { reason } => {
            warn!(
                run = %name,
                checkpoint = %paths.checkpoint.display(),
                error = %reason,
                "Checkpoint unusable, starting fresh run"
            );
            discard_logs(&paths)?;
            start_fresh(config, name, population, paths)
        }
    }
}

fn start_fresh(
    config: &SimulationConfig,
    name: RunName,
    population: Population,
    paths: RunPaths,
) -> Result<Session, EngineError> {
    let rate = config.encounter.special_rate;
    let identity = RunIdentity {
        name,
        rate_label: rate.label(),
    };
    let simulation = Simulation::new(
        identity,
        population,
        rate.probability(),
        config.encounter.guaranteed_retention,
        config.run.seed,
    )?;
    info!(
        run = %simulation.identity().name,
        rate = %simulation.identity().rate_label,
        special_rate = simulation.state().special_rate,
        guaranteed_retention = simulation.state().guaranteed_retention,
        seed = config.run.seed,
        "Fresh run started"
    );
    log_prediction(&simulation);
    Ok(Session {
        simulation,
        paths,
        start: StartKind::Fresh,
    })
}

fn log_prediction(simulation: &Simulation) {
    match simulation.estimate().expected_draws() {
        Some(remaining) => info!(
            expected_remaining_draws = format!("{remaining:.0}"),
            initial_prediction = simulation.initial_prediction().map(|p| format!("{p:.0}")),
            "Completion prediction"
        ),
        None => warn!(
            remaining_members = simulation.remaining(),
            "Completion is unreachable: some remaining member can never be retained"
        ),
    }
}

fn truncate_logs(paths: &RunPaths, draw_count: u64) -> Result<(), EngineError> {
    for path in [&paths.events, &paths.milestones] {
        let removed = truncate_after(path, draw_count)?;
        if removed > 0 {
            warn!(
                path = %path.display(),
                removed_rows = removed,
                checkpoint_draws = draw_count,
                "Dropped log rows written after the last checkpoint"
            );
        }
    }
    Ok(())
}

fn discard_logs(paths: &RunPaths) -> Result<(), EngineError> {
    for path in [&paths.events, &paths.milestones, &paths.results] {
        remove_if_present(path)?;
    }
    Ok(())
}

fn remove_if_present(path: &Path) -> Result<(), EngineError> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            info!(path = %path.display(), "Removed log from previous run");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(source) => Err(EngineError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}
