//! Run observer that wires the draw loop to logs, checkpoints, and the registry.
//!
//! Special draws and milestones go to the buffered [`EventLogger`]. By the
//! time a checkpoint is requested the loop has already flushed the logs;
//! the observer saves the checkpoint atomically and then records the run
//! in the shared registry. Persistence failures are logged and counted,
//! and never stop the loop.

use chrono::Utc;
use collector_core::config::LoggingConfig;
use collector_core::estimator::CompletionEstimate;
use collector_core::runner::RunObserver;
use collector_core::simulation::{Progress, Simulation};
use collector_events::{EventLogger, LoggerStats};
use collector_store::{Checkpoint, CheckpointStore, RegistryEntry, RunPaths, RunRegistry};
use collector_types::{EventRecord, MilestoneRecord};
use tracing::{debug, error, info, warn};

/// Observer used by the binary.
pub struct EngineObserver {
    logger: EventLogger,
    store: CheckpointStore,
    registry: RunRegistry,
    paths: RunPaths,
    checkpoints_saved: u64,
    checkpoint_failures: u64,
}

impl EngineObserver {
    /// Create an observer writing into the run's directory.
    pub fn new(paths: RunPaths, logging: &LoggingConfig) -> Self {
        Self {
            logger: EventLogger::new(
                &paths.events,
                &paths.milestones,
                logging.event_buffer_capacity,
                logging.milestone_buffer_capacity,
            ),
            store: CheckpointStore::new(&paths.checkpoint),
            registry: RunRegistry::load(paths.registry()),
            paths,
            checkpoints_saved: 0,
            checkpoint_failures: 0,
        }
    }

    /// Written, dropped, and pending record counts.
    pub fn logger_stats(&self) -> LoggerStats {
        self.logger.stats()
    }

    /// Checkpoints saved this session.
    pub const fn checkpoints_saved(&self) -> u64 {
        self.checkpoints_saved
    }

    /// Checkpoint saves that failed this session.
    pub const fn checkpoint_failures(&self) -> u64 {
        self.checkpoint_failures
    }

    fn update_registry(&mut self, simulation: &Simulation) {
        let state = simulation.state();
        let entry = RegistryEntry {
            rate_label: simulation.identity().rate_label.clone(),
            special_rate: state.special_rate,
            guaranteed_retention: state.guaranteed_retention,
            last_updated: Utc::now(),
            checkpoint_path: self.paths.checkpoint.clone(),
            reports_dir: self.paths.run_dir.clone(),
        };
        let name = simulation.identity().name.as_str();
        if let Err(e) = self.registry.record(name, entry) {
            warn!(
                path = %self.registry.path().display(),
                error = %e,
                "Failed to update run registry"
            );
        }
    }
}

impl RunObserver for EngineObserver {
    fn on_special(&mut self, record: &EventRecord) {
        self.logger.record_event(record.clone());
    }

    fn on_new_retention(&mut self, simulation: &Simulation, _record: &EventRecord) {
        if let Some(remaining) = simulation.estimate().expected_draws() {
            debug!(expected_remaining_draws = remaining, "Completion estimate refreshed");
        }
    }

    fn on_milestone(&mut self, record: MilestoneRecord) {
        self.logger.record_milestone(record);
    }

    fn on_progress(&mut self, progress: &Progress) {
        let coverage = format!("{}/{}", progress.unique_retained, progress.population_size);
        let eta = progress
            .eta_seconds
            .map_or_else(|| "unknown".to_owned(), format_duration);
        match &progress.estimate {
            CompletionEstimate::Expected { draws } => info!(
                draws = progress.draws,
                draws_per_second = format!("{:.0}", progress.draws_per_second),
                retained_per_second = format!("{:.4}", progress.retained_per_second),
                coverage,
                expected_remaining_draws = format!("{draws:.0}"),
                eta,
                "Progress"
            ),
            CompletionEstimate::Unreachable { members } => info!(
                draws = progress.draws,
                draws_per_second = format!("{:.0}", progress.draws_per_second),
                retained_per_second = format!("{:.4}", progress.retained_per_second),
                coverage,
                unreachable_members = members.len(),
                "Progress (completion unreachable)"
            ),
        }
    }

    fn flush_records(&mut self) -> usize {
        let stats = self.logger.stats();
        let pending = stats
            .events
            .pending
            .saturating_add(stats.milestones.pending);
        self.logger.flush();
        pending
    }

    fn save_checkpoint(&mut self, simulation: &Simulation) {
        let checkpoint = Checkpoint::capture(simulation);
        match self.store.save(&checkpoint) {
            Ok(()) => {
                self.checkpoints_saved = self.checkpoints_saved.saturating_add(1);
                self.update_registry(simulation);
            }
            Err(e) => {
                self.checkpoint_failures = self.checkpoint_failures.saturating_add(1);
                error!(
                    path = %self.store.path().display(),
                    draws = checkpoint.state.draw_count,
                    error = %e,
                    "Checkpoint save failed"
                );
            }
        }
    }
}

/// Render a duration as days, hours, minutes, and seconds.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_duration(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "unknown".to_owned();
    }
    // `as` saturates, so absurdly large estimates clamp to u64::MAX.
    let total = seconds.round() as u64;
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let secs = total % 60;

    if days > 0 {
        format!("{days}d {hours:02}h {minutes:02}m")
    } else if hours > 0 {
        format!("{hours}h {minutes:02}m {secs:02}s")
    } else if minutes > 0 {
        format!("{minutes}m {secs:02}s")
    } else {
        format!("{secs}s")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeSet;

    use collector_core::population::Population;
    use collector_core::simulation::RunIdentity;
    use collector_store::LoadOutcome;
    use collector_types::{Member, MemberId, RunName};

    use super::*;

    fn simulation(name: &RunName) -> Simulation {
        let members = ["Pidgey", "Rattata"]
            .into_iter()
            .map(|id| Member {
                id: MemberId::new(id),
                rank: 250.0,
                retention_rate: 0.5,
                draw_weight: 1.0,
                flags: BTreeSet::new(),
            })
            .collect();
        let population = Population::from_members(members).unwrap();
        let identity = RunIdentity {
            name: name.clone(),
            rate_label: "custom(0.1)".to_owned(),
        };
        Simulation::new(identity, population, 0.1, false, 5).unwrap()
    }

    #[test]
    fn durations_pick_largest_units() {
        assert_eq!(format_duration(42.4), "42s");
        assert_eq!(format_duration(125.0), "2m 05s");
        assert_eq!(format_duration(3_725.0), "1h 02m 05s");
        assert_eq!(format_duration(90_061.0), "1d 01h 01m");
        assert_eq!(format_duration(f64::INFINITY), "unknown");
        assert_eq!(format_duration(-1.0), "unknown");
    }

    #[test]
    fn checkpoint_updates_store_and_registry() {
        let dir = tempfile::TempDir::new().unwrap();
        let name = RunName::parse("observer").unwrap();
        let paths = RunPaths::new(dir.path(), &name);
        let mut observer = EngineObserver::new(paths.clone(), &LoggingConfig::default());
        let mut sim = simulation(&name);
        for _ in 0..200 {
            let _ = sim.draw().unwrap();
        }

        let _ = observer.flush_records();
        observer.save_checkpoint(&sim);

        assert_eq!(observer.checkpoints_saved(), 1);
        assert_eq!(observer.checkpoint_failures(), 0);
        assert!(matches!(
            CheckpointStore::new(&paths.checkpoint).load(&name, sim.population()),
            LoadOutcome::Restored(_)
        ));
        let registry = RunRegistry::load(paths.registry());
        assert_eq!(registry.last_active(), Some("observer"));
        assert_eq!(registry.get("observer").unwrap().checkpoint_path, paths.checkpoint);
    }

    #[test]
    fn specials_reach_the_event_log_on_flush() {
        let dir = tempfile::TempDir::new().unwrap();
        let name = RunName::parse("events").unwrap();
        let paths = RunPaths::new(dir.path(), &name);
        let mut observer = EngineObserver::new(paths.clone(), &LoggingConfig::default());

        observer.on_special(&EventRecord {
            draw_index: 17,
            member_id: MemberId::new("Pidgey"),
            retained: true,
            first_retention: true,
        });
        assert_eq!(observer.logger_stats().events.pending, 1);

        assert_eq!(observer.flush_records(), 1);
        let stats = observer.logger_stats();
        assert_eq!(stats.events.pending, 0);
        assert_eq!(stats.events.written, 1);

        let contents = std::fs::read_to_string(&paths.events).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.lines().nth(1).unwrap().starts_with("17,Pidgey,"));
    }
}
