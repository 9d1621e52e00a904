//! Draw loop runner with stop control and periodic hooks.
//!
//! This module provides [`run`], which drives [`Simulation::draw`] until
//! every member is retained or a stop is requested, and calls into a
//! [`RunObserver`] on a fixed draw-count cadence:
//!
//! - **Special draws**: every event record, as it happens
//! - **Milestones**: a counter snapshot every `milestone_interval` draws
//! - **Progress**: a status report every `progress_interval` draws
//! - **Checkpoints**: flush buffered records, then save, every
//!   `checkpoint_interval` draws and once more when the loop ends
//!
//! The completion estimate is refreshed every `estimate_interval` draws
//! and on each new retention. The stop signal is checked once per draw,
//! after the draw has been fully applied.

use collector_types::{EventRecord, MilestoneRecord};
use tracing::{debug, error, info};

use crate::config::CadenceConfig;
use crate::encounter::{DrawOutcome, EncounterError};
use crate::operator::{EndReason, StopSignal};
use crate::simulation::{Progress, Simulation};

/// Errors that abort the draw loop.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A draw violated an invariant.
    #[error("encounter error: {source}")]
    Encounter {
        /// The underlying encounter error.
        #[from]
        source: EncounterError,
    },
}

/// Result of a completed or interrupted session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    /// Why the loop ended.
    pub end_reason: EndReason,
    /// Draws performed in this session.
    pub session_draws: u64,
    /// Cumulative draws at the end of the session.
    pub total_draws: u64,
}

/// Hooks invoked by the draw loop.
///
/// Every method has a no-op default. Persistence failures are the
/// observer's to report; the loop itself never stops because a log or
/// checkpoint write failed.
pub trait RunObserver: Send {
    /// A special draw occurred.
    fn on_special(&mut self, _record: &EventRecord) {}

    /// A member was retained for the first time. The estimate is already refreshed.
    fn on_new_retention(&mut self, _simulation: &Simulation, _record: &EventRecord) {}

    /// A milestone interval was reached.
    fn on_milestone(&mut self, _record: MilestoneRecord) {}

    /// A progress interval was reached.
    fn on_progress(&mut self, _progress: &Progress) {}

    /// Write every buffered record to durable storage.
    ///
    /// Returns how many records were pending when the flush started.
    fn flush_records(&mut self) -> usize {
        0
    }

    /// Persist a checkpoint of the simulation. Always preceded by [`flush_records`].
    ///
    /// [`flush_records`]: RunObserver::flush_records
    fn save_checkpoint(&mut self, _simulation: &Simulation) {}
}

/// A no-op observer for tests.
pub struct NoOpObserver;

impl RunObserver for NoOpObserver {}

/// Run the draw loop until completion or a stop request.
///
/// A simulation that is already complete (for example, restored from a
/// finished run) returns immediately with [`EndReason::Completed`]. In
/// both end states the observer is asked to flush and checkpoint once
/// more before this function returns.
///
/// # Errors
///
/// Returns [`RunnerError`] if a draw fails. Buffered records are flushed
/// first, but the observer is not asked to checkpoint; the last good
/// checkpoint remains on disk.
pub fn run(
    simulation: &mut Simulation,
    observer: &mut dyn RunObserver,
    stop: &StopSignal,
    cadence: &CadenceConfig,
) -> Result<RunOutcome, RunnerError> {
    let mut session_draws: u64 = 0;

    info!(
        run = %simulation.identity().name,
        draws = simulation.state().draw_count,
        retained = simulation.state().unique_retained(),
        population = simulation.population().len(),
        "Draw loop starting"
    );

    let end_reason = loop {
        if simulation.is_complete() {
            break EndReason::Completed;
        }
        if stop.is_stop_requested() {
            info!(draws = simulation.state().draw_count, "Stop requested");
            break EndReason::Interrupted;
        }

        let outcome = match simulation.draw() {
            Ok(outcome) => outcome,
            Err(err) => {
                let pending = observer.flush_records();
                error!(
                    draws = simulation.state().draw_count,
                    pending_records = pending,
                    error = %err,
                    "Draw failed, flushed buffered records without a checkpoint"
                );
                return Err(err.into());
            }
        };
        session_draws = session_draws.saturating_add(1);

        if let DrawOutcome::Special { record, .. } = &outcome {
            observer.on_special(record);
            if outcome.is_new_retention() {
                let _ = simulation.refresh_estimate();
                info!(
                    member = %record.member_id,
                    draw = record.draw_index,
                    retained = simulation.state().unique_retained(),
                    remaining = simulation.remaining(),
                    "New retention"
                );
                observer.on_new_retention(simulation, record);
            }
        }

        let draws = simulation.state().draw_count;
        if draws.is_multiple_of(cadence.milestone_interval) {
            observer.on_milestone(simulation.milestone_record());
        }
        if draws.is_multiple_of(cadence.estimate_interval) {
            let _ = simulation.refresh_estimate();
        }
        if draws.is_multiple_of(cadence.progress_interval) {
            observer.on_progress(&simulation.progress());
        }
        if draws.is_multiple_of(cadence.checkpoint_interval) {
            let flushed = observer.flush_records();
            debug!(draws, flushed, "Checkpoint interval reached");
            observer.save_checkpoint(simulation);
        }
    };

    let flushed = observer.flush_records();
    debug!(flushed, "Final flush before checkpoint");
    observer.save_checkpoint(simulation);

    Ok(RunOutcome {
        end_reason,
        session_draws,
        total_draws: simulation.state().draw_count,
    })
}

/// Log the end of a session.
pub fn log_run_end(outcome: &RunOutcome) {
    info!(
        reason = ?outcome.end_reason,
        session_draws = outcome.session_draws,
        total_draws = outcome.total_draws,
        "Draw loop ended"
    );
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeSet;

    use collector_types::{Member, MemberId, RunName};

    use super::*;
    use crate::population::Population;
    use crate::simulation::RunIdentity;

    fn simulation(special_rate: f64, guaranteed: bool, retention: f64) -> Simulation {
        let members = ["A", "B", "C"]
            .into_iter()
            .map(|id| Member {
                id: MemberId::new(id),
                rank: 0.0,
                retention_rate: retention,
                draw_weight: 1.0,
                flags: BTreeSet::new(),
            })
            .collect();
        let population = Population::from_members(members).unwrap();
        let identity = RunIdentity {
            name: RunName::parse("runner-test").unwrap(),
            rate_label: "custom".to_owned(),
        };
        Simulation::new(identity, population, special_rate, guaranteed, 9).unwrap()
    }

    fn cadence(interval: u64) -> CadenceConfig {
        CadenceConfig {
            milestone_interval: interval,
            checkpoint_interval: interval,
            progress_interval: interval,
            estimate_interval: interval,
        }
    }

    #[derive(Default)]
    struct Recorder {
        specials: u64,
        new_retentions: Vec<MemberId>,
        milestones: Vec<u64>,
        progress_reports: u64,
        calls: Vec<&'static str>,
    }

    impl RunObserver for Recorder {
        fn on_special(&mut self, _record: &EventRecord) {
            self.specials = self.specials.saturating_add(1);
        }
        fn on_new_retention(&mut self, _simulation: &Simulation, record: &EventRecord) {
            self.new_retentions.push(record.member_id.clone());
        }
        fn on_milestone(&mut self, record: MilestoneRecord) {
            self.milestones.push(record.draw_index);
        }
        fn on_progress(&mut self, _progress: &Progress) {
            self.progress_reports = self.progress_reports.saturating_add(1);
        }
        fn flush_records(&mut self) -> usize {
            self.calls.push("flush");
            0
        }
        fn save_checkpoint(&mut self, _simulation: &Simulation) {
            self.calls.push("save");
        }
    }

    #[test]
    fn runs_until_every_member_is_retained() {
        let mut sim = simulation(1.0, true, 0.0);
        let mut observer = Recorder::default();
        let outcome = run(&mut sim, &mut observer, &StopSignal::new(), &cadence(1_000)).unwrap();

        assert_eq!(outcome.end_reason, EndReason::Completed);
        assert!(sim.is_complete());
        assert_eq!(observer.new_retentions.len(), 3);
        // Every draw is special at rate 1.
        assert_eq!(observer.specials, outcome.total_draws);
        assert_eq!(outcome.session_draws, outcome.total_draws);
    }

    #[test]
    fn stop_before_first_draw_is_interrupted() {
        let mut sim = simulation(0.01, false, 0.5);
        let stop = StopSignal::new();
        stop.request_stop();
        let mut observer = Recorder::default();
        let outcome = run(&mut sim, &mut observer, &stop, &cadence(10)).unwrap();

        assert_eq!(outcome.end_reason, EndReason::Interrupted);
        assert_eq!(outcome.session_draws, 0);
        // The graceful path still flushes then saves.
        assert_eq!(observer.calls, vec!["flush", "save"]);
    }

    #[test]
    fn stop_from_observer_ends_after_current_draw() {
        struct StopAt {
            stop: StopSignal,
            at: u64,
        }
        impl RunObserver for StopAt {
            fn on_milestone(&mut self, record: MilestoneRecord) {
                if record.draw_index >= self.at {
                    self.stop.request_stop();
                }
            }
        }

        let mut sim = simulation(1e-6, false, 0.5);
        let stop = StopSignal::new();
        let mut observer = StopAt {
            stop: stop.clone(),
            at: 50,
        };
        let outcome = run(&mut sim, &mut observer, &stop, &cadence(10)).unwrap();
        assert_eq!(outcome.end_reason, EndReason::Interrupted);
        assert_eq!(outcome.total_draws, 50);
    }

    #[test]
    fn hooks_fire_on_cadence_and_flush_precedes_save() {
        let mut sim = simulation(1e-6, false, 0.5);
        let stop = StopSignal::new();

        struct Bounded {
            inner: Recorder,
            stop: StopSignal,
        }
        impl RunObserver for Bounded {
            fn on_milestone(&mut self, record: MilestoneRecord) {
                if record.draw_index >= 30 {
                    self.stop.request_stop();
                }
                self.inner.on_milestone(record);
            }
            fn on_progress(&mut self, progress: &Progress) {
                self.inner.on_progress(progress);
            }
            fn flush_records(&mut self) -> usize {
                self.inner.flush_records()
            }
            fn save_checkpoint(&mut self, simulation: &Simulation) {
                self.inner.save_checkpoint(simulation);
            }
        }

        let mut observer = Bounded {
            inner: Recorder::default(),
            stop: stop.clone(),
        };
        let _ = run(&mut sim, &mut observer, &stop, &cadence(10)).unwrap();

        assert_eq!(observer.inner.milestones, vec![10, 20, 30]);
        assert_eq!(observer.inner.progress_reports, 3);
        // Three interval checkpoints plus the final one.
        assert_eq!(
            observer.inner.calls,
            vec!["flush", "save", "flush", "save", "flush", "save", "flush", "save"]
        );
    }

    #[test]
    fn complete_simulation_returns_immediately() {
        let mut sim = simulation(1.0, true, 0.0);
        let _ = run(&mut sim, &mut NoOpObserver, &StopSignal::new(), &cadence(1_000)).unwrap();
        let again = run(&mut sim, &mut NoOpObserver, &StopSignal::new(), &cadence(1_000)).unwrap();
        assert_eq!(again.end_reason, EndReason::Completed);
        assert_eq!(again.session_draws, 0);
    }

    #[test]
    fn failed_draw_flushes_without_checkpoint() {
        let sim = simulation(0.5, false, 0.5);
        // Counters already at the ceiling: the next draw overflows.
        let mut state = sim.state().clone();
        state.draw_count = u64::MAX;
        state.ordinary_seen = u64::MAX;
        let mut sim = Simulation::restore(
            sim.identity().clone(),
            sim.population().clone(),
            state,
            sim.rng_position(),
            None,
        )
        .unwrap();

        let mut observer = Recorder::default();
        let result = run(&mut sim, &mut observer, &StopSignal::new(), &cadence(10));

        assert!(matches!(
            result,
            Err(RunnerError::Encounter {
                source: EncounterError::CounterOverflow { .. }
            })
        ));
        assert_eq!(observer.calls, vec!["flush"]);
        assert_eq!(sim.state().draw_count, u64::MAX);
    }
}
