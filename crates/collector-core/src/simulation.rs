//! A running simulation: population, sampler, state, and random stream.
//!
//! [`Simulation`] owns everything the draw loop touches. It is created
//! either fresh (all counters zero, generator at the start of its stream)
//! or restored from checkpointed parts. Restoring re-seeds the generator
//! and moves it to the saved word position, so a resumed run continues
//! the exact random sequence it would have produced uninterrupted.

use chrono::Utc;
use collector_types::{MemberId, MilestoneRecord, RunName, RunState};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::clock::{SessionClock, per_second};
use crate::encounter::{self, DrawOutcome, EncounterError};
use crate::estimator::{CompletionEstimate, CompletionEstimator};
use crate::population::Population;
use crate::sampler::{SamplerError, WeightedSampler};

/// Errors raised while assembling a simulation.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// The population cannot be sampled.
    #[error("sampler error: {source}")]
    Sampler {
        /// The underlying sampler error.
        #[from]
        source: SamplerError,
    },

    /// The special rate is not in `(0, 1]`.
    #[error("special rate must be within (0, 1], got {rate}")]
    InvalidSpecialRate {
        /// The rejected rate.
        rate: f64,
    },

    /// Restored state refers to a member that is not in the population.
    #[error("restored state references unknown member `{id}`")]
    UnknownMember {
        /// The unknown id.
        id: MemberId,
    },
}

/// Position of the run's random generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RngPosition {
    /// Seed the generator was created from.
    pub seed: u64,
    /// Number of 32-bit words consumed from the stream.
    pub word_pos: u128,
}

/// Identity of a run, carried into checkpoints and reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunIdentity {
    /// Run name.
    pub name: RunName,
    /// Label of the special rate (preset name or `custom(p)`).
    pub rate_label: String,
}

/// Snapshot of the values a progress report displays.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    /// Draws performed so far.
    pub draws: u64,
    /// Draws per second over the whole run.
    pub draws_per_second: f64,
    /// Successful retentions per second over the whole run.
    pub retained_per_second: f64,
    /// Members retained at least once.
    pub unique_retained: usize,
    /// Population size.
    pub population_size: usize,
    /// Latest completion estimate.
    pub estimate: CompletionEstimate,
    /// Seconds until completion at the current rate, when known.
    pub eta_seconds: Option<f64>,
    /// Total elapsed seconds across all sessions.
    pub elapsed_seconds: f64,
}

/// Everything the draw loop owns for one session of a run.
#[derive(Debug)]
pub struct Simulation {
    identity: RunIdentity,
    population: Population,
    sampler: WeightedSampler,
    estimator: CompletionEstimator,
    state: RunState,
    rng: ChaCha8Rng,
    seed: u64,
    clock: SessionClock,
    initial_prediction: Option<f64>,
    estimate: CompletionEstimate,
}

impl Simulation {
    /// Start a fresh run.
    ///
    /// The initial prediction (expected total draws) is computed from the
    /// empty retained set and kept for the run's lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::InvalidSpecialRate`] for a rate outside
    /// `(0, 1]`, or [`SimulationError::Sampler`] if the population cannot
    /// be sampled.
    pub fn new(
        identity: RunIdentity,
        population: Population,
        special_rate: f64,
        guaranteed_retention: bool,
        seed: u64,
    ) -> Result<Self, SimulationError> {
        let state = RunState::new(special_rate, guaranteed_retention);
        let position = RngPosition { seed, word_pos: 0 };
        let mut sim = Self::assemble(identity, population, state, position, None)?;
        sim.initial_prediction = sim.estimate.expected_draws();
        Ok(sim)
    }

    /// Resume a run from checkpointed parts.
    ///
    /// The session clock restarts now on top of `state.elapsed_seconds_prior`.
    /// When the checkpoint carried no initial prediction, one is derived
    /// from the current draw count plus the expected remaining draws.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::UnknownMember`] if the state references
    /// an id outside the population, plus the errors of [`Simulation::new`].
    pub fn restore(
        identity: RunIdentity,
        population: Population,
        state: RunState,
        rng: RngPosition,
        initial_prediction: Option<f64>,
    ) -> Result<Self, SimulationError> {
        let unknown = state
            .retained_set
            .iter()
            .chain(state.ordinary_seen_set.iter())
            .chain(state.per_member_retained_counts.keys())
            .chain(state.per_member_ordinary_counts.keys())
            .find(|id| !population.contains(id.as_str()));
        if let Some(id) = unknown {
            return Err(SimulationError::UnknownMember { id: id.clone() });
        }

        let mut sim = Self::assemble(identity, population, state, rng, initial_prediction)?;
        if sim.initial_prediction.is_none() {
            sim.initial_prediction = sim.projected_total_draws();
        }
        Ok(sim)
    }

    fn assemble(
        identity: RunIdentity,
        population: Population,
        state: RunState,
        position: RngPosition,
        initial_prediction: Option<f64>,
    ) -> Result<Self, SimulationError> {
        let rate = state.special_rate;
        if !rate.is_finite() || rate <= 0.0 || rate > 1.0 {
            return Err(SimulationError::InvalidSpecialRate { rate });
        }

        let sampler = WeightedSampler::new(&population)?;
        let estimator = CompletionEstimator::new(&population, rate, state.guaranteed_retention);
        let estimate = estimator.estimate(&state);

        let mut rng = ChaCha8Rng::seed_from_u64(position.seed);
        rng.set_word_pos(position.word_pos);

        Ok(Self {
            identity,
            clock: SessionClock::start(state.elapsed_seconds_prior),
            population,
            sampler,
            estimator,
            state,
            rng,
            seed: position.seed,
            initial_prediction,
            estimate,
        })
    }

    /// Perform one draw and apply it to the run state.
    ///
    /// # Errors
    ///
    /// Returns [`EncounterError`] on an invariant violation; the state is
    /// unchanged in that case.
    pub fn draw(&mut self) -> Result<DrawOutcome, EncounterError> {
        encounter::encounter(&mut self.state, &self.population, &self.sampler, &mut self.rng)
    }

    /// Recompute the completion estimate from the live retained set.
    pub fn refresh_estimate(&mut self) -> &CompletionEstimate {
        self.estimate = self.estimator.estimate(&self.state);
        &self.estimate
    }

    /// Most recently computed completion estimate.
    pub const fn estimate(&self) -> &CompletionEstimate {
        &self.estimate
    }

    /// Draw count plus expected remaining draws, when reachable.
    #[allow(clippy::cast_precision_loss)]
    pub fn projected_total_draws(&self) -> Option<f64> {
        self.estimate
            .expected_draws()
            .map(|remaining| self.state.draw_count as f64 + remaining)
    }

    /// Whether every member has been retained at least once.
    pub fn is_complete(&self) -> bool {
        self.state.is_complete(self.population.len())
    }

    /// Members not yet retained.
    pub fn remaining(&self) -> usize {
        self.population.len().saturating_sub(self.state.unique_retained())
    }

    /// The live run state.
    pub const fn state(&self) -> &RunState {
        &self.state
    }

    /// The population being sampled.
    pub const fn population(&self) -> &Population {
        &self.population
    }

    /// Run name and rate label.
    pub const fn identity(&self) -> &RunIdentity {
        &self.identity
    }

    /// Expected total draws computed when the run started.
    pub const fn initial_prediction(&self) -> Option<f64> {
        self.initial_prediction
    }

    /// Current generator position.
    pub fn rng_position(&self) -> RngPosition {
        RngPosition {
            seed: self.seed,
            word_pos: self.rng.get_word_pos(),
        }
    }

    /// Total elapsed seconds across every session of the run.
    pub fn elapsed_seconds(&self) -> f64 {
        self.clock.total_elapsed_seconds()
    }

    /// Copy of the run state with all elapsed time folded into
    /// `elapsed_seconds_prior`, ready to be written to a checkpoint.
    pub fn checkpoint_state(&self) -> RunState {
        let mut state = self.state.clone();
        state.elapsed_seconds_prior = self.clock.total_elapsed_seconds();
        state
    }

    /// Cumulative counters and throughput at the current draw.
    pub fn milestone_record(&self) -> MilestoneRecord {
        let elapsed = self.clock.total_elapsed_seconds();
        MilestoneRecord {
            draw_index: self.state.draw_count,
            timestamp: Utc::now(),
            special_seen: self.state.special_seen,
            special_retained: self.state.special_retained,
            special_missed: self.state.special_missed,
            unique_retained: to_u64(self.state.unique_retained()),
            unique_ordinary: to_u64(self.state.unique_ordinary()),
            draws_per_second: per_second(self.state.draw_count, elapsed),
            retained_per_second: per_second(self.state.special_retained, elapsed),
            elapsed_seconds: elapsed,
        }
    }

    /// Values for a progress report.
    pub fn progress(&self) -> Progress {
        let elapsed = self.clock.total_elapsed_seconds();
        let draws_per_second = per_second(self.state.draw_count, elapsed);
        Progress {
            draws: self.state.draw_count,
            draws_per_second,
            retained_per_second: per_second(self.state.special_retained, elapsed),
            unique_retained: self.state.unique_retained(),
            population_size: self.population.len(),
            eta_seconds: self.estimate.eta_seconds(draws_per_second),
            estimate: self.estimate.clone(),
            elapsed_seconds: elapsed,
        }
    }
}

fn to_u64(value: usize) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeSet;

    use collector_types::Member;

    use super::*;

    fn identity() -> RunIdentity {
        RunIdentity {
            name: RunName::parse("test-run").unwrap(),
            rate_label: "custom(0.05)".to_owned(),
        }
    }

    fn population() -> Population {
        let members = [("A", 1.0, 0.4), ("B", 0.5, 0.8), ("C", 0.25, 0.6)]
            .into_iter()
            .map(|(id, weight, retention)| Member {
                id: MemberId::new(id),
                rank: 0.0,
                retention_rate: retention,
                draw_weight: weight,
                flags: BTreeSet::new(),
            })
            .collect();
        Population::from_members(members).unwrap()
    }

    fn without_elapsed(mut state: RunState) -> RunState {
        state.elapsed_seconds_prior = 0.0;
        state
    }

    #[test]
    fn fresh_run_has_initial_prediction() {
        let sim = Simulation::new(identity(), population(), 0.05, false, 1).unwrap();
        assert!(sim.initial_prediction().unwrap() > 0.0);
        assert_eq!(sim.remaining(), 3);
        assert_eq!(sim.rng_position().word_pos, 0);
    }

    #[test]
    fn restore_continues_identical_sequence() {
        let mut uninterrupted = Simulation::new(identity(), population(), 0.05, false, 77).unwrap();
        for _ in 0..15_000 {
            let _ = uninterrupted.draw().unwrap();
        }

        let mut first = Simulation::new(identity(), population(), 0.05, false, 77).unwrap();
        for _ in 0..10_000 {
            let _ = first.draw().unwrap();
        }
        let saved_state = first.checkpoint_state();
        let saved_rng = first.rng_position();
        let prediction = first.initial_prediction();
        drop(first);

        let mut resumed =
            Simulation::restore(identity(), population(), saved_state, saved_rng, prediction)
                .unwrap();
        for _ in 0..5_000 {
            let _ = resumed.draw().unwrap();
        }

        assert_eq!(
            without_elapsed(resumed.state().clone()),
            without_elapsed(uninterrupted.state().clone())
        );
        assert_eq!(resumed.rng_position(), uninterrupted.rng_position());
        assert_eq!(resumed.initial_prediction(), uninterrupted.initial_prediction());
    }

    #[test]
    fn restore_rejects_unknown_member() {
        let mut state = RunState::new(0.05, false);
        state.draw_count = 1;
        state.special_seen = 1;
        state.special_retained = 1;
        state.retained_set.insert(MemberId::new("Missingno"));
        state
            .per_member_retained_counts
            .insert(MemberId::new("Missingno"), 1);

        let err = Simulation::restore(
            identity(),
            population(),
            state,
            RngPosition { seed: 1, word_pos: 0 },
            None,
        )
        .unwrap_err();
        assert!(matches!(err, SimulationError::UnknownMember { .. }));
    }

    #[test]
    fn restore_keeps_prior_elapsed_time() {
        let mut state = RunState::new(0.05, false);
        state.elapsed_seconds_prior = 3_600.0;
        let sim = Simulation::restore(
            identity(),
            population(),
            state,
            RngPosition { seed: 1, word_pos: 0 },
            Some(1_000.0),
        )
        .unwrap();
        assert!(sim.elapsed_seconds() >= 3_600.0);
        assert!(sim.checkpoint_state().elapsed_seconds_prior >= 3_600.0);
        assert_eq!(sim.initial_prediction(), Some(1_000.0));
    }

    #[test]
    fn rejects_zero_special_rate() {
        let err = Simulation::new(identity(), population(), 0.0, false, 1).unwrap_err();
        assert!(matches!(err, SimulationError::InvalidSpecialRate { .. }));
    }

    #[test]
    fn milestone_snapshots_counters() {
        let mut sim = Simulation::new(identity(), population(), 0.5, true, 5).unwrap();
        for _ in 0..100 {
            let _ = sim.draw().unwrap();
        }
        let record = sim.milestone_record();
        assert_eq!(record.draw_index, 100);
        assert_eq!(record.special_seen, sim.state().special_seen);
        assert_eq!(
            record.unique_retained,
            u64::try_from(sim.state().unique_retained()).unwrap()
        );
    }
}
