//! Encounter engine: classify one draw and apply it to the run state.
//!
//! A draw moves through a small state machine:
//!
//! ```text
//! Drawn -> Ordinary
//!       -> Special -> Retained (new)
//!                  -> Retained (repeat)
//!                  -> Missed
//! ```
//!
//! The special classification and the retention trial are two independent
//! random trials. Only a successful retention adds the member to the
//! retained set; a missed special never counts toward coverage.
//!
//! Every mutation of [`RunState`] is computed with checked arithmetic
//! before anything is written, so a failed draw leaves the state exactly
//! as it was.

use collector_types::{EventRecord, Member, MemberId, RunState};
use rand::Rng;

use crate::population::Population;
use crate::sampler::WeightedSampler;

/// Errors raised while applying a draw. All of them abort the run.
#[derive(Debug, thiserror::Error)]
pub enum EncounterError {
    /// The configured special rate is not a probability.
    #[error("special rate must be within [0, 1], got {rate}")]
    InvalidSpecialRate {
        /// The rejected rate.
        rate: f64,
    },

    /// A member's retention rate is not a probability.
    #[error("retention rate for `{member}` is outside [0, 1]: {rate}")]
    InvalidRetentionRate {
        /// The offending member.
        member: MemberId,
        /// The rejected rate.
        rate: f64,
    },

    /// The sampler returned a position outside the population.
    #[error("sampled position {index} is outside a population of {len}")]
    MemberOutOfRange {
        /// The sampled position.
        index: usize,
        /// Population size.
        len: usize,
    },

    /// A counter would exceed `u64::MAX`.
    #[error("counter overflow: {counter}")]
    CounterOverflow {
        /// Name of the counter.
        counter: &'static str,
    },
}

/// Result of the retention trial on a special draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    /// Retained, and this is the member's first retention.
    New,
    /// Retained, but the member was already covered.
    Repeat,
    /// The retention trial failed.
    Missed,
}

impl Retention {
    /// Whether the retention trial succeeded.
    pub const fn succeeded(self) -> bool {
        matches!(self, Self::New | Self::Repeat)
    }
}

/// Outcome of one draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawOutcome {
    /// An ordinary draw. Nothing is logged.
    Ordinary {
        /// Population position of the drawn member.
        index: usize,
    },
    /// A special draw, with the record to append to the event log.
    Special {
        /// Population position of the drawn member.
        index: usize,
        /// What happened on the retention trial.
        retention: Retention,
        /// Event-log record for this draw.
        record: EventRecord,
    },
}

impl DrawOutcome {
    /// Whether this draw retained a member for the first time.
    pub const fn is_new_retention(&self) -> bool {
        matches!(
            self,
            Self::Special {
                retention: Retention::New,
                ..
            }
        )
    }
}

/// Perform one full draw: sample, classify, trial, and apply.
///
/// Random numbers are consumed in a fixed order (member, special trial,
/// retention trial) so a seeded generator reproduces the run exactly.
///
/// # Errors
///
/// Returns [`EncounterError`] on an invalid rate, an out-of-range sample,
/// or counter overflow. The state is left unchanged on error.
pub fn encounter<R: Rng + ?Sized>(
    state: &mut RunState,
    population: &Population,
    sampler: &WeightedSampler,
    rng: &mut R,
) -> Result<DrawOutcome, EncounterError> {
    let index = sampler.draw(rng);
    let member = population
        .get(index)
        .ok_or(EncounterError::MemberOutOfRange {
            index,
            len: population.len(),
        })?;

    if !is_special(rng, state.special_rate)? {
        apply_ordinary(state, &member.id)?;
        return Ok(DrawOutcome::Ordinary { index });
    }

    let retained = attempt_retention(rng, member, state.guaranteed_retention)?;
    let (retention, record) = apply_special(state, &member.id, retained)?;
    Ok(DrawOutcome::Special {
        index,
        retention,
        record,
    })
}

/// Bernoulli trial for the special classification.
///
/// # Errors
///
/// Returns [`EncounterError::InvalidSpecialRate`] if `special_rate` is not
/// a probability.
pub fn is_special<R: Rng + ?Sized>(rng: &mut R, special_rate: f64) -> Result<bool, EncounterError> {
    if !(0.0..=1.0).contains(&special_rate) {
        return Err(EncounterError::InvalidSpecialRate { rate: special_rate });
    }
    Ok(rng.random_bool(special_rate))
}

/// Retention trial for a special draw of `member`.
///
/// # Errors
///
/// Returns [`EncounterError::InvalidRetentionRate`] if the member's rate is
/// outside `[0, 1]`, even when retention is guaranteed. Bad data fails fast
/// rather than being clamped.
pub fn attempt_retention<R: Rng + ?Sized>(
    rng: &mut R,
    member: &Member,
    guaranteed_retention: bool,
) -> Result<bool, EncounterError> {
    let probability = member.effective_retention(guaranteed_retention).ok_or_else(|| {
        EncounterError::InvalidRetentionRate {
            member: member.id.clone(),
            rate: member.retention_rate,
        }
    })?;
    Ok(rng.random_bool(probability))
}

/// Apply an ordinary draw of `id` to the state.
///
/// # Errors
///
/// Returns [`EncounterError::CounterOverflow`] if any counter would overflow.
pub fn apply_ordinary(state: &mut RunState, id: &MemberId) -> Result<(), EncounterError> {
    let draw_count = bump(state.draw_count, "draw_count")?;
    let ordinary_seen = bump(state.ordinary_seen, "ordinary_seen")?;
    let member_count = bump(
        state.per_member_ordinary_counts.get(id).copied().unwrap_or(0),
        "per_member_ordinary_counts",
    )?;

    state.draw_count = draw_count;
    state.ordinary_seen = ordinary_seen;
    state.per_member_ordinary_counts.insert(id.clone(), member_count);
    if !state.ordinary_seen_set.contains(id) {
        state.ordinary_seen_set.insert(id.clone());
    }
    Ok(())
}

/// Apply a special draw of `id` whose retention trial returned `retained`.
///
/// Returns the retention classification and the event record to log.
///
/// # Errors
///
/// Returns [`EncounterError::CounterOverflow`] if any counter would overflow.
pub fn apply_special(
    state: &mut RunState,
    id: &MemberId,
    retained: bool,
) -> Result<(Retention, EventRecord), EncounterError> {
    let draw_count = bump(state.draw_count, "draw_count")?;
    let special_seen = bump(state.special_seen, "special_seen")?;

    let retention = if !retained {
        state.special_missed = bump(state.special_missed, "special_missed")?;
        Retention::Missed
    } else {
        let special_retained = bump(state.special_retained, "special_retained")?;
        let member_count = bump(
            state.per_member_retained_counts.get(id).copied().unwrap_or(0),
            "per_member_retained_counts",
        )?;
        state.special_retained = special_retained;
        state.per_member_retained_counts.insert(id.clone(), member_count);
        if state.retained_set.insert(id.clone()) {
            Retention::New
        } else {
            Retention::Repeat
        }
    };

    state.draw_count = draw_count;
    state.special_seen = special_seen;

    let record = EventRecord {
        draw_index: draw_count,
        member_id: id.clone(),
        retained,
        first_retention: retention == Retention::New,
    };
    Ok((retention, record))
}

fn bump(value: u64, counter: &'static str) -> Result<u64, EncounterError> {
    value
        .checked_add(1)
        .ok_or(EncounterError::CounterOverflow { counter })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeSet;

    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn member(id: &str, retention_rate: f64) -> Member {
        Member {
            id: MemberId::new(id),
            rank: 300.0,
            retention_rate,
            draw_weight: 1.0,
            flags: BTreeSet::new(),
        }
    }

    fn setup(members: Vec<Member>) -> (Population, WeightedSampler) {
        let pop = Population::from_members(members).unwrap();
        let sampler = WeightedSampler::new(&pop).unwrap();
        (pop, sampler)
    }

    #[test]
    fn ordinary_draw_updates_coverage_counters() {
        let mut state = RunState::new(0.5, false);
        let id = MemberId::new("Rattata");
        apply_ordinary(&mut state, &id).unwrap();
        apply_ordinary(&mut state, &id).unwrap();

        assert_eq!(state.draw_count, 2);
        assert_eq!(state.ordinary_seen, 2);
        assert_eq!(state.per_member_ordinary_counts.get(&id), Some(&2));
        assert_eq!(state.unique_ordinary(), 1);
        assert!(state.retained_set.is_empty());
    }

    #[test]
    fn first_retention_is_new_then_repeat() {
        let mut state = RunState::new(0.5, false);
        let id = MemberId::new("Pikachu");

        let (first, record) = apply_special(&mut state, &id, true).unwrap();
        assert_eq!(first, Retention::New);
        assert!(record.first_retention);
        assert_eq!(record.draw_index, 1);

        let (second, record) = apply_special(&mut state, &id, true).unwrap();
        assert_eq!(second, Retention::Repeat);
        assert!(!record.first_retention);
        assert_eq!(record.draw_index, 2);

        assert_eq!(state.special_retained, 2);
        assert_eq!(state.per_member_retained_counts.get(&id), Some(&2));
        assert_eq!(state.unique_retained(), 1);
    }

    #[test]
    fn missed_special_does_not_cover_member() {
        let mut state = RunState::new(0.5, false);
        let id = MemberId::new("Abra");
        let (retention, record) = apply_special(&mut state, &id, false).unwrap();

        assert_eq!(retention, Retention::Missed);
        assert!(!record.retained);
        assert_eq!(state.special_seen, 1);
        assert_eq!(state.special_missed, 1);
        assert!(!state.is_retained("Abra"));
        assert!(state.per_member_retained_counts.is_empty());
    }

    #[test]
    fn overflow_leaves_state_untouched() {
        let mut state = RunState::new(0.5, false);
        state.draw_count = u64::MAX;
        let before = state.clone();
        let err = apply_ordinary(&mut state, &MemberId::new("Onix")).unwrap_err();
        assert!(matches!(err, EncounterError::CounterOverflow { counter: "draw_count" }));
        assert_eq!(state, before);
    }

    #[test]
    fn rate_one_and_guaranteed_retention_always_retains() {
        let (pop, sampler) = setup(vec![member("Magikarp", 0.0)]);
        let mut state = RunState::new(1.0, true);
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        let outcome = encounter(&mut state, &pop, &sampler, &mut rng).unwrap();
        assert!(outcome.is_new_retention());
        assert!(state.is_complete(pop.len()));
    }

    #[test]
    fn zero_retention_never_retains() {
        let (pop, sampler) = setup(vec![member("Shedinja", 0.0)]);
        let mut state = RunState::new(1.0, false);
        let mut rng = ChaCha8Rng::seed_from_u64(11);

        for _ in 0..500 {
            let outcome = encounter(&mut state, &pop, &sampler, &mut rng).unwrap();
            assert!(matches!(
                outcome,
                DrawOutcome::Special {
                    retention: Retention::Missed,
                    ..
                }
            ));
        }
        assert_eq!(state.special_missed, 500);
        assert!(state.retained_set.is_empty());
    }

    #[test]
    fn bad_retention_rate_fails_fast() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let err = attempt_retention(&mut rng, &member("Glitch", 1.2), true).unwrap_err();
        assert!(matches!(err, EncounterError::InvalidRetentionRate { .. }));
    }

    #[test]
    fn bad_special_rate_fails_fast() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(matches!(
            is_special(&mut rng, 1.5),
            Err(EncounterError::InvalidSpecialRate { .. })
        ));
    }

    #[test]
    fn counters_stay_consistent_over_many_draws() {
        let (pop, sampler) = setup(vec![
            member("A", 0.3),
            member("B", 0.6),
            member("C", 0.9),
        ]);
        let mut state = RunState::new(0.1, false);
        let mut rng = ChaCha8Rng::seed_from_u64(2024);

        let mut covered = 0;
        for _ in 0..20_000 {
            let _ = encounter(&mut state, &pop, &sampler, &mut rng).unwrap();
            // Coverage never regresses.
            assert!(state.unique_retained() >= covered);
            covered = state.unique_retained();
        }

        assert_eq!(state.draw_count, 20_000);
        assert!(state.counter_violations().is_empty());
    }
}
