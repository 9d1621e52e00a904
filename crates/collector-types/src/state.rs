//! The single mutable aggregate of a simulation run.
//!
//! [`RunState`] holds every counter and set the encounter loop touches.
//! It is owned by the running simulation, borrowed by the checkpoint
//! writer, and replaced wholesale when a checkpoint is restored. Nothing
//! else mutates it.
//!
//! Sets and maps are `BTree*` so the serialized checkpoint is stable and
//! diffable between saves.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::ids::MemberId;

/// Cumulative state of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    /// Number of draws performed so far. Monotonic.
    pub draw_count: u64,
    /// Draws classified as special.
    pub special_seen: u64,
    /// Special draws whose retention trial succeeded.
    pub special_retained: u64,
    /// Special draws whose retention trial failed.
    pub special_missed: u64,
    /// Draws classified as ordinary.
    pub ordinary_seen: u64,
    /// Members retained at least once. Termination when this covers the population.
    pub retained_set: BTreeSet<MemberId>,
    /// Members seen in ordinary draws (coverage reporting only).
    pub ordinary_seen_set: BTreeSet<MemberId>,
    /// Successful retentions per member.
    pub per_member_retained_counts: BTreeMap<MemberId, u64>,
    /// Ordinary draws per member.
    pub per_member_ordinary_counts: BTreeMap<MemberId, u64>,
    /// Wall-clock seconds accumulated by all previous sessions of this run.
    pub elapsed_seconds_prior: f64,
    /// Per-draw probability of a special classification. Fixed for the run.
    pub special_rate: f64,
    /// Whether every special draw is retained. Fixed for the run.
    pub guaranteed_retention: bool,
}

/// A broken relationship between the counters of a [`RunState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CounterViolation {
    /// `special_seen != special_retained + special_missed`.
    SpecialSplit {
        /// Recorded special draws.
        seen: u64,
        /// Recorded retentions.
        retained: u64,
        /// Recorded misses.
        missed: u64,
    },
    /// `special_seen + ordinary_seen != draw_count`.
    DrawSplit {
        /// Recorded draws.
        draws: u64,
        /// Recorded special draws.
        special: u64,
        /// Recorded ordinary draws.
        ordinary: u64,
    },
    /// A member's ordinary plus retained count exceeds the draw count.
    MemberExceedsDraws {
        /// The offending member.
        member: MemberId,
        /// Its ordinary plus retained count.
        total: u64,
    },
    /// A retained member has no retention count, or a counted one is not retained.
    RetainedSetMismatch {
        /// The offending member.
        member: MemberId,
    },
}

impl RunState {
    /// Create a fresh run state with every counter at zero.
    pub const fn new(special_rate: f64, guaranteed_retention: bool) -> Self {
        Self {
            draw_count: 0,
            special_seen: 0,
            special_retained: 0,
            special_missed: 0,
            ordinary_seen: 0,
            retained_set: BTreeSet::new(),
            ordinary_seen_set: BTreeSet::new(),
            per_member_retained_counts: BTreeMap::new(),
            per_member_ordinary_counts: BTreeMap::new(),
            elapsed_seconds_prior: 0.0,
            special_rate,
            guaranteed_retention,
        }
    }

    /// Number of distinct members retained so far.
    pub fn unique_retained(&self) -> usize {
        self.retained_set.len()
    }

    /// Number of distinct members seen in ordinary draws.
    pub fn unique_ordinary(&self) -> usize {
        self.ordinary_seen_set.len()
    }

    /// Whether the termination predicate holds for a population of the given size.
    pub fn is_complete(&self, population_size: usize) -> bool {
        self.retained_set.len() >= population_size
    }

    /// Whether the member has been retained at least once.
    pub fn is_retained(&self, id: &str) -> bool {
        self.retained_set.contains(id)
    }

    /// Check the arithmetic relationships between the counters.
    ///
    /// Returns every violation found; an empty vector means the state is
    /// internally consistent. Used to reject damaged checkpoints.
    pub fn counter_violations(&self) -> Vec<CounterViolation> {
        let mut violations = Vec::new();

        if self.special_retained.checked_add(self.special_missed) != Some(self.special_seen) {
            violations.push(CounterViolation::SpecialSplit {
                seen: self.special_seen,
                retained: self.special_retained,
                missed: self.special_missed,
            });
        }

        if self.special_seen.checked_add(self.ordinary_seen) != Some(self.draw_count) {
            violations.push(CounterViolation::DrawSplit {
                draws: self.draw_count,
                special: self.special_seen,
                ordinary: self.ordinary_seen,
            });
        }

        let members: BTreeSet<&MemberId> = self
            .per_member_ordinary_counts
            .keys()
            .chain(self.per_member_retained_counts.keys())
            .collect();
        for member in members {
            let ordinary = self
                .per_member_ordinary_counts
                .get(member)
                .copied()
                .unwrap_or(0);
            let retained = self
                .per_member_retained_counts
                .get(member)
                .copied()
                .unwrap_or(0);
            let total = ordinary.saturating_add(retained);
            if total > self.draw_count {
                violations.push(CounterViolation::MemberExceedsDraws {
                    member: member.clone(),
                    total,
                });
            }
        }

        for member in &self.retained_set {
            if self
                .per_member_retained_counts
                .get(member)
                .is_none_or(|count| *count == 0)
            {
                violations.push(CounterViolation::RetainedSetMismatch {
                    member: member.clone(),
                });
            }
        }
        for (member, count) in &self.per_member_retained_counts {
            if *count > 0 && !self.retained_set.contains(member) {
                violations.push(CounterViolation::RetainedSetMismatch {
                    member: member.clone(),
                });
            }
        }

        violations
    }
}
