//! Completion estimator: a weighted coupon-collector expectation.
//!
//! For every member not yet retained, the per-draw probability of a
//! **new** retention is
//!
//! ```text
//! p_i = (draw_weight_i / total_weight) * effective_retention_i * special_rate
//! ```
//!
//! The expected number of additional draws is accumulated by repeatedly
//! taking the reciprocal of the remaining probability mass `S` and then
//! removing the largest remaining `p_i`:
//!
//! ```text
//! total = 0
//! while members remain:
//!     total += 1 / S
//!     S -= max(p_i); remove it
//! ```
//!
//! Sorting once makes this `O(M log M)`. If `S` reaches zero while members
//! remain, the result is [`CompletionEstimate::Unreachable`].

use collector_types::{MemberId, RunState};
use serde::{Deserialize, Serialize};

use crate::population::Population;

/// Expected additional draws until every member is retained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompletionEstimate {
    /// Finite expectation. Zero once every member is retained.
    Expected {
        /// Expected additional draws.
        draws: f64,
    },
    /// Some remaining member can never be retained.
    Unreachable {
        /// Members whose new-retention probability is zero.
        members: Vec<MemberId>,
    },
}

impl CompletionEstimate {
    /// Finite expected draws, or `None` when unreachable.
    pub const fn expected_draws(&self) -> Option<f64> {
        match self {
            Self::Expected { draws } => Some(*draws),
            Self::Unreachable { .. } => None,
        }
    }

    /// Expected seconds remaining at `draws_per_second`, or `None` when
    /// unreachable or no rate is known yet.
    pub fn eta_seconds(&self, draws_per_second: f64) -> Option<f64> {
        let draws = self.expected_draws()?;
        (draws_per_second > 0.0).then(|| draws / draws_per_second)
    }
}

/// Per-member new-retention probabilities for one run configuration.
///
/// Built once per session; the probabilities depend only on the population
/// and the run's fixed rates, so each estimate only has to filter out the
/// retained members.
#[derive(Debug, Clone)]
pub struct CompletionEstimator {
    probabilities: Vec<(MemberId, f64)>,
}

impl CompletionEstimator {
    /// Compute `p_i` for every member of the population.
    ///
    /// Members with an unusable retention rate get `p_i = 0` and therefore
    /// surface as unreachable rather than being silently dropped.
    pub fn new(population: &Population, special_rate: f64, guaranteed_retention: bool) -> Self {
        let mut probabilities: Vec<(MemberId, f64)> = population
            .members()
            .iter()
            .map(|member| {
                let retention = member.effective_retention(guaranteed_retention).unwrap_or(0.0);
                let p = population.selection_probability(member) * retention * special_rate;
                (member.id.clone(), if p.is_finite() { p } else { 0.0 })
            })
            .collect();
        // Descending by probability; ties broken by id so results are stable.
        probabilities.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Self { probabilities }
    }

    /// New-retention probability of the given member, if present.
    pub fn probability(&self, id: &str) -> Option<f64> {
        self.probabilities
            .iter()
            .find(|(member, _)| member.as_str() == id)
            .map(|(_, p)| *p)
    }

    /// Expected additional draws given the current retained set.
    pub fn estimate(&self, state: &RunState) -> CompletionEstimate {
        let remaining: Vec<(&MemberId, f64)> = self
            .probabilities
            .iter()
            .filter(|(id, _)| !state.retained_set.contains(id))
            .map(|(id, p)| (id, *p))
            .collect();

        let unreachable: Vec<MemberId> = remaining
            .iter()
            .filter(|(_, p)| *p <= 0.0)
            .map(|(id, _)| (*id).clone())
            .collect();
        if !unreachable.is_empty() {
            return CompletionEstimate::Unreachable {
                members: unreachable,
            };
        }

        // Summing from the smallest upward gives each suffix mass without
        // the cancellation error of repeated subtraction.
        let mut mass = 0.0_f64;
        let mut draws = 0.0_f64;
        for (_, p) in remaining.iter().rev() {
            mass += p;
            draws += 1.0 / mass;
        }
        CompletionEstimate::Expected { draws }
    }
}
