//! Population member: the static attributes of one collectible entry.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::ids::MemberId;

/// One entry of the population.
///
/// Members are created once by the population loader and never mutated
/// during a run. `draw_weight` is derived from `rank` at load time:
///
/// ```text
/// draw_weight = 1 / (rank + stability_constant) ^ rarity_exponent
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    /// Unique, stable identifier.
    pub id: MemberId,
    /// Non-negative aggregate strength score. Higher ranks are drawn less often.
    pub rank: f64,
    /// Base probability in `[0, 1]` that a special draw of this member is retained.
    pub retention_rate: f64,
    /// Relative draw weight, strictly positive.
    pub draw_weight: f64,
    /// Category flags set in the source data (reporting only).
    #[serde(default)]
    pub flags: BTreeSet<String>,
}

impl Member {
    /// Probability that a special draw of this member is retained.
    ///
    /// Returns `None` if the stored retention rate is outside `[0, 1]` or
    /// not finite. The loader rejects such values, so `None` here means the
    /// member was constructed by hand with bad data.
    pub fn effective_retention(&self, guaranteed_retention: bool) -> Option<f64> {
        if !self.retention_rate.is_finite() || !(0.0..=1.0).contains(&self.retention_rate) {
            return None;
        }
        if guaranteed_retention {
            Some(1.0)
        } else {
            Some(self.retention_rate)
        }
    }

    /// Whether the member carries the given category flag.
    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(retention_rate: f64) -> Member {
        Member {
            id: MemberId::new("Ditto"),
            rank: 288.0,
            retention_rate,
            draw_weight: 1.0,
            flags: BTreeSet::new(),
        }
    }

    #[test]
    fn guaranteed_retention_overrides_rate() {
        assert_eq!(member(0.2).effective_retention(true), Some(1.0));
        assert_eq!(member(0.2).effective_retention(false), Some(0.2));
    }

    #[test]
    fn out_of_range_rate_is_rejected_even_when_guaranteed() {
        assert_eq!(member(1.5).effective_retention(true), None);
        assert_eq!(member(-0.1).effective_retention(false), None);
        assert_eq!(member(f64::NAN).effective_retention(false), None);
    }
}
