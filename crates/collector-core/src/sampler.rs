//! Weighted sampler over the population.
//!
//! Each call to [`WeightedSampler::draw`] is an independent draw from the
//! full population with probability `draw_weight / total_weight`. A member
//! can be drawn again immediately after being retained.
//!
//! The cumulative weight table is built once. At construction it is
//! checked against [`Population::total_weight`] so the sampler and the
//! estimator can never disagree about the distribution they describe.

use rand::Rng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;

use crate::population::Population;

/// Relative tolerance between the sampler's table total and the population total.
const WEIGHT_TOLERANCE: f64 = 1e-9;

/// Errors that prevent a sampler from being built.
#[derive(Debug, thiserror::Error)]
pub enum SamplerError {
    /// The population holds no members.
    #[error("cannot sample from an empty population")]
    EmptyPopulation,

    /// The weights do not form a valid distribution (zero total, negative, or non-finite).
    #[error("invalid draw weights: {reason}")]
    InvalidWeights {
        /// Description from the distribution builder.
        reason: String,
    },

    /// The table total disagrees with the population's canonical total.
    #[error("sampler total weight {sampler} drifted from population total {population}")]
    WeightDrift {
        /// Total computed by the sampler.
        sampler: f64,
        /// Canonical total of the population.
        population: f64,
    },
}

/// Draws member positions according to their weights.
#[derive(Debug, Clone)]
pub struct WeightedSampler {
    index: WeightedIndex<f64>,
    total_weight: f64,
    len: usize,
}

impl WeightedSampler {
    /// Build a sampler for the given population.
    ///
    /// # Errors
    ///
    /// Returns [`SamplerError::EmptyPopulation`] for an empty population,
    /// [`SamplerError::InvalidWeights`] if the weights cannot form a
    /// distribution, and [`SamplerError::WeightDrift`] if the table total
    /// disagrees with [`Population::total_weight`].
    pub fn new(population: &Population) -> Result<Self, SamplerError> {
        if population.is_empty() {
            return Err(SamplerError::EmptyPopulation);
        }

        let weights: Vec<f64> = population.members().iter().map(|m| m.draw_weight).collect();
        let sampler_total: f64 = weights.iter().sum();
        let index = WeightedIndex::new(&weights).map_err(|err| SamplerError::InvalidWeights {
            reason: err.to_string(),
        })?;

        let population_total = population.total_weight();
        if !population_total.is_finite()
            || (sampler_total - population_total).abs() > WEIGHT_TOLERANCE * population_total
        {
            return Err(SamplerError::WeightDrift {
                sampler: sampler_total,
                population: population_total,
            });
        }

        Ok(Self {
            index,
            total_weight: population_total,
            len: weights.len(),
        })
    }

    /// Draw one member position. A single-member population always yields `0`.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        if self.len == 1 {
            return 0;
        }
        self.index.sample(rng)
    }

    /// Total weight the sampler was validated against.
    pub const fn total_weight(&self) -> f64 {
        self.total_weight
    }

    /// Number of members the sampler covers.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Always `false` for a constructed sampler.
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}
