//! Final run statistics.
//!
//! A [`RunReport`] is computed from the simulation at the end of every
//! session, whether the run completed or was interrupted. It is plain
//! serializable data; the binary logs it and writes it next to the
//! checkpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::per_second;
use crate::operator::EndReason;
use crate::simulation::Simulation;

/// How close the initial prediction came to the actual draw count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionAccuracy {
    /// Expected total draws predicted when the run started.
    pub predicted_draws: f64,
    /// Actual total draws.
    pub actual_draws: u64,
    /// `actual - predicted`.
    pub difference: f64,
    /// `difference / predicted * 100`.
    pub difference_percent: f64,
}

/// Summary statistics for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Run name.
    pub run_name: String,
    /// `complete` or `incomplete`.
    pub status: String,
    /// Why the last session ended.
    pub end_reason: EndReason,
    /// Special-rate label.
    pub rate_label: String,
    /// Whether every special draw was retained.
    pub guaranteed_retention: bool,
    /// Total draws across all sessions.
    pub total_draws: u64,
    /// Total elapsed seconds across all sessions.
    pub elapsed_seconds: f64,
    /// Average draws per second.
    pub draws_per_second: f64,
    /// Average successful retentions per second.
    pub retained_per_second: f64,
    /// Special draws.
    pub special_seen: u64,
    /// Successful retentions.
    pub special_retained: u64,
    /// Failed retentions.
    pub special_missed: u64,
    /// `special_retained / special_seen * 100`.
    pub retention_success_percent: f64,
    /// Configured per-draw special probability.
    pub configured_special_rate: f64,
    /// `special_seen / total_draws`.
    pub observed_special_rate: f64,
    /// Deviation of observed special draws from the expected count, in percent.
    pub special_variance_percent: f64,
    /// Members retained at least once.
    pub unique_retained: usize,
    /// Members seen in ordinary draws.
    pub unique_ordinary: usize,
    /// Population size.
    pub population_size: usize,
    /// Expected additional draws at the end of the session, when reachable.
    pub expected_remaining_draws: Option<f64>,
    /// Accuracy of the initial prediction, when one exists.
    pub prediction: Option<PredictionAccuracy>,
    /// When the report was produced.
    pub generated_at: DateTime<Utc>,
}

impl RunReport {
    /// Compute the report for the simulation's current state.
    #[allow(clippy::cast_precision_loss)]
    pub fn from_simulation(simulation: &Simulation, end_reason: EndReason) -> Self {
        let state = simulation.state();
        let elapsed = simulation.elapsed_seconds();
        let draws = state.draw_count as f64;

        let retention_success_percent = percent(state.special_retained, state.special_seen);
        let observed_special_rate = if state.draw_count > 0 {
            state.special_seen as f64 / draws
        } else {
            0.0
        };
        let expected_specials = draws * state.special_rate;
        let special_variance_percent = if expected_specials > 0.0 {
            (state.special_seen as f64 - expected_specials) / expected_specials * 100.0
        } else {
            0.0
        };

        let prediction = simulation
            .initial_prediction()
            .filter(|predicted| *predicted > 0.0)
            .map(|predicted| {
                let difference = draws - predicted;
                PredictionAccuracy {
                    predicted_draws: predicted,
                    actual_draws: state.draw_count,
                    difference,
                    difference_percent: difference / predicted * 100.0,
                }
            });

        let status = if simulation.is_complete() {
            EndReason::Completed.status()
        } else {
            EndReason::Interrupted.status()
        };

        Self {
            run_name: simulation.identity().name.to_string(),
            status: status.to_owned(),
            end_reason,
            rate_label: simulation.identity().rate_label.clone(),
            guaranteed_retention: state.guaranteed_retention,
            total_draws: state.draw_count,
            elapsed_seconds: elapsed,
            draws_per_second: per_second(state.draw_count, elapsed),
            retained_per_second: per_second(state.special_retained, elapsed),
            special_seen: state.special_seen,
            special_retained: state.special_retained,
            special_missed: state.special_missed,
            retention_success_percent,
            configured_special_rate: state.special_rate,
            observed_special_rate,
            special_variance_percent,
            unique_retained: state.unique_retained(),
            unique_ordinary: state.unique_ordinary(),
            population_size: simulation.population().len(),
            expected_remaining_draws: simulation.estimate().expected_draws(),
            prediction,
            generated_at: Utc::now(),
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}
