//! Cumulative run clock spanning process lifetimes.
//!
//! A run may be paused and resumed many times. Elapsed time is therefore
//! split in two: seconds accumulated by earlier sessions (restored from
//! the checkpoint) and the current session's monotonic timer, started
//! when the session begins. Every duration the simulation reports is the
//! sum of the two.
//!
//! # Design Principles
//!
//! - The prior total is never mutated while a session is running; it is
//!   only folded forward when a checkpoint is written.
//! - Rates derived from the clock use the cumulative total, so a resumed
//!   run reports throughput for the whole run, not the last session.

use std::time::{Duration, Instant};

/// Elapsed-time accounting for one session of a run.
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    /// Seconds accumulated by all previous sessions.
    prior_seconds: f64,

    /// Start of the current session.
    started: Instant,
}

impl SessionClock {
    /// Start a session on top of `prior_seconds` from earlier sessions.
    ///
    /// Negative or non-finite priors (only possible from a hand-edited
    /// checkpoint) are treated as zero.
    pub fn start(prior_seconds: f64) -> Self {
        Self {
            prior_seconds: sanitize(prior_seconds),
            started: Instant::now(),
        }
    }

    /// Seconds accumulated before this session began.
    pub const fn prior_seconds(&self) -> f64 {
        self.prior_seconds
    }

    /// Wall-clock time spent in the current session.
    pub fn session_elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Total seconds across every session, including the current one.
    pub fn total_elapsed_seconds(&self) -> f64 {
        self.prior_seconds + self.session_elapsed().as_secs_f64()
    }
}

/// `count / seconds`, or `0.0` when `seconds` is not positive.
#[allow(clippy::cast_precision_loss)]
pub fn per_second(count: u64, seconds: f64) -> f64 {
    if seconds > 0.0 {
        count as f64 / seconds
    } else {
        0.0
    }
}

fn sanitize(seconds: f64) -> f64 {
    if seconds.is_finite() && seconds > 0.0 {
        seconds
    } else {
        0.0
    }
}
