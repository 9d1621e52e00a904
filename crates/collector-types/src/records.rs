//! Append-only log records emitted by the encounter loop.
//!
//! Both record kinds are immutable once created. They are buffered in
//! memory by the event logger and flushed to their own durable log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::MemberId;

/// One special draw.
///
/// Ordinary draws never produce an `EventRecord`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// 1-based draw index at which the special occurred.
    pub draw_index: u64,
    /// The member that was drawn.
    pub member_id: MemberId,
    /// Whether the retention trial succeeded.
    pub retained: bool,
    /// Whether this was the member's first-ever successful retention.
    pub first_retention: bool,
}

/// Snapshot of cumulative counters taken every milestone interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneRecord {
    /// Draw index the milestone was taken at.
    pub draw_index: u64,
    /// Wall-clock time the milestone was taken.
    pub timestamp: DateTime<Utc>,
    /// Cumulative special draws.
    pub special_seen: u64,
    /// Cumulative successful retentions.
    pub special_retained: u64,
    /// Cumulative failed retentions.
    pub special_missed: u64,
    /// Distinct members retained at least once.
    pub unique_retained: u64,
    /// Distinct members seen in ordinary draws.
    pub unique_ordinary: u64,
    /// Draws per second over the whole run (all sessions).
    pub draws_per_second: f64,
    /// Successful retentions per second over the whole run.
    pub retained_per_second: f64,
    /// Total elapsed seconds across all sessions.
    pub elapsed_seconds: f64,
}
