//! Shared type definitions for the Collector simulation.
//!
//! This crate is the single source of truth for the data that flows
//! between the simulation core, the event logger, and the checkpoint
//! store. It contains no I/O and no randomness.
//!
//! # Modules
//!
//! - [`ids`] -- String newtypes for member ids and run names
//! - [`member`] -- Static attributes of one population member
//! - [`records`] -- Append-only event and milestone records
//! - [`state`] -- The mutable [`RunState`] aggregate

pub mod ids;
pub mod member;
pub mod records;
pub mod state;

// Re-export all public types at crate root for convenience.
pub use ids::{MemberId, RunName, RunNameError};
pub use member::Member;
pub use records::{EventRecord, MilestoneRecord};
pub use state::{CounterViolation, RunState};
