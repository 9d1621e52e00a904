//! Storage layer for the Collector simulation.
//!
//! Everything a run persists besides its CSV logs lives here: the
//! checkpoint that makes a run resumable across process lifetimes, the
//! registry of named runs, and the directory layout tying them together.
//!
//! # Architecture
//!
//! ```text
//! Draw loop
//!     |
//!     +-- every checkpoint interval / on stop
//!         |-- flush event logs       (collector-events)
//!         |-- CheckpointStore::save  (atomic JSON replace)
//!         +-- RunRegistry::record    (run name -> config + checkpoint path)
//! ```
//!
//! # Modules
//!
//! - [`checkpoint`] -- Checkpoint format, save, load, and validation
//! - [`registry`] -- Named-run registry
//! - [`layout`] -- Per-run file paths
//! - [`atomic`] -- Write-temp-then-rename JSON files
//! - [`serde_u128_string`] -- `u128` as a decimal string
//! - [`error`] -- Shared error types

pub mod atomic;
pub mod checkpoint;
pub mod error;
pub mod layout;
pub mod registry;
pub mod serde_u128_string;

// Re-export primary types for convenience.
pub use checkpoint::{CHECKPOINT_VERSION, Checkpoint, CheckpointStore, LoadOutcome, RngSnapshot};
pub use error::{CheckpointError, StoreError};
pub use layout::RunPaths;
pub use registry::{RegistryEntry, RunRegistry};
