//! Error types for the storage layer.
//!
//! [`StoreError`] covers plain file writes (registry, reports).
//! [`CheckpointError`] describes why a checkpoint could not be used; the
//! checkpoint store turns it into a [`LoadOutcome::Corrupt`] rather than
//! propagating it, because a bad checkpoint must never abort a run.
//!
//! [`LoadOutcome::Corrupt`]: crate::checkpoint::LoadOutcome::Corrupt

use std::path::PathBuf;

use collector_types::MemberId;

/// Errors that can occur while writing to the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A filesystem operation failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path being read or written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Reasons a checkpoint cannot be restored.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// The checkpoint file exists but could not be read.
    #[error("failed to read checkpoint {path}: {source}")]
    Io {
        /// Path of the checkpoint.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The checkpoint is not valid JSON of the expected shape.
    #[error("failed to parse checkpoint: {0}")]
    Parse(#[from] serde_json::Error),

    /// The checkpoint was written by an incompatible format version.
    #[error("unsupported checkpoint version {found} (expected {expected})")]
    UnsupportedVersion {
        /// Version found in the file.
        found: u32,
        /// Version this build reads.
        expected: u32,
    },

    /// The checkpoint belongs to a different run.
    #[error("checkpoint belongs to run `{found}`, expected `{expected}`")]
    RunNameMismatch {
        /// Run the store was opened for.
        expected: String,
        /// Run recorded in the file.
        found: String,
    },

    /// The stored special rate is not a probability in `(0, 1]`.
    #[error("checkpoint special rate {rate} is outside (0, 1]")]
    InvalidRate {
        /// The stored rate.
        rate: f64,
    },

    /// The stored counters contradict each other.
    #[error("checkpoint counters are inconsistent: {details}")]
    Inconsistent {
        /// Description of every violated relationship.
        details: String,
    },

    /// The stored state references a member missing from the population.
    #[error("checkpoint references member `{id}` that is not in the population")]
    UnknownMember {
        /// The unknown id.
        id: MemberId,
    },
}
