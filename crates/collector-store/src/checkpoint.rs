//! Checkpoint persistence.
//!
//! A checkpoint is the complete mutable state of a run plus the metadata
//! needed to resume it: run name, rate label, save time, generator seed
//! and word position, and the initial prediction. It is stored as
//! pretty-printed JSON so it can be inspected by hand.
//!
//! Saves are atomic (temp file, sync, rename). Loads never fail: a
//! missing file is [`LoadOutcome::NotFound`], and anything unreadable,
//! unparsable, or inconsistent with the population is
//! [`LoadOutcome::Corrupt`], which the caller treats as a fresh start.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use collector_core::population::Population;
use collector_core::simulation::{RngPosition, Simulation};
use collector_types::{RunName, RunState};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::atomic;
use crate::error::{CheckpointError, StoreError};

/// Checkpoint format version written by this build.
pub const CHECKPOINT_VERSION: u32 = 1;

/// Serialized generator position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngSnapshot {
    /// Generator seed.
    pub seed: u64,
    /// 32-bit words consumed, stored as a decimal string.
    #[serde(with = "crate::serde_u128_string")]
    pub word_pos: u128,
}

impl From<RngPosition> for RngSnapshot {
    fn from(position: RngPosition) -> Self {
        Self {
            seed: position.seed,
            word_pos: position.word_pos,
        }
    }
}

impl From<RngSnapshot> for RngPosition {
    fn from(snapshot: RngSnapshot) -> Self {
        Self {
            seed: snapshot.seed,
            word_pos: snapshot.word_pos,
        }
    }
}

/// Durable form of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Format version.
    pub version: u32,
    /// Run the checkpoint belongs to.
    pub run_name: RunName,
    /// Special-rate label.
    pub rate_label: String,
    /// When the checkpoint was written.
    pub saved_at: DateTime<Utc>,
    /// Generator position.
    pub rng: RngSnapshot,
    /// Expected total draws predicted when the run started.
    #[serde(default)]
    pub initial_prediction: Option<f64>,
    /// Every counter and set of the run.
    pub state: RunState,
}

impl Checkpoint {
    /// Capture the simulation's current state.
    ///
    /// Elapsed time of the current session is folded into
    /// `state.elapsed_seconds_prior`.
    pub fn capture(simulation: &Simulation) -> Self {
        let identity = simulation.identity();
        Self {
            version: CHECKPOINT_VERSION,
            run_name: identity.name.clone(),
            rate_label: identity.rate_label.clone(),
            saved_at: Utc::now(),
            rng: simulation.rng_position().into(),
            initial_prediction: simulation.initial_prediction(),
            state: simulation.checkpoint_state(),
        }
    }

    /// Check the checkpoint against the run it is being restored into.
    ///
    /// # Errors
    ///
    /// Returns the first [`CheckpointError`] found: wrong version, wrong
    /// run, invalid rate, inconsistent counters, or an unknown member.
    pub fn validate(&self, run: &RunName, population: &Population) -> Result<(), CheckpointError> {
        if self.version != CHECKPOINT_VERSION {
            return Err(CheckpointError::UnsupportedVersion {
                found: self.version,
                expected: CHECKPOINT_VERSION,
            });
        }

        if &self.run_name != run {
            return Err(CheckpointError::RunNameMismatch {
                expected: run.to_string(),
                found: self.run_name.to_string(),
            });
        }

        let rate = self.state.special_rate;
        if !rate.is_finite() || rate <= 0.0 || rate > 1.0 {
            return Err(CheckpointError::InvalidRate { rate });
        }

        let violations = self.state.counter_violations();
        if !violations.is_empty() {
            let details = violations
                .iter()
                .map(|v| format!("{v:?}"))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(CheckpointError::Inconsistent { details });
        }

        let unknown = self
            .state
            .retained_set
            .iter()
            .chain(self.state.ordinary_seen_set.iter())
            .chain(self.state.per_member_retained_counts.keys())
            .chain(self.state.per_member_ordinary_counts.keys())
            .find(|id| !population.contains(id.as_str()));
        if let Some(id) = unknown {
            return Err(CheckpointError::UnknownMember { id: id.clone() });
        }

        Ok(())
    }
}

/// Result of looking for a checkpoint.
#[derive(Debug)]
pub enum LoadOutcome {
    /// A valid checkpoint was found.
    Restored(Box<Checkpoint>),
    /// No checkpoint exists for this run.
    NotFound,
    /// A checkpoint exists but cannot be used.
    Corrupt {
        /// Why it was rejected.
        reason: CheckpointError,
    },
}

/// Reads and writes the checkpoint file of one run.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    /// Create a store for the checkpoint at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the checkpoint file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a checkpoint file exists.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Atomically write the checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if serialization or any filesystem step fails.
    /// The previous checkpoint, if any, is left intact in that case.
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<(), StoreError> {
        atomic::write_json(&self.path, checkpoint)?;
        debug!(
            path = %self.path.display(),
            draws = checkpoint.state.draw_count,
            "Checkpoint saved"
        );
        Ok(())
    }

    /// Read the checkpoint without validating it.
    ///
    /// Returns `Ok(None)` when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError::Io`] or [`CheckpointError::Parse`].
    pub fn read(&self) -> Result<Option<Checkpoint>, CheckpointError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(CheckpointError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        Ok(Some(serde_json::from_str(&contents)?))
    }

    /// Read and validate the checkpoint for `run` against `population`.
    pub fn load(&self, run: &RunName, population: &Population) -> LoadOutcome {
        match self.read() {
            Ok(None) => LoadOutcome::NotFound,
            Ok(Some(checkpoint)) => match checkpoint.validate(run, population) {
                Ok(()) => LoadOutcome::Restored(Box::new(checkpoint)),
                Err(reason) => LoadOutcome::Corrupt { reason },
            },
            Err(reason) => LoadOutcome::Corrupt { reason },
        }
    }
}
