//! Registry of named runs sharing a reports directory.
//!
//! Several runs with different configurations can be checkpointed side by
//! side. The registry maps each run name to its configuration and
//! checkpoint location so a run can be found and resumed by name. It is
//! updated after every successful checkpoint save.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::atomic;
use crate::error::StoreError;

/// What the registry knows about one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// Special-rate label.
    pub rate_label: String,
    /// Per-draw special probability.
    pub special_rate: f64,
    /// Whether every special draw is retained.
    pub guaranteed_retention: bool,
    /// Last checkpoint save.
    pub last_updated: DateTime<Utc>,
    /// Checkpoint file of the run.
    pub checkpoint_path: PathBuf,
    /// Directory holding the run's logs and reports.
    pub reports_dir: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    last_active: Option<String>,
    #[serde(default)]
    runs: BTreeMap<String, RegistryEntry>,
}

/// The run registry file and its in-memory contents.
#[derive(Debug, Clone)]
pub struct RunRegistry {
    path: PathBuf,
    contents: RegistryFile,
}

impl RunRegistry {
    /// Load the registry at `path`.
    ///
    /// A missing file yields an empty registry. An unreadable or corrupt
    /// file is logged and also replaced by an empty registry; it will be
    /// overwritten on the next save.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let contents = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Run registry is corrupt, starting empty");
                RegistryFile::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => RegistryFile::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Run registry is unreadable, starting empty");
                RegistryFile::default()
            }
        };
        Self { path, contents }
    }

    /// Path of the registry file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert or replace the entry for `run`, mark it last active, and save.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the registry cannot be written. The
    /// in-memory registry is updated regardless.
    pub fn record(&mut self, run: &str, entry: RegistryEntry) -> Result<(), StoreError> {
        self.contents.runs.insert(run.to_owned(), entry);
        self.contents.last_active = Some(run.to_owned());
        self.save()
    }

    /// Write the registry atomically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if serialization or any filesystem step fails.
    pub fn save(&self) -> Result<(), StoreError> {
        atomic::write_json(&self.path, &self.contents)
    }

    /// Entry for `run`, if registered.
    pub fn get(&self, run: &str) -> Option<&RegistryEntry> {
        self.contents.runs.get(run)
    }

    /// Name of the most recently checkpointed run.
    pub fn last_active(&self) -> Option<&str> {
        self.contents.last_active.as_deref()
    }

    /// Every registered run, ordered by name.
    pub fn runs(&self) -> impl Iterator<Item = (&str, &RegistryEntry)> {
        self.contents.runs.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    /// Registered runs whose checkpoint file still exists.
    pub fn list_resumable(&self) -> Vec<(&str, &RegistryEntry)> {
        self.runs()
            .filter(|(_, entry)| entry.checkpoint_path.is_file())
            .collect()
    }
}
