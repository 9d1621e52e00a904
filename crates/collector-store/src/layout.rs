//! On-disk layout of a reports directory.
//!
//! ```text
//! <reports_dir>/
//!     run_registry.json
//!     <run_name>/
//!         checkpoint.json
//!         special_events.csv
//!         milestones.csv
//!         results.json
//! ```

use std::path::{Path, PathBuf};

use collector_types::RunName;

/// File name of the shared run registry.
pub const REGISTRY_FILE: &str = "run_registry.json";

/// Paths of every file belonging to one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPaths {
    /// Root reports directory shared by all runs.
    pub reports_dir: PathBuf,
    /// Directory of this run.
    pub run_dir: PathBuf,
    /// Checkpoint file.
    pub checkpoint: PathBuf,
    /// Special-event log.
    pub events: PathBuf,
    /// Milestone log.
    pub milestones: PathBuf,
    /// Final report.
    pub results: PathBuf,
}

impl RunPaths {
    /// Derive the paths of `run` under `reports_dir`.
    pub fn new(reports_dir: &Path, run: &RunName) -> Self {
        let run_dir = reports_dir.join(run.as_str());
        Self {
            reports_dir: reports_dir.to_path_buf(),
            checkpoint: run_dir.join("checkpoint.json"),
            events: run_dir.join("special_events.csv"),
            milestones: run_dir.join("milestones.csv"),
            results: run_dir.join("results.json"),
            run_dir,
        }
    }

    /// Path of the shared run registry.
    pub fn registry(&self) -> PathBuf {
        self.reports_dir.join(REGISTRY_FILE)
    }
}
