//! Error types for the engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps every failure
//! mode during startup, the draw loop, and report output.

use std::path::PathBuf;

/// Top-level error for the engine binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading or validation failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: collector_core::config::ConfigError,
    },

    /// The population source could not be loaded.
    #[error("population error: {source}")]
    DataSource {
        /// The underlying data source error.
        #[from]
        source: collector_core::population::DataSourceError,
    },

    /// The simulation could not be constructed or restored.
    #[error("simulation error: {source}")]
    Simulation {
        /// The underlying simulation error.
        #[from]
        source: collector_core::simulation::SimulationError,
    },

    /// The draw loop aborted on an invariant violation.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: collector_core::runner::RunnerError,
    },

    /// Writing the final report failed.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: collector_store::StoreError,
    },

    /// Cutting the logs back to the restored checkpoint failed.
    #[error("log error: {source}")]
    Log {
        /// The underlying log error.
        #[from]
        source: collector_events::LogWriteError,
    },

    /// Discarding the logs of a previous run failed.
    #[error("failed to remove {path}: {source}")]
    Io {
        /// File being removed.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The blocking draw-loop task panicked or was cancelled.
    #[error("draw loop task failed: {source}")]
    Join {
        /// The underlying join error.
        #[from]
        source: tokio::task::JoinError,
    },
}
