//! Error types for the event logs.

use std::path::PathBuf;

/// Failure to write a durable log.
///
/// These never reach the draw loop. The logger reports them through
/// `tracing` and counts the records it had to drop.
#[derive(Debug, thiserror::Error)]
pub enum LogWriteError {
    /// The log file or its directory could not be created or opened.
    #[error("failed to open log {path}: {source}")]
    Open {
        /// Path of the log.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Writing or flushing rows failed.
    #[error("failed to write log {path}: {source}")]
    Write {
        /// Path of the log.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Rewriting a log to drop rows past a checkpoint failed.
    #[error("failed to truncate log {path}: {source}")]
    Truncate {
        /// Path of the log.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The logger has no destination for this log.
    #[error("log destination is not configured")]
    Unavailable,
}
