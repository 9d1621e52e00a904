//! Buffered, append-only logs for the Collector simulation.
//!
//! Billions of draws can produce millions of special events. Writing each
//! one as it happens would dominate the draw loop, so records are held in
//! bounded in-memory buffers and appended to CSV files in batches.
//!
//! # Modules
//!
//! - [`buffer`] -- Bounded record buffer
//! - [`csv`] -- Row encoding and the [`CsvRecord`] trait
//! - [`log`] -- Lazily opened append-only CSV file
//! - [`logger`] -- The two-channel [`EventLogger`]
//! - [`error`] -- [`LogWriteError`]

pub mod buffer;
pub mod csv;
pub mod error;
pub mod log;
pub mod logger;

pub use buffer::RecordBuffer;
pub use csv::CsvRecord;
pub use error::LogWriteError;
pub use log::{CsvLog, truncate_after};
pub use logger::{ChannelStats, EventLogger, LoggerStats};
