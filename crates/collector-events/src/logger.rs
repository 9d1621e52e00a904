//! The buffered event logger.
//!
//! Two independent channels, one for special-draw events and one for
//! milestones, each with its own buffer, capacity, and log file. A channel
//! flushes on its own when its buffer fills; both flush on an explicit
//! [`EventLogger::flush`], which the draw loop triggers before every
//! checkpoint and at shutdown.
//!
//! Logging is best-effort. When a destination cannot be written, the
//! buffered records are dropped after a warning and counted, so memory
//! stays bounded and the simulation carries on.

use std::path::PathBuf;

use collector_types::{EventRecord, MilestoneRecord};
use tracing::{debug, warn};

use crate::buffer::RecordBuffer;
use crate::csv::CsvRecord;
use crate::error::LogWriteError;
use crate::log::CsvLog;

/// Counters for one channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Records written to the log.
    pub written: u64,
    /// Records dropped because the log could not be written.
    pub dropped: u64,
    /// Records currently buffered.
    pub pending: usize,
}

/// Counters for both channels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoggerStats {
    /// Special-draw event channel.
    pub events: ChannelStats,
    /// Milestone channel.
    pub milestones: ChannelStats,
}

/// One buffer plus its destination.
#[derive(Debug)]
struct Channel<T> {
    name: &'static str,
    buffer: RecordBuffer<T>,
    log: Option<CsvLog<T>>,
    written: u64,
    dropped: u64,
}

impl<T: CsvRecord> Channel<T> {
    fn new(name: &'static str, log: Option<CsvLog<T>>, capacity: usize) -> Self {
        Self {
            name,
            buffer: RecordBuffer::new(capacity),
            log,
            written: 0,
            dropped: 0,
        }
    }

    fn record(&mut self, record: T) {
        if self.buffer.push(record) {
            self.flush();
        }
    }

    fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let records = self.buffer.take();
        let count = u64::try_from(records.len()).unwrap_or(u64::MAX);

        let result = self
            .log
            .as_mut()
            .ok_or(LogWriteError::Unavailable)
            .and_then(|log| log.append(&records));

        match result {
            Ok(()) => {
                self.written = self.written.saturating_add(count);
                debug!(log = self.name, records = count, "Flushed records");
            }
            Err(e) => {
                self.dropped = self.dropped.saturating_add(count);
                warn!(
                    log = self.name,
                    error = %e,
                    dropped = count,
                    total_dropped = self.dropped,
                    "Log write failed, records dropped"
                );
            }
        }
    }

    fn stats(&self) -> ChannelStats {
        ChannelStats {
            written: self.written,
            dropped: self.dropped,
            pending: self.buffer.len(),
        }
    }
}

/// Buffered writer for the special-event and milestone logs.
#[derive(Debug)]
pub struct EventLogger {
    events: Channel<EventRecord>,
    milestones: Channel<MilestoneRecord>,
}

impl EventLogger {
    /// Create a logger writing to the given files.
    ///
    /// Files are opened on the first flush, so construction never fails.
    pub fn new(
        events_path: impl Into<PathBuf>,
        milestones_path: impl Into<PathBuf>,
        event_capacity: usize,
        milestone_capacity: usize,
    ) -> Self {
        Self {
            events: Channel::new("events", Some(CsvLog::new(events_path)), event_capacity),
            milestones: Channel::new(
                "milestones",
                Some(CsvLog::new(milestones_path)),
                milestone_capacity,
            ),
        }
    }

    /// Create a logger with no destination. Every flush drops its records.
    pub fn detached(event_capacity: usize, milestone_capacity: usize) -> Self {
        Self {
            events: Channel::new("events", None, event_capacity),
            milestones: Channel::new("milestones", None, milestone_capacity),
        }
    }

    /// Buffer a special-draw event, flushing the event log if the buffer fills.
    pub fn record_event(&mut self, record: EventRecord) {
        self.events.record(record);
    }

    /// Buffer a milestone, flushing the milestone log if the buffer fills.
    pub fn record_milestone(&mut self, record: MilestoneRecord) {
        self.milestones.record(record);
    }

    /// Write every buffered record in both channels.
    pub fn flush(&mut self) {
        self.events.flush();
        self.milestones.flush();
    }

    /// Written, dropped, and pending counts for both channels.
    pub fn stats(&self) -> LoggerStats {
        LoggerStats {
            events: self.events.stats(),
            milestones: self.milestones.stats(),
        }
    }
}
