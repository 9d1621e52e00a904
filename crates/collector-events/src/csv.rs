//! CSV row encoding for log records.
//!
//! Rows are written with `write!` directly into the log's buffered
//! writer. Fields that contain a comma, a double quote, or a line break
//! are quoted, with embedded quotes doubled.

use std::borrow::Cow;
use std::io::{self, Write};

use chrono::SecondsFormat;
use collector_types::{EventRecord, MilestoneRecord};

/// A record that can be written as one CSV row.
pub trait CsvRecord {
    /// Column names, written once when the log file is created.
    const HEADER: &'static [&'static str];

    /// Write this record as one row, including the trailing newline.
    fn write_row<W: Write>(&self, out: &mut W) -> io::Result<()>;
}

/// Write the header row for `T`.
pub fn write_header<T: CsvRecord, W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out, "{}", T::HEADER.join(","))
}

/// Quote a field if it needs quoting.
pub fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

impl CsvRecord for EventRecord {
    const HEADER: &'static [&'static str] =
        &["draw_index", "member_id", "retained", "first_retention"];

    fn write_row<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(
            out,
            "{},{},{},{}",
            self.draw_index,
            escape_field(self.member_id.as_str()),
            self.retained,
            self.first_retention
        )
    }
}

impl CsvRecord for MilestoneRecord {
    const HEADER: &'static [&'static str] = &[
        "draw_index",
        "timestamp",
        "special_seen",
        "special_retained",
        "special_missed",
        "unique_retained",
        "unique_ordinary",
        "draws_per_second",
        "retained_per_second",
        "elapsed_seconds",
    ];

    fn write_row<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(
            out,
            "{},{},{},{},{},{},{},{:.2},{:.6},{:.3}",
            self.draw_index,
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.special_seen,
            self.special_retained,
            self.special_missed,
            self.unique_retained,
            self.unique_ordinary,
            self.draws_per_second,
            self.retained_per_second,
            self.elapsed_seconds
        )
    }
}
