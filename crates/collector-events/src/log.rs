//! Append-only CSV log file.
//!
//! The file is opened lazily on the first append, created together with
//! its parent directory if needed. The header row is written only when
//! the file is new or empty, so a resumed run keeps appending below the
//! rows of earlier sessions.
//!
//! Rows reach the log before the checkpoint that covers them is saved, so
//! after a hard kill a log can run ahead of the checkpoint. [`truncate_after`]
//! cuts it back before the resumed run appends again.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use crate::csv::{CsvRecord, write_header};
use crate::error::LogWriteError;

/// One append-only CSV log of `T` records.
#[derive(Debug)]
pub struct CsvLog<T> {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    _records: PhantomData<fn(&T)>,
}

impl<T: CsvRecord> CsvLog<T> {
    /// Create a handle for the log at `path`. Nothing is touched on disk yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: None,
            _records: PhantomData,
        }
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append every record and flush to the OS.
    ///
    /// On failure the open handle is discarded so the next append starts
    /// by reopening the file.
    ///
    /// # Errors
    ///
    /// Returns [`LogWriteError::Open`] if the file cannot be opened, or
    /// [`LogWriteError::Write`] if writing fails.
    pub fn append(&mut self, records: &[T]) -> Result<(), LogWriteError> {
        if records.is_empty() {
            return Ok(());
        }

        let result = self.write_all(records);
        if result.is_err() {
            self.writer = None;
        }
        result
    }

    fn write_all(&mut self, records: &[T]) -> Result<(), LogWriteError> {
        let path = self.path.clone();
        let writer = self.open()?;
        let write_err = |source| LogWriteError::Write {
            path: path.clone(),
            source,
        };
        for record in records {
            record.write_row(writer).map_err(write_err)?;
        }
        writer.flush().map_err(write_err)
    }

    fn open(&mut self) -> Result<&mut BufWriter<File>, LogWriteError> {
        if self.writer.is_none() {
            let open_err = |source| LogWriteError::Open {
                path: self.path.clone(),
                source,
            };
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(open_err)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .map_err(open_err)?;
            let is_new = file.metadata().map_err(open_err)?.len() == 0;

            let mut writer = BufWriter::new(file);
            if is_new {
                write_header::<T, _>(&mut writer).map_err(|source| LogWriteError::Write {
                    path: self.path.clone(),
                    source,
                })?;
            }
            self.writer = Some(writer);
        }
        self.writer.as_mut().ok_or(LogWriteError::Unavailable)
    }
}

/// Drop every row of the log at `path` whose leading `draw_index` field is
/// greater than `draw_index`, plus a final row left without its newline by
/// a hard kill. The header row is kept.
///
/// The file is rewritten through a temporary sibling and renamed into
/// place, and only when something is removed. A missing file is not an
/// error. Returns the number of rows removed.
///
/// # Errors
///
/// Returns [`LogWriteError::Truncate`] if reading, rewriting, or
/// replacing the file fails.
pub fn truncate_after(path: &Path, draw_index: u64) -> Result<usize, LogWriteError> {
    let truncate_err = |source| LogWriteError::Truncate {
        path: path.to_path_buf(),
        source,
    };

    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(source) => return Err(truncate_err(source)),
    };

    let mut kept = String::with_capacity(contents.len());
    let mut removed = 0usize;
    for (line_no, line) in contents.split_inclusive('\n').enumerate() {
        let keep = line.ends_with('\n')
            && match line.split(',').next().unwrap_or_default().parse::<u64>() {
                Ok(index) => index <= draw_index,
                Err(_) => line_no == 0,
            };
        if keep {
            kept.push_str(line);
        } else {
            removed = removed.saturating_add(1);
        }
    }
    if removed == 0 {
        return Ok(0);
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    {
        let mut writer = BufWriter::new(File::create(&tmp).map_err(truncate_err)?);
        writer.write_all(kept.as_bytes()).map_err(truncate_err)?;
        writer.flush().map_err(truncate_err)?;
        writer.get_ref().sync_all().map_err(truncate_err)?;
    }
    fs::rename(&tmp, path).map_err(truncate_err)?;
    Ok(removed)
}
