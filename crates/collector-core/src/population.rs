//! Population model: the fixed set of members a run draws from.
//!
//! The population is loaded once from a tabular source (CSV with a header
//! row), weighted at load time, and never mutated afterwards. It is shared
//! read-only by the sampler, the encounter engine, and the estimator.
//!
//! # Source format
//!
//! Required columns (matched case-insensitively, in any order):
//!
//! - `id` -- unique member identifier
//! - `rank` -- non-negative numeric strength score
//! - `retention_rate` -- base retention probability, divided by
//!   `retention_scale` before use
//!
//! Any other column whose values are all spelled-out booleans
//! (`true`/`false`, `yes`/`no`, or empty) becomes a category flag named
//! after the column header. Numeric columns such as a generation number
//! are ignored even when they only hold `0` and `1`.
//!
//! # Weights
//!
//! ```text
//! draw_weight = 1 / (rank + stability_constant) ^ rarity_exponent
//! ```
//!
//! [`Population::total_weight`] is computed once from the member list and
//! is the only total weight any component uses.

use std::collections::{BTreeMap, BTreeSet};
use std::io::BufRead;
use std::path::{Path, PathBuf};

use collector_types::{Member, MemberId};

use crate::config::PopulationConfig;

/// Errors raised while loading or validating a population.
#[derive(Debug, thiserror::Error)]
pub enum DataSourceError {
    /// The source file could not be opened or read.
    #[error("failed to read population source {path}: {source}")]
    Io {
        /// Path of the source.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The header row lacks a required column.
    #[error("population source is missing required column `{column}`")]
    MissingColumn {
        /// Name of the missing column.
        column: &'static str,
    },

    /// A row could not be parsed.
    #[error("malformed population row at line {line}: {reason}")]
    Malformed {
        /// 1-based line number in the source.
        line: usize,
        /// What is wrong with the row.
        reason: String,
    },

    /// Two rows share the same member id.
    #[error("duplicate member id `{id}` at line {line}")]
    DuplicateId {
        /// 1-based line number of the second occurrence.
        line: usize,
        /// The repeated id.
        id: MemberId,
    },

    /// A rank is negative or not a finite number.
    #[error("invalid rank for `{id}`: {value}")]
    InvalidRank {
        /// The offending member.
        id: MemberId,
        /// The rejected value.
        value: f64,
    },

    /// A scaled retention rate falls outside `[0, 1]`.
    #[error("retention rate for `{id}` must be within [0, 1], got {value}")]
    InvalidRetention {
        /// The offending member.
        id: MemberId,
        /// The rejected value after scaling.
        value: f64,
    },

    /// A derived draw weight is zero, negative, or not finite.
    #[error("draw weight for `{id}` must be positive and finite, got {value}")]
    InvalidWeight {
        /// The offending member.
        id: MemberId,
        /// The rejected weight.
        value: f64,
    },

    /// The source holds no members.
    #[error("population source contains no members")]
    Empty,
}

/// The immutable set of members for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Population {
    members: Vec<Member>,
    positions: BTreeMap<MemberId, usize>,
    total_weight: f64,
}

impl Population {
    /// Load and weight a population from a CSV file.
    ///
    /// # Errors
    ///
    /// Returns [`DataSourceError::Io`] if the file cannot be read, and the
    /// other [`DataSourceError`] variants for missing columns, malformed
    /// rows, duplicate ids, or out-of-range values.
    pub fn load(path: &Path, config: &PopulationConfig) -> Result<Self, DataSourceError> {
        let file = std::fs::File::open(path).map_err(|source| DataSourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(std::io::BufReader::new(file), config).map_err(|err| match err {
            DataSourceError::Io { source, .. } => DataSourceError::Io {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parse and weight a population from any buffered CSV reader.
    ///
    /// # Errors
    ///
    /// See [`Population::load`].
    pub fn from_reader<R: BufRead>(
        reader: R,
        config: &PopulationConfig,
    ) -> Result<Self, DataSourceError> {
        let mut lines = reader.lines().enumerate();

        let header = loop {
            let Some((index, line)) = lines.next() else {
                return Err(DataSourceError::Empty);
            };
            let line = line.map_err(|source| DataSourceError::Io {
                path: PathBuf::new(),
                source,
            })?;
            if !line.trim().is_empty() {
                break split_record(&line).map_err(|reason| DataSourceError::Malformed {
                    line: index.saturating_add(1),
                    reason,
                })?;
            }
        };
        let columns = Columns::from_header(&header)?;

        let mut rows = Vec::new();
        for (index, line) in lines {
            let line_no = index.saturating_add(1);
            let line = line.map_err(|source| DataSourceError::Io {
                path: PathBuf::new(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let fields = split_record(&line).map_err(|reason| DataSourceError::Malformed {
                line: line_no,
                reason,
            })?;
            rows.push((line_no, fields));
        }

        let flag_columns = columns.flag_columns(&header, &rows);
        let mut members = Vec::with_capacity(rows.len());
        let mut seen = BTreeSet::new();

        for (line, fields) in &rows {
            let line = *line;
            if fields.len() != header.len() {
                return Err(DataSourceError::Malformed {
                    line,
                    reason: format!("expected {} fields, found {}", header.len(), fields.len()),
                });
            }

            let id = MemberId::new(field(fields, columns.id));
            if id.as_str().is_empty() {
                return Err(DataSourceError::Malformed {
                    line,
                    reason: "empty member id".to_owned(),
                });
            }
            if !seen.insert(id.clone()) {
                return Err(DataSourceError::DuplicateId { line, id });
            }

            let rank = parse_number(fields, columns.rank, "rank", line)?;
            let raw_retention =
                parse_number(fields, columns.retention_rate, "retention_rate", line)?;

            let flags = flag_columns
                .iter()
                .filter(|(col, _)| parse_flag(field(fields, *col)) == Some(true))
                .map(|(_, name)| name.clone())
                .collect();

            members.push(Member {
                draw_weight: draw_weight(
                    rank,
                    config.stability_constant,
                    config.rarity_exponent,
                ),
                retention_rate: raw_retention / config.retention_scale,
                id,
                rank,
                flags,
            });
        }

        Self::from_members(members)
    }

    /// Build a population from already-weighted members.
    ///
    /// Validates every member the same way the loader does, so the result
    /// upholds the same invariants regardless of where the members came from.
    ///
    /// # Errors
    ///
    /// Returns [`DataSourceError::Empty`] for an empty list, and the
    /// matching variant for a duplicate id, bad rank, bad retention rate,
    /// or bad weight.
    pub fn from_members(members: Vec<Member>) -> Result<Self, DataSourceError> {
        if members.is_empty() {
            return Err(DataSourceError::Empty);
        }

        let mut positions = BTreeMap::new();
        for (index, member) in members.iter().enumerate() {
            if !member.rank.is_finite() || member.rank < 0.0 {
                return Err(DataSourceError::InvalidRank {
                    id: member.id.clone(),
                    value: member.rank,
                });
            }
            if member.effective_retention(false).is_none() {
                return Err(DataSourceError::InvalidRetention {
                    id: member.id.clone(),
                    value: member.retention_rate,
                });
            }
            if !member.draw_weight.is_finite() || member.draw_weight <= 0.0 {
                return Err(DataSourceError::InvalidWeight {
                    id: member.id.clone(),
                    value: member.draw_weight,
                });
            }
            if positions.insert(member.id.clone(), index).is_some() {
                return Err(DataSourceError::DuplicateId {
                    line: index.saturating_add(1),
                    id: member.id.clone(),
                });
            }
        }

        let total_weight = members.iter().map(|m| m.draw_weight).sum();

        Ok(Self {
            members,
            positions,
            total_weight,
        })
    }

    /// All members in source order.
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Member at the given position, if any.
    pub fn get(&self, index: usize) -> Option<&Member> {
        self.members.get(index)
    }

    /// Position of the member with the given id.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    /// Whether a member with the given id exists.
    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always `false` for a constructed population; present for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Sum of all draw weights. The canonical total used everywhere.
    pub const fn total_weight(&self) -> f64 {
        self.total_weight
    }

    /// Per-draw probability that `member` is sampled.
    pub fn selection_probability(&self, member: &Member) -> f64 {
        member.draw_weight / self.total_weight
    }
}

/// Draw weight for a member of the given rank.
pub fn draw_weight(rank: f64, stability_constant: f64, rarity_exponent: f64) -> f64 {
    1.0 / (rank + stability_constant).powf(rarity_exponent)
}

/// Positions of the required columns within the header.
struct Columns {
    id: usize,
    rank: usize,
    retention_rate: usize,
}

impl Columns {
    fn from_header(header: &[String]) -> Result<Self, DataSourceError> {
        let find = |column: &'static str| {
            header
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(column))
                .ok_or(DataSourceError::MissingColumn { column })
        };
        Ok(Self {
            id: find("id")?,
            rank: find("rank")?,
            retention_rate: find("retention_rate")?,
        })
    }

    /// Extra columns whose every value parses as a boolean.
    fn flag_columns(&self, header: &[String], rows: &[(usize, Vec<String>)]) -> Vec<(usize, String)> {
        header
            .iter()
            .enumerate()
            .filter(|(col, _)| ![self.id, self.rank, self.retention_rate].contains(col))
            .filter(|(col, _)| {
                rows.iter()
                    .all(|(_, fields)| fields.get(*col).is_none_or(|v| parse_flag(v).is_some()))
            })
            .map(|(col, name)| (col, name.trim().to_owned()))
            .collect()
    }
}

fn field(fields: &[String], col: usize) -> &str {
    fields.get(col).map_or("", String::as_str)
}

fn parse_number(
    fields: &[String],
    col: usize,
    name: &str,
    line: usize,
) -> Result<f64, DataSourceError> {
    let raw = field(fields, col).trim();
    raw.parse::<f64>().map_err(|_err| DataSourceError::Malformed {
        line,
        reason: format!("column `{name}` is not a number: {raw:?}"),
    })
}

/// Interpret a spelled-out boolean cell. Empty cells count as `false`.
fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" => Some(true),
        "false" | "no" | "" => Some(false),
        _ => None,
    }
}

/// Split one CSV line into fields, honouring double-quoted fields with
/// `""` escapes. Embedded newlines are not supported.
fn split_record(line: &str) -> Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.trim_end_matches('\r').chars().peekable();
    let mut in_quotes = false;

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) => {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    let _ = chars.next();
                } else {
                    in_quotes = false;
                }
            }
            ('"', false) if current.trim().is_empty() => {
                current.clear();
                in_quotes = true;
            }
            (',', false) => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }

    if in_quotes {
        return Err("unterminated quoted field".to_owned());
    }
    fields.push(current);
    Ok(fields)
}
