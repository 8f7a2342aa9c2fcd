//! Age-based file selection.
//!
//! This module provides the selection primitive shared by the move and
//! archive operations: a non-recursive scan of a source directory that
//! yields the files whose name matches a glob pattern and whose
//! last-modified timestamp is strictly older than a cutoff.
//!
//! The scan is a lazy, single-pass iterator over one enumeration
//! snapshot. Files created or removed while the scan is running are not
//! guaranteed to be reflected.

use crate::config::CompiledExclusions;
use chrono::{DateTime, Duration, Local};
use clap::ValueEnum;
use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Unit in which a minimum file age is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgeUnit {
    Minute,
    Hour,
    Day,
}

impl AgeUnit {
    /// Computes the cutoff timestamp `reference − amount` of this unit.
    ///
    /// An amount of zero yields the reference instant itself, which
    /// selects everything modified strictly before "now". Returns `None`
    /// when the subtraction leaves the representable timestamp range.
    pub fn cutoff_before(self, reference: DateTime<Local>, amount: u32) -> Option<DateTime<Local>> {
        let span = match self {
            AgeUnit::Minute => Duration::minutes(i64::from(amount)),
            AgeUnit::Hour => Duration::hours(i64::from(amount)),
            AgeUnit::Day => Duration::days(i64::from(amount)),
        };
        reference.checked_sub_signed(span)
    }
}

impl std::fmt::Display for AgeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AgeUnit::Minute => "minute",
            AgeUnit::Hour => "hour",
            AgeUnit::Day => "day",
        };
        write!(f, "{}", name)
    }
}

/// A file selected for processing: matched the pattern, survived the
/// exclusion rules, and is older than the cutoff.
#[derive(Debug, Clone)]
pub struct FileCandidate {
    /// Full path of the file inside the source directory.
    pub path: PathBuf,
    /// Last-modified timestamp read during the scan.
    pub last_modified: DateTime<Local>,
}

/// Errors raised while selecting files.
#[derive(Debug)]
pub enum SelectionError {
    /// Directory enumeration itself failed. Fatal: consumers stop the
    /// whole run when they see this.
    Enumeration {
        dir: PathBuf,
        source: io::Error,
    },
    /// Metadata for a single file could not be read. Consumers count it
    /// and continue with the next file.
    Metadata {
        path: PathBuf,
        source: io::Error,
    },
}

impl std::fmt::Display for SelectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Enumeration { dir, source } => {
                write!(f, "Failed to enumerate {}: {}", dir.display(), source)
            }
            Self::Metadata { path, source } => {
                write!(f, "Failed to read metadata of {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for SelectionError {}

/// Starts a scan of `source_dir` for files matching `pattern` that were
/// last modified strictly before `cutoff`.
///
/// The caller is expected to have validated that `source_dir` exists; a
/// directory that cannot be opened is still reported as an enumeration
/// error. The returned iterator borrows the pattern and exclusion rules
/// for its lifetime.
///
/// # Errors
///
/// Returns `SelectionError::Enumeration` when the directory cannot be
/// read at all.
pub fn scan<'a>(
    source_dir: &Path,
    pattern: &'a Pattern,
    exclusions: &'a CompiledExclusions,
    cutoff: DateTime<Local>,
) -> Result<AgeFilter<'a>, SelectionError> {
    let entries = fs::read_dir(source_dir).map_err(|e| SelectionError::Enumeration {
        dir: source_dir.to_path_buf(),
        source: e,
    })?;

    Ok(AgeFilter {
        source_dir: source_dir.to_path_buf(),
        entries,
        pattern,
        exclusions,
        cutoff,
    })
}

/// Lazy iterator over the files selected by [`scan`].
///
/// Yields `Ok(FileCandidate)` for each selected file and `Err` for
/// enumeration or per-file metadata failures, in filesystem enumeration
/// order. Single pass, not restartable.
pub struct AgeFilter<'a> {
    source_dir: PathBuf,
    entries: fs::ReadDir,
    pattern: &'a Pattern,
    exclusions: &'a CompiledExclusions,
    cutoff: DateTime<Local>,
}

impl Iterator for AgeFilter<'_> {
    type Item = Result<FileCandidate, SelectionError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    return Some(Err(SelectionError::Enumeration {
                        dir: self.source_dir.clone(),
                        source: e,
                    }));
                }
            };

            // Subdirectories are never descended into; the pattern only
            // covers file names directly inside the source directory.
            match entry.file_type() {
                Ok(file_type) if file_type.is_file() => {}
                Ok(_) => continue,
                Err(e) => {
                    return Some(Err(SelectionError::Metadata {
                        path: entry.path(),
                        source: e,
                    }));
                }
            }

            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            if !self.pattern.matches(&file_name) {
                continue;
            }
            if self.exclusions.is_excluded(&file_name) {
                continue;
            }

            let modified = match entry.metadata().and_then(|meta| meta.modified()) {
                Ok(modified) => DateTime::<Local>::from(modified),
                Err(e) => {
                    return Some(Err(SelectionError::Metadata {
                        path: entry.path(),
                        source: e,
                    }));
                }
            };

            if modified < self.cutoff {
                return Some(Ok(FileCandidate {
                    path: entry.path(),
                    last_modified: modified,
                }));
            }
        }
    }
}
