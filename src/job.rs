//! Operation configuration and run accounting.
//!
//! Both operations share one set of selection parameters, embedded by
//! value in the per-operation job structs. Counters are an explicit
//! aggregate threaded through a run and reported once at the end.

use crate::age_filter::AgeUnit;
use crate::archiver::CompressionChoice;
use chrono::{DateTime, Local};
use glob::Pattern;
use std::path::PathBuf;

/// Selection parameters shared by the move and archive operations.
#[derive(Debug, Clone)]
pub struct SelectionParams {
    /// Directory whose files are inspected (non-recursively).
    pub source_dir: PathBuf,
    /// Directory receiving moved files or archives.
    pub target_dir: PathBuf,
    /// Glob applied to file names inside the source directory.
    pub pattern: Pattern,
    /// Minimum age of selected files, in `age_unit` units.
    pub min_age: u32,
    /// Unit the age is measured in.
    pub age_unit: AgeUnit,
    /// A progress line is printed after this many processed files.
    pub display_progress_after: u64,
}

impl SelectionParams {
    /// Cutoff timestamp for this selection, relative to `reference`.
    ///
    /// Derived exactly once per invocation; both the filter and the move
    /// operation's defensive re-check compare against the same value.
    pub fn cutoff(&self, reference: DateTime<Local>) -> Option<DateTime<Local>> {
        self.age_unit.cutoff_before(reference, self.min_age)
    }
}

/// Configuration of one move run.
#[derive(Debug, Clone)]
pub struct MoveJob {
    pub selection: SelectionParams,
}

/// Configuration of one archive run.
#[derive(Debug, Clone)]
pub struct ArchiveJob {
    pub selection: SelectionParams,
    /// Prefix of the generated zip file names.
    pub archive_prefix: String,
    /// Compression applied to every zip entry.
    pub compression_level: CompressionChoice,
}

/// Per-invocation tallies, updated synchronously during iteration and
/// printed once in the final summary. Per-file failures only ever
/// increment `errors`; they never abort the batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounters {
    /// Candidates the operation looked at.
    pub processed: u64,
    /// Files moved to the target directory.
    pub moved: u64,
    /// Zip entries written successfully.
    pub archived: u64,
    /// Files skipped by the move operation's cutoff re-check.
    pub skipped: u64,
    /// Originals deleted after their bucket was fully archived.
    pub deleted: u64,
    /// Per-file failures of any kind.
    pub errors: u64,
}
