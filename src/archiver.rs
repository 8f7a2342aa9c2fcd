//! Hour-bucketed zip archiving.
//!
//! Candidates are grouped by the calendar hour of their last-modified
//! timestamp; each group is written into one zip file named from a
//! prefix and the bucket timestamp. Originals are deleted only after
//! every entry of their bucket has been written and the archive
//! finalized, so a crash mid-run can duplicate files but never lose
//! them.
//!
//! Nothing coordinates two processes updating the same archive path at
//! once; run one invocation per target directory.

use crate::age_filter::{FileCandidate, SelectionError};
use crate::job::{ArchiveJob, RunCounters};
use crate::output::OutputFormatter;
use chrono::{DateTime, Datelike, Local, Timelike};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use zip::write::{SimpleFileOptions, ZipWriter};
use zip::{CompressionMethod, DateTime as ZipDateTime};

/// Earliest year a zip entry timestamp can carry.
const ZIP_YEAR_MIN: i32 = 1980;
/// Latest year a zip entry timestamp can carry.
const ZIP_YEAR_MAX: i32 = 2107;

/// Zip entry compression selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[value(rename_all = "PascalCase")]
#[serde(rename_all = "kebab-case")]
pub enum CompressionChoice {
    /// Store entries without compressing them.
    NoCompression,
    /// Deflate with the cheapest setting.
    Fastest,
    /// Deflate with the library default setting.
    Optimal,
}

impl CompressionChoice {
    fn method(self) -> CompressionMethod {
        match self {
            CompressionChoice::NoCompression => CompressionMethod::Stored,
            CompressionChoice::Fastest | CompressionChoice::Optimal => CompressionMethod::Deflated,
        }
    }

    fn level(self) -> Option<i64> {
        match self {
            CompressionChoice::Fastest => Some(1),
            // None lets the deflate encoder pick its default
            CompressionChoice::NoCompression | CompressionChoice::Optimal => None,
        }
    }
}

/// Hour-granularity grouping key. Files modified within the same local
/// calendar hour share one archive file per invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HourBucket {
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
}

impl HourBucket {
    /// Derives the bucket of a timestamp by truncating it to the hour.
    pub fn of(timestamp: DateTime<Local>) -> Self {
        Self {
            year: timestamp.year(),
            month: timestamp.month(),
            day: timestamp.day(),
            hour: timestamp.hour(),
        }
    }

    /// File name of this bucket's archive, e.g. `Logs_2024010210.zip`.
    pub fn archive_file_name(&self, prefix: &str) -> String {
        format!(
            "{}_{:04}{:02}{:02}{:02}.zip",
            prefix, self.year, self.month, self.day, self.hour
        )
    }
}

/// Errors local to one bucket or one entry. These are logged and
/// counted, never propagated; only enumeration failures end the run.
#[derive(Debug)]
pub enum ArchiveError {
    /// The bucket's archive file could not be opened for writing.
    Open { archive: PathBuf, reason: String },
    /// A single entry could not be written.
    Entry { file: PathBuf, reason: String },
    /// The archive's central directory could not be flushed.
    Finalize { archive: PathBuf, reason: String },
}

impl std::fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open { archive, reason } => {
                write!(f, "Failed to open archive {}: {}", archive.display(), reason)
            }
            Self::Entry { file, reason } => {
                write!(f, "Failed to archive {}: {}", file.display(), reason)
            }
            Self::Finalize { archive, reason } => {
                write!(
                    f,
                    "Failed to finalize archive {}: {}",
                    archive.display(),
                    reason
                )
            }
        }
    }
}

impl std::error::Error for ArchiveError {}

/// Archives the selected candidates into hourly zip buckets, then
/// deletes the originals of every fully written bucket.
///
/// Buckets are processed one at a time in chronological order; each
/// archive file is opened, written, and closed before the next bucket
/// starts. Per-entry failures mark the bucket incomplete: its remaining
/// entries are still attempted, but none of its originals are deleted.
/// The cancellation flag is observed between buckets so the bucket
/// currently being written always completes its write/delete cycle.
///
/// # Errors
///
/// Returns `SelectionError::Enumeration` when the candidate stream
/// fails at the enumeration level. Per-file failures are counted in
/// `counters.errors` instead.
pub fn archive_aged_files<I>(
    candidates: I,
    job: &ArchiveJob,
    cancel: &AtomicBool,
    counters: &mut RunCounters,
) -> Result<(), SelectionError>
where
    I: IntoIterator<Item = Result<FileCandidate, SelectionError>>,
{
    let buckets = group_into_buckets(candidates, counters)?;

    for (bucket, files) in &buckets {
        if cancel.load(Ordering::SeqCst) {
            OutputFormatter::warning("Cancellation requested, remaining buckets left untouched");
            break;
        }

        let archive_path = job
            .selection
            .target_dir
            .join(bucket.archive_file_name(&job.archive_prefix));
        OutputFormatter::info(&format!("Creating zip file {}...", archive_path.display()));

        let mut writer = match open_archive(&archive_path) {
            Ok(writer) => writer,
            Err(e) => {
                OutputFormatter::error(&e.to_string());
                counters.processed += files.len() as u64;
                counters.errors += files.len() as u64;
                continue;
            }
        };

        let mut bucket_complete = true;
        for candidate in files {
            counters.processed += 1;
            if counters.processed % job.selection.display_progress_after == 0 {
                OutputFormatter::progress(&format!(
                    "archived {}, deleted {}, errors {}, total processed {}",
                    counters.archived, counters.deleted, counters.errors, counters.processed
                ));
            }

            match append_entry(&mut writer, candidate, job.compression_level) {
                Ok(()) => counters.archived += 1,
                Err(e) => {
                    OutputFormatter::error(&e.to_string());
                    counters.errors += 1;
                    bucket_complete = false;
                }
            }
        }

        if let Err(e) = writer.finish() {
            let error = ArchiveError::Finalize {
                archive: archive_path.clone(),
                reason: e.to_string(),
            };
            OutputFormatter::error(&error.to_string());
            counters.errors += 1;
            bucket_complete = false;
        }

        // Write-before-delete: originals go away only once the whole
        // bucket is safely inside a finalized archive.
        if bucket_complete {
            OutputFormatter::info(&format!(
                "Deleting files added to zip file {}...",
                archive_path.display()
            ));
            for candidate in files {
                match fs::remove_file(&candidate.path) {
                    Ok(()) => counters.deleted += 1,
                    Err(e) => {
                        OutputFormatter::warning(&format!(
                            "Could not delete {}: {}",
                            candidate.path.display(),
                            e
                        ));
                        counters.errors += 1;
                    }
                }
            }
        } else {
            OutputFormatter::warning(&format!(
                "Zip file {} is incomplete, originals left in place",
                archive_path.display()
            ));
        }
    }

    Ok(())
}

/// Groups candidates by the calendar hour of their modified timestamp.
///
/// The map's ordering makes buckets process in chronological order.
/// Candidates whose metadata could not be read are counted as errors
/// and left out; an enumeration failure aborts the grouping.
fn group_into_buckets<I>(
    candidates: I,
    counters: &mut RunCounters,
) -> Result<BTreeMap<HourBucket, Vec<FileCandidate>>, SelectionError>
where
    I: IntoIterator<Item = Result<FileCandidate, SelectionError>>,
{
    let mut buckets: BTreeMap<HourBucket, Vec<FileCandidate>> = BTreeMap::new();

    for item in candidates {
        match item {
            Ok(candidate) => {
                buckets
                    .entry(HourBucket::of(candidate.last_modified))
                    .or_default()
                    .push(candidate);
            }
            Err(SelectionError::Metadata { path, source }) => {
                OutputFormatter::warning(&format!("Skipping {}: {}", path.display(), source));
                counters.errors += 1;
            }
            Err(err @ SelectionError::Enumeration { .. }) => return Err(err),
        }
    }

    Ok(buckets)
}

/// Opens a bucket's archive, appending when a previous run already
/// produced a non-empty file under the same name.
fn open_archive(path: &Path) -> Result<ZipWriter<File>, ArchiveError> {
    let open_error = |reason: String| ArchiveError::Open {
        archive: path.to_path_buf(),
        reason,
    };

    let has_existing_content = fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false);

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(path)
        .map_err(|e| open_error(e.to_string()))?;

    if has_existing_content {
        ZipWriter::new_append(file).map_err(|e| open_error(e.to_string()))
    } else {
        Ok(ZipWriter::new(file))
    }
}

/// Writes one candidate as a flat entry named by its base name, stamped
/// with its (clamped) modified time.
fn append_entry(
    writer: &mut ZipWriter<File>,
    candidate: &FileCandidate,
    compression: CompressionChoice,
) -> Result<(), ArchiveError> {
    let entry_error = |reason: String| ArchiveError::Entry {
        file: candidate.path.clone(),
        reason,
    };

    let name = candidate
        .path
        .file_name()
        .ok_or_else(|| entry_error("file has no name component".to_string()))?
        .to_string_lossy()
        .into_owned();

    // Open the input before starting the entry so an unreadable file
    // does not leave a half-written entry behind.
    let mut input = File::open(&candidate.path).map_err(|e| entry_error(e.to_string()))?;

    let options = SimpleFileOptions::default()
        .compression_method(compression.method())
        .compression_level(compression.level())
        .last_modified_time(zip_timestamp(candidate.last_modified));

    writer
        .start_file(name, options)
        .map_err(|e| entry_error(e.to_string()))?;
    io::copy(&mut input, writer).map_err(|e| entry_error(e.to_string()))?;

    Ok(())
}

/// Converts a modified timestamp into a zip entry timestamp.
///
/// The zip format cannot represent years outside [1980, 2107]; such
/// timestamps are replaced with the earliest representable date,
/// 1980-01-01 00:00:00, instead of failing the entry.
fn zip_timestamp(modified: DateTime<Local>) -> ZipDateTime {
    if modified.year() < ZIP_YEAR_MIN || modified.year() > ZIP_YEAR_MAX {
        return ZipDateTime::default();
    }

    ZipDateTime::from_date_and_time(
        modified.year() as u16,
        modified.month() as u8,
        modified.day() as u8,
        modified.hour() as u8,
        modified.minute() as u8,
        modified.second() as u8,
    )
    .unwrap_or_default()
}
