//! Overwrite-capable moving of aged files.
//!
//! Each candidate is handled independently: one locked, vanished, or
//! unreadable file increments the error counter and the batch moves on.
//! Nothing short of an enumeration failure stops the run.

use crate::age_filter::{FileCandidate, SelectionError};
use crate::job::{MoveJob, RunCounters};
use crate::output::OutputFormatter;
use chrono::{DateTime, Local};
use std::fs;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

/// Moves the selected candidates into the target directory.
///
/// Per candidate, in enumeration order: observe the cancellation flag,
/// re-read the file's current modified time and skip it when it is
/// strictly newer than `cutoff` (the selection snapshot may be stale by
/// the time the file is reached), then attempt an overwrite move to
/// `{target_dir}/{file_name}`.
///
/// # Errors
///
/// Returns `SelectionError::Enumeration` when the candidate stream
/// fails at the enumeration level. Per-file failures are counted in
/// `counters.errors` instead.
pub fn move_aged_files<I>(
    candidates: I,
    job: &MoveJob,
    cutoff: DateTime<Local>,
    cancel: &AtomicBool,
    counters: &mut RunCounters,
) -> Result<(), SelectionError>
where
    I: IntoIterator<Item = Result<FileCandidate, SelectionError>>,
{
    for item in candidates {
        if cancel.load(Ordering::SeqCst) {
            OutputFormatter::warning("Cancellation requested, remaining files left untouched");
            break;
        }

        let candidate = match item {
            Ok(candidate) => candidate,
            Err(SelectionError::Metadata { path, source }) => {
                OutputFormatter::warning(&format!("Skipping {}: {}", path.display(), source));
                counters.errors += 1;
                continue;
            }
            Err(err @ SelectionError::Enumeration { .. }) => return Err(err),
        };

        counters.processed += 1;
        if counters.processed % job.selection.display_progress_after == 0 {
            OutputFormatter::progress(&format!(
                "moved {}, skipped {}, errors {}, total processed {}",
                counters.moved, counters.skipped, counters.errors, counters.processed
            ));
        }

        // The candidate's timestamp comes from the enumeration snapshot;
        // re-read it so a file touched since then is not moved away.
        match fs::metadata(&candidate.path).and_then(|meta| meta.modified()) {
            Ok(modified) if DateTime::<Local>::from(modified) > cutoff => {
                counters.skipped += 1;
                continue;
            }
            Ok(_) => {}
            Err(e) => {
                OutputFormatter::warning(&format!(
                    "Skipping {}: {}",
                    candidate.path.display(),
                    e
                ));
                counters.errors += 1;
                continue;
            }
        }

        let Some(file_name) = candidate.path.file_name() else {
            counters.errors += 1;
            continue;
        };
        let target_path = job.selection.target_dir.join(file_name);

        match move_file(&candidate.path, &target_path) {
            Ok(()) => counters.moved += 1,
            Err(e) => {
                OutputFormatter::warning(&format!(
                    "Could not move {} to {}: {}",
                    candidate.path.display(),
                    target_path.display(),
                    e
                ));
                counters.errors += 1;
            }
        }
    }

    Ok(())
}

/// Moves `source` to `target`, replacing any existing file there. Falls
/// back to copy-and-remove when a plain rename is not possible, e.g.
/// for a target on another filesystem.
fn move_file(source: &Path, target: &Path) -> io::Result<()> {
    if fs::rename(source, target).is_ok() {
        return Ok(());
    }

    fs::copy(source, target)?;
    fs::remove_file(source)
}
