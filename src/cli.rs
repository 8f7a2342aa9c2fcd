//! Command-line interface module.
//!
//! This module handles all CLI-related functionality including:
//! - Argument parsing (clap derive)
//! - Merging config-file defaults with command-line flags
//! - Directory and pattern validation
//! - Operation orchestration
//! - The final summary, printed exactly once per invocation

use crate::age_filter::{self, AgeUnit};
use crate::archiver::{self, CompressionChoice};
use crate::config::{CompiledExclusions, RetireConfig};
use crate::job::{ArchiveJob, MoveJob, RunCounters, SelectionParams};
use crate::mover;
use crate::output::{OutputFormatter, format_elapsed};
use chrono::Local;
use clap::{Parser, Subcommand};
use glob::Pattern;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::time::Instant;

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(
    name = "retire",
    version,
    about = "Move or zip-archive files that have aged past a retention cutoff"
)]
pub struct Cli {
    /// Path to a TOML file with defaults and exclusion rules
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// The two operations offered by the tool.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Zip files older than the cutoff into hourly archives, then delete the originals
    Archive {
        /// Source directory path
        source_dir: PathBuf,

        /// Target directory path
        target_dir: PathBuf,

        /// Glob applied to file names in the source directory
        pattern: String,

        /// Prefix of the generated zip file names
        archive_prefix: String,

        /// Minimum age of selected files, in --age-unit units
        #[arg(long)]
        min_age: Option<u32>,

        /// Unit the age is measured in
        #[arg(long, value_enum)]
        age_unit: Option<AgeUnit>,

        /// Print a progress line after this many processed files
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        display_progress_after: Option<u64>,

        /// Zip entry compression
        #[arg(long, value_enum)]
        compression_level: Option<CompressionChoice>,
    },

    /// Move files older than the cutoff to the target directory
    Move {
        /// Source directory path
        source_dir: PathBuf,

        /// Target directory path
        target_dir: PathBuf,

        /// Glob applied to file names in the source directory
        pattern: String,

        /// Minimum age of selected files, in --age-unit units
        #[arg(long)]
        min_age: Option<u32>,

        /// Unit the age is measured in
        #[arg(long, value_enum)]
        age_unit: Option<AgeUnit>,

        /// Print a progress line after this many processed files
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        display_progress_after: Option<u64>,
    },
}

/// Runs the selected operation.
///
/// Loads the configuration, validates directories and patterns before
/// anything is touched, then hands off to the move or archive run. Any
/// returned message ends the process with a non-zero status; per-file
/// errors do not surface here.
pub fn run(cli: Cli, cancel: &AtomicBool) -> Result<(), String> {
    let config = RetireConfig::load(cli.config.as_deref())
        .map_err(|e| format!("Error loading configuration: {}", e))?;
    let exclusions = config
        .exclude
        .compile()
        .map_err(|e| format!("Error compiling exclusion rules: {}", e))?;

    match cli.command {
        Command::Archive {
            source_dir,
            target_dir,
            pattern,
            archive_prefix,
            min_age,
            age_unit,
            display_progress_after,
            compression_level,
        } => {
            let selection = build_selection(
                &config,
                source_dir,
                target_dir,
                &pattern,
                min_age,
                age_unit,
                display_progress_after,
            )?;
            let job = ArchiveJob {
                selection,
                archive_prefix,
                compression_level: compression_level
                    .unwrap_or(config.defaults.compression_level),
            };
            run_archive(&job, &exclusions, cancel)
        }
        Command::Move {
            source_dir,
            target_dir,
            pattern,
            min_age,
            age_unit,
            display_progress_after,
        } => {
            let selection = build_selection(
                &config,
                source_dir,
                target_dir,
                &pattern,
                min_age,
                age_unit,
                display_progress_after,
            )?;
            let job = MoveJob { selection };
            run_move(&job, &exclusions, cancel)
        }
    }
}

/// Validates the shared arguments and merges them with the configured
/// defaults. Nothing on disk is touched until this has succeeded.
fn build_selection(
    config: &RetireConfig,
    source_dir: PathBuf,
    target_dir: PathBuf,
    pattern: &str,
    min_age: Option<u32>,
    age_unit: Option<AgeUnit>,
    display_progress_after: Option<u64>,
) -> Result<SelectionParams, String> {
    if !source_dir.is_dir() {
        return Err(format!(
            "Missing or invalid source directory: {}",
            source_dir.display()
        ));
    }
    if !target_dir.is_dir() {
        return Err(format!(
            "Missing or invalid target directory: {}",
            target_dir.display()
        ));
    }

    let pattern =
        Pattern::new(pattern).map_err(|e| format!("Invalid file pattern '{}': {}", pattern, e))?;

    let defaults = &config.defaults;
    let display_progress_after =
        display_progress_after.unwrap_or(defaults.display_progress_after);
    if display_progress_after == 0 {
        return Err("display_progress_after must be at least 1".to_string());
    }

    Ok(SelectionParams {
        source_dir,
        target_dir,
        pattern,
        min_age: min_age.unwrap_or(defaults.min_age),
        age_unit: age_unit.unwrap_or(defaults.age_unit),
        display_progress_after,
    })
}

fn run_move(job: &MoveJob, exclusions: &CompiledExclusions, cancel: &AtomicBool) -> Result<(), String> {
    let reference = Local::now();
    let cutoff = job
        .selection
        .cutoff(reference)
        .ok_or_else(|| cutoff_out_of_range(job.selection.min_age, job.selection.age_unit))?;

    OutputFormatter::info(&format!(
        "Moving files older than {} from {} to {} matching {}",
        cutoff.format("%Y-%m-%d %H:%M"),
        job.selection.source_dir.display(),
        job.selection.target_dir.display(),
        job.selection.pattern.as_str()
    ));

    let started = Instant::now();
    let mut counters = RunCounters::default();
    let result = age_filter::scan(
        &job.selection.source_dir,
        &job.selection.pattern,
        exclusions,
        cutoff,
    )
    .and_then(|candidates| mover::move_aged_files(candidates, job, cutoff, cancel, &mut counters));

    // The summary goes out on every path, fatal errors included.
    OutputFormatter::plain(&format!(
        "Moved {}, skipped {}, errors {}, total processed {} in {}",
        counters.moved,
        counters.skipped,
        counters.errors,
        counters.processed,
        format_elapsed(started.elapsed())
    ));

    result.map_err(|e| e.to_string())?;
    finish(&counters);
    Ok(())
}

fn run_archive(
    job: &ArchiveJob,
    exclusions: &CompiledExclusions,
    cancel: &AtomicBool,
) -> Result<(), String> {
    let reference = Local::now();
    let cutoff = job
        .selection
        .cutoff(reference)
        .ok_or_else(|| cutoff_out_of_range(job.selection.min_age, job.selection.age_unit))?;

    OutputFormatter::info(&format!(
        "Archiving files older than {} from {} to {} matching {} with archive prefix {}",
        cutoff.format("%Y-%m-%d %H:%M"),
        job.selection.source_dir.display(),
        job.selection.target_dir.display(),
        job.selection.pattern.as_str(),
        job.archive_prefix
    ));

    let started = Instant::now();
    let mut counters = RunCounters::default();
    let result = age_filter::scan(
        &job.selection.source_dir,
        &job.selection.pattern,
        exclusions,
        cutoff,
    )
    .and_then(|candidates| archiver::archive_aged_files(candidates, job, cancel, &mut counters));

    // The summary goes out on every path, fatal errors included.
    OutputFormatter::plain(&format!(
        "Archived {}, deleted {}, errors {}, total processed {} in {}",
        counters.archived,
        counters.deleted,
        counters.errors,
        counters.processed,
        format_elapsed(started.elapsed())
    ));

    result.map_err(|e| e.to_string())?;
    finish(&counters);
    Ok(())
}

fn cutoff_out_of_range(min_age: u32, age_unit: AgeUnit) -> String {
    format!("An age of {} {}(s) is out of range", min_age, age_unit)
}

fn finish(counters: &RunCounters) {
    if counters.errors > 0 {
        OutputFormatter::warning(&format!(
            "{} file(s) could not be processed",
            counters.errors
        ));
    } else {
        OutputFormatter::success("Done");
    }
}
