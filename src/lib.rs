//! retire - an age-based file lifecycle utility
//!
//! This library moves or zip-archives the files in a directory whose
//! last-modified timestamp is older than a configurable cutoff.
//! Archived files are grouped into hourly zip buckets and the originals
//! are deleted only after their bucket has been fully written.

pub mod age_filter;
pub mod archiver;
pub mod cli;
pub mod config;
pub mod job;
pub mod mover;
pub mod output;

pub use age_filter::{AgeUnit, FileCandidate, SelectionError};
pub use archiver::{CompressionChoice, HourBucket};
pub use config::{CompiledExclusions, ConfigError, ExcludeRules, RetireConfig};
pub use job::{ArchiveJob, MoveJob, RunCounters, SelectionParams};

pub use cli::{Cli, run};
