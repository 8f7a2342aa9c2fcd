//! Run defaults and file-protection rules.
//!
//! This module loads an optional TOML configuration file carrying two
//! things: default values for the CLI options, and exclusion rules that
//! protect matching files from being moved or archived. It supports:
//! - Exact filename matching
//! - Glob pattern matching
//! - File extension matching
//! - Regex pattern matching
//!
//! # Configuration File Format
//!
//! ```toml
//! [defaults]
//! min_age = 1
//! age_unit = "day"                  # day | hour | minute
//! display_progress_after = 5000
//! compression_level = "optimal"     # no-compression | fastest | optimal
//!
//! [exclude]
//! filenames = ["important.log"]
//! patterns = ["*.keep"]
//! extensions = ["lock"]
//! regex = ['^audit-']
//! ```
//!
//! All exclusion lists default to empty, so without a configuration file
//! every file matching the CLI pattern is eligible.

use crate::age_filter::AgeUnit;
use crate::archiver::CompressionChoice;
use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Errors that can occur during configuration loading and rule compilation.
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    ConfigNotFound(PathBuf),
    /// Invalid TOML syntax or structure.
    ConfigInvalid(String),
    /// Invalid glob pattern provided.
    InvalidGlobPattern(String),
    /// Invalid regex pattern provided with the actual error reason.
    InvalidRegexPattern {
        /// The regex pattern that failed to compile.
        pattern: String,
        /// The reason why the pattern is invalid.
        reason: String,
    },
    /// IO error while reading configuration.
    IoError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ConfigNotFound(path) => {
                write!(f, "Configuration file not found: {}", path.display())
            }
            ConfigError::ConfigInvalid(msg) => write!(f, "Invalid configuration: {}", msg),
            ConfigError::InvalidGlobPattern(pattern) => {
                write!(f, "Invalid glob pattern '{}'", pattern)
            }
            ConfigError::InvalidRegexPattern { pattern, reason } => {
                write!(f, "Invalid regex pattern '{}': {}", pattern, reason)
            }
            ConfigError::IoError(msg) => write!(f, "IO error reading configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Configuration loaded from a TOML file: CLI defaults plus exclusion
/// rules. CLI flags always override the `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetireConfig {
    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub exclude: ExcludeRules,
}

/// Default values for the CLI options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Defaults {
    /// Minimum file age; files younger than this are left alone.
    #[serde(default = "default_min_age")]
    pub min_age: u32,

    /// Unit the age is measured in.
    #[serde(default = "default_age_unit")]
    pub age_unit: AgeUnit,

    /// Print a progress line after this many processed files.
    #[serde(default = "default_display_progress_after")]
    pub display_progress_after: u64,

    /// Zip entry compression for the archive operation.
    #[serde(default = "default_compression_level")]
    pub compression_level: CompressionChoice,
}

fn default_min_age() -> u32 {
    1
}

fn default_age_unit() -> AgeUnit {
    AgeUnit::Day
}

fn default_display_progress_after() -> u64 {
    5000
}

fn default_compression_level() -> CompressionChoice {
    CompressionChoice::Optimal
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            min_age: default_min_age(),
            age_unit: default_age_unit(),
            display_progress_after: default_display_progress_after(),
            compression_level: default_compression_level(),
        }
    }
}

/// Rules protecting files from being moved or archived.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExcludeRules {
    /// Exact file names to protect (e.g., "important.log").
    #[serde(default)]
    pub filenames: Vec<String>,

    /// Glob patterns to protect (e.g., "*.keep").
    #[serde(default)]
    pub patterns: Vec<String>,

    /// File extensions to protect (case-insensitive, e.g., "lock").
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Regex patterns on the file name (for advanced users).
    #[serde(default)]
    pub regex: Vec<String>,
}

impl RetireConfig {
    /// Load configuration from a file, with fallback to defaults.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `.retirerc.toml` in the current directory
    /// 3. Look for `~/.config/retire/config.toml` in home directory
    /// 4. Fall back to default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is explicitly provided
    /// but cannot be read.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        // If explicitly specified, load from that path
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        // Try current directory
        let local_config = PathBuf::from(".retirerc.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        // Try home directory
        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("retire")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        // Fall back to defaults
        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ConfigNotFound` if file does not exist.
    /// Returns `ConfigError::ConfigInvalid` if TOML parsing fails.
    /// Returns `ConfigError::IoError` if file cannot be read.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }
}

impl Default for RetireConfig {
    fn default() -> Self {
        Self {
            defaults: Defaults::default(),
            exclude: ExcludeRules::default(),
        }
    }
}

impl ExcludeRules {
    /// Compile the rules into optimized structures for matching.
    ///
    /// # Errors
    ///
    /// Returns an error if any regex or glob patterns are invalid.
    pub fn compile(&self) -> Result<CompiledExclusions, ConfigError> {
        let patterns = self
            .patterns
            .iter()
            .map(|pattern| {
                Pattern::new(pattern).map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let regexes = self
            .regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CompiledExclusions {
            filenames: self.filenames.iter().cloned().collect(),
            extensions: self
                .extensions
                .iter()
                .map(|ext| ext.to_lowercase())
                .collect(),
            patterns,
            regexes,
        })
    }
}

/// Compiled, optimized exclusion rules for efficient file matching.
///
/// Patterns are pre-compiled once per invocation so matching each file
/// only costs set lookups plus one pass over the compiled rules.
pub struct CompiledExclusions {
    filenames: HashSet<String>,
    extensions: HashSet<String>,
    patterns: Vec<Pattern>,
    regexes: Vec<Regex>,
}

impl CompiledExclusions {
    /// Check whether a file name is protected by any rule.
    ///
    /// Checks are performed in this order, with early termination:
    /// 1. Exact filename match
    /// 2. File extension match
    /// 3. Glob pattern match
    /// 4. Regex pattern match
    pub fn is_excluded(&self, file_name: &str) -> bool {
        if self.filenames.contains(file_name) {
            return true;
        }

        if let Some(ext) = Path::new(file_name).extension() {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            if self.extensions.contains(&ext_lower) {
                return true;
            }
        }

        if self.patterns.iter().any(|pattern| pattern.matches(file_name)) {
            return true;
        }

        self.regexes.iter().any(|regex| regex.is_match(file_name))
    }
}
