//! Output formatting and styling module.
//!
//! Provides a centralized interface for all CLI output: colored status
//! messages, interval progress lines, and summary formatting. Keeping it
//! in one place makes it easy to change formatting globally.

use colored::*;
use std::time::Duration;

/// Manages all CLI output with consistent styling and formatting.
///
/// This struct provides methods for:
/// - Success messages (green with ✓)
/// - Error messages (red with ✗)
/// - Warning messages (yellow with ⚠)
/// - Info messages (cyan)
/// - Dimmed interval progress lines
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    /// Prints a regular message without styling.
    pub fn plain(message: &str) {
        println!("{}", message);
    }

    /// Prints an interval progress line, dimmed so summaries stand out.
    pub fn progress(message: &str) {
        println!("{}", format!("… {}", message).dimmed());
    }
}

/// Formats elapsed wall time for summary lines, e.g. "4.21s" or "2m 05.0s".
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if secs >= 60.0 {
        let minutes = (secs / 60.0).floor() as u64;
        format!("{}m {:04.1}s", minutes, secs - (minutes as f64) * 60.0)
    } else {
        format!("{:.2}s", secs)
    }
}
