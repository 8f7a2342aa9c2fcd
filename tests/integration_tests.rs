/// Integration tests for retire
///
/// These tests simulate real-world usage scenarios, driving the full
/// CLI pipeline (validation, selection, operation, summary) against
/// temporary directories.
///
/// Test categories:
/// 1. Archive workflows (bucketing, append, idempotent re-runs)
/// 2. Timestamp handling (strict cutoff, zip date clamping)
/// 3. Move workflows (overwrite, skip, content preservation)
/// 4. Configuration and exclusion rules
/// 5. Validation and error scenarios
use chrono::{DateTime, Local, TimeZone};
use retire::cli::{Cli, Command, run};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::time::SystemTime;
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

/// A test fixture holding a source and a target directory.
struct TestFixture {
    source_dir: TempDir,
    target_dir: TempDir,
}

impl TestFixture {
    /// Create a new fixture with empty source and target directories.
    fn new() -> Self {
        TestFixture {
            source_dir: TempDir::new().expect("Failed to create source directory"),
            target_dir: TempDir::new().expect("Failed to create target directory"),
        }
    }

    fn source(&self) -> &Path {
        self.source_dir.path()
    }

    fn target(&self) -> &Path {
        self.target_dir.path()
    }

    /// Create a file in the source directory with a fixed modified time.
    fn create_aged_file(&self, name: &str, content: &[u8], mtime: DateTime<Local>) -> PathBuf {
        let path = self.source().join(name);
        fs::write(&path, content).expect("Failed to write file");
        set_mtime(&path, mtime);
        path
    }

    /// Run the archive command over the fixture directories.
    fn run_archive(&self, pattern: &str, prefix: &str, min_age: u32) -> Result<(), String> {
        self.run_archive_with_config(pattern, prefix, min_age, None)
    }

    fn run_archive_with_config(
        &self,
        pattern: &str,
        prefix: &str,
        min_age: u32,
        config: Option<PathBuf>,
    ) -> Result<(), String> {
        let cli = Cli {
            config,
            command: Command::Archive {
                source_dir: self.source().to_path_buf(),
                target_dir: self.target().to_path_buf(),
                pattern: pattern.to_string(),
                archive_prefix: prefix.to_string(),
                min_age: Some(min_age),
                age_unit: None,
                display_progress_after: None,
                compression_level: None,
            },
        };
        run(cli, &AtomicBool::new(false))
    }

    /// Run the move command over the fixture directories.
    fn run_move(&self, pattern: &str, min_age: u32) -> Result<(), String> {
        let cli = Cli {
            config: None,
            command: Command::Move {
                source_dir: self.source().to_path_buf(),
                target_dir: self.target().to_path_buf(),
                pattern: pattern.to_string(),
                min_age: Some(min_age),
                age_unit: None,
                display_progress_after: None,
            },
        };
        run(cli, &AtomicBool::new(false))
    }

    /// Names of all regular files left in the source directory.
    fn source_files(&self) -> Vec<String> {
        list_file_names(self.source())
    }

    /// Names of all regular files in the target directory.
    fn target_files(&self) -> Vec<String> {
        list_file_names(self.target())
    }
}

fn set_mtime(path: &Path, mtime: DateTime<Local>) {
    let file = fs::OpenOptions::new()
        .write(true)
        .open(path)
        .expect("Failed to open file");
    file.set_modified(SystemTime::from(mtime))
        .expect("Failed to set mtime");
}

fn list_file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("Failed to read directory")
        .filter_map(|entry| {
            let entry = entry.ok()?;
            if entry.file_type().ok()?.is_file() {
                Some(entry.file_name().to_string_lossy().into_owned())
            } else {
                None
            }
        })
        .collect();
    names.sort();
    names
}

fn local(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Local> {
    Local
        .with_ymd_and_hms(y, mo, d, h, mi, s)
        .single()
        .expect("Failed to build local timestamp")
}

/// Sorted entry names of a zip archive.
fn archive_entry_names(archive_path: &Path) -> Vec<String> {
    let file = File::open(archive_path).expect("Failed to open archive");
    let archive = zip::ZipArchive::new(file).expect("Failed to read archive");
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    names
}

fn read_archive_entry(archive_path: &Path, entry_name: &str) -> Vec<u8> {
    let file = File::open(archive_path).expect("Failed to open archive");
    let mut archive = zip::ZipArchive::new(file).expect("Failed to read archive");
    let mut entry = archive
        .by_name(entry_name)
        .expect("Entry should exist in archive");
    let mut content = Vec::new();
    entry
        .read_to_end(&mut content)
        .expect("Failed to read entry");
    content
}

// ============================================================================
// Test Suite 1: Archive Workflows
// ============================================================================

#[test]
fn test_archive_groups_same_hour_files_into_one_archive() {
    let fixture = TestFixture::new();
    fixture.create_aged_file("a.log", b"alpha", local(2024, 1, 1, 10, 15, 0));
    fixture.create_aged_file("b.log", b"bravo", local(2024, 1, 1, 10, 45, 0));

    fixture
        .run_archive("*.log", "Logs", 1)
        .expect("Archive run should succeed");

    assert_eq!(fixture.target_files(), vec!["Logs_2024010110.zip"]);
    let archive_path = fixture.target().join("Logs_2024010110.zip");
    assert_eq!(archive_entry_names(&archive_path), vec!["a.log", "b.log"]);
    assert_eq!(read_archive_entry(&archive_path, "a.log"), b"alpha");
    assert_eq!(read_archive_entry(&archive_path, "b.log"), b"bravo");
    assert!(fixture.source_files().is_empty(), "Source should be empty");
}

#[test]
fn test_archive_splits_different_hours_into_different_archives() {
    let fixture = TestFixture::new();
    fixture.create_aged_file("early.log", b"early", local(2024, 1, 1, 9, 59, 59));
    fixture.create_aged_file("late.log", b"late", local(2024, 1, 1, 10, 0, 0));
    fixture.create_aged_file("next-day.log", b"next", local(2024, 1, 2, 10, 30, 0));

    fixture
        .run_archive("*.log", "Logs", 1)
        .expect("Archive run should succeed");

    assert_eq!(
        fixture.target_files(),
        vec![
            "Logs_2024010109.zip",
            "Logs_2024010110.zip",
            "Logs_2024010210.zip"
        ]
    );
    assert_eq!(
        archive_entry_names(&fixture.target().join("Logs_2024010109.zip")),
        vec!["early.log"]
    );
    assert_eq!(
        archive_entry_names(&fixture.target().join("Logs_2024010110.zip")),
        vec!["late.log"]
    );
    assert!(fixture.source_files().is_empty());
}

#[test]
fn test_archive_appends_to_archives_from_a_previous_run() {
    let fixture = TestFixture::new();
    fixture.create_aged_file("first.log", b"one", local(2024, 1, 1, 10, 15, 0));
    fixture
        .run_archive("*.log", "Logs", 1)
        .expect("First run should succeed");

    fixture.create_aged_file("second.log", b"two", local(2024, 1, 1, 10, 50, 0));
    fixture
        .run_archive("*.log", "Logs", 1)
        .expect("Second run should succeed");

    let archive_path = fixture.target().join("Logs_2024010110.zip");
    assert_eq!(
        archive_entry_names(&archive_path),
        vec!["first.log", "second.log"]
    );
    assert_eq!(read_archive_entry(&archive_path, "first.log"), b"one");
    assert_eq!(read_archive_entry(&archive_path, "second.log"), b"two");
}

#[test]
fn test_archive_rerun_on_emptied_source_is_idempotent() {
    let fixture = TestFixture::new();
    fixture.create_aged_file("a.log", b"alpha", local(2024, 1, 1, 10, 15, 0));

    fixture
        .run_archive("*.log", "Logs", 1)
        .expect("First run should succeed");
    let archive_path = fixture.target().join("Logs_2024010110.zip");
    let before = archive_entry_names(&archive_path);

    fixture
        .run_archive("*.log", "Logs", 1)
        .expect("Second run should succeed");

    assert_eq!(archive_entry_names(&archive_path), before);
    assert!(fixture.source_files().is_empty());
}

#[test]
fn test_archive_on_empty_source_directory_succeeds() {
    let fixture = TestFixture::new();

    fixture
        .run_archive("*.log", "Logs", 1)
        .expect("Empty run should succeed");

    assert!(fixture.target_files().is_empty(), "No archives expected");
}

#[test]
fn test_archive_pattern_matching_nothing_is_not_an_error() {
    let fixture = TestFixture::new();
    fixture.create_aged_file("data.txt", b"text", local(2024, 1, 1, 10, 15, 0));

    fixture
        .run_archive("*.log", "Logs", 1)
        .expect("Run should succeed");

    assert!(fixture.target_files().is_empty());
    assert_eq!(fixture.source_files(), vec!["data.txt"]);
}

// ============================================================================
// Test Suite 2: Timestamp Handling
// ============================================================================

#[test]
fn test_archive_entry_keeps_the_file_timestamp() {
    let fixture = TestFixture::new();
    fixture.create_aged_file("a.log", b"alpha", local(2024, 3, 5, 14, 20, 10));

    fixture
        .run_archive("*.log", "Logs", 1)
        .expect("Archive run should succeed");

    let archive_path = fixture.target().join("Logs_2024030514.zip");
    let file = File::open(&archive_path).expect("Failed to open archive");
    let mut archive = zip::ZipArchive::new(file).expect("Failed to read archive");
    let entry = archive.by_name("a.log").expect("Entry should exist");
    let stamped = entry
        .last_modified()
        .expect("Entry should carry a timestamp");

    assert_eq!(stamped.year(), 2024);
    assert_eq!(stamped.month(), 3);
    assert_eq!(stamped.day(), 5);
    assert_eq!(stamped.hour(), 14);
    assert_eq!(stamped.minute(), 20);
}

#[test]
fn test_archive_clamps_pre_1980_timestamps_to_the_zip_epoch() {
    let fixture = TestFixture::new();
    fixture.create_aged_file("ancient.log", b"old", local(1975, 6, 1, 8, 30, 0));

    fixture
        .run_archive("*.log", "Logs", 1)
        .expect("Archive run should succeed");

    // The bucket is still derived from the real modified time; only the
    // entry's stored timestamp is clamped.
    let archive_path = fixture.target().join("Logs_1975060108.zip");
    let file = File::open(&archive_path).expect("Failed to open archive");
    let mut archive = zip::ZipArchive::new(file).expect("Failed to read archive");
    let entry = archive.by_name("ancient.log").expect("Entry should exist");
    let stamped = entry
        .last_modified()
        .expect("Entry should carry a timestamp");

    assert_eq!(stamped.year(), 1980);
    assert_eq!(stamped.month(), 1);
    assert_eq!(stamped.day(), 1);
    assert_eq!(stamped.hour(), 0);
    assert_eq!(stamped.minute(), 0);
    assert_eq!(stamped.second(), 0);
    assert!(fixture.source_files().is_empty());
}

#[test]
fn test_archive_only_takes_files_strictly_older_than_the_cutoff() {
    let fixture = TestFixture::new();
    fixture.create_aged_file("old.log", b"old", local(2024, 1, 1, 10, 15, 0));
    // Modified "now"-ish: with min-age 0 the cutoff is the reference
    // instant, so a file stamped past it must stay.
    let fresh = fixture.source().join("fresh.log");
    fs::write(&fresh, b"fresh").expect("Failed to write file");
    set_mtime(&fresh, Local::now() + chrono::Duration::minutes(5));

    fixture
        .run_archive("*.log", "Logs", 0)
        .expect("Archive run should succeed");

    assert_eq!(fixture.source_files(), vec!["fresh.log"]);
    assert_eq!(
        archive_entry_names(&fixture.target().join("Logs_2024010110.zip")),
        vec!["old.log"]
    );
}

// ============================================================================
// Test Suite 3: Move Workflows
// ============================================================================

#[test]
fn test_move_transfers_old_files_and_preserves_content() {
    let fixture = TestFixture::new();
    fixture.create_aged_file("a.log", b"alpha", local(2024, 1, 1, 10, 15, 0));
    fixture.create_aged_file("b.log", b"bravo", local(2024, 2, 1, 11, 0, 0));

    fixture.run_move("*.log", 1).expect("Move run should succeed");

    assert!(fixture.source_files().is_empty());
    assert_eq!(fixture.target_files(), vec!["a.log", "b.log"]);
    assert_eq!(
        fs::read(fixture.target().join("a.log")).expect("Failed to read moved file"),
        b"alpha"
    );
    assert_eq!(
        fs::read(fixture.target().join("b.log")).expect("Failed to read moved file"),
        b"bravo"
    );
}

#[test]
fn test_move_overwrites_an_existing_target_file() {
    let fixture = TestFixture::new();
    fs::write(fixture.target().join("a.log"), b"stale").expect("Failed to write file");
    fixture.create_aged_file("a.log", b"fresh", local(2024, 1, 1, 10, 15, 0));

    fixture.run_move("*.log", 1).expect("Move run should succeed");

    assert_eq!(
        fs::read(fixture.target().join("a.log")).expect("Failed to read moved file"),
        b"fresh"
    );
    assert!(fixture.source_files().is_empty());
}

#[test]
fn test_move_leaves_files_newer_than_the_cutoff() {
    let fixture = TestFixture::new();
    // Modified "now": far younger than the one-day default cutoff.
    fs::write(fixture.source().join("today.log"), b"today").expect("Failed to write file");
    fixture.create_aged_file("old.log", b"old", local(2024, 1, 1, 10, 15, 0));

    fixture.run_move("*.log", 1).expect("Move run should succeed");

    assert_eq!(fixture.source_files(), vec!["today.log"]);
    assert_eq!(fixture.target_files(), vec!["old.log"]);
}

#[test]
fn test_move_with_zero_age_requires_strictly_older_files() {
    let fixture = TestFixture::new();
    let file = fixture.source().join("boundary.log");
    fs::write(&file, b"data").expect("Failed to write file");
    // Stamped just past the reference instant taken when the run starts.
    set_mtime(&file, Local::now() + chrono::Duration::minutes(5));

    fixture.run_move("*.log", 0).expect("Move run should succeed");

    assert_eq!(fixture.source_files(), vec!["boundary.log"]);
    assert!(fixture.target_files().is_empty());
}

#[test]
fn test_move_respects_the_name_pattern() {
    let fixture = TestFixture::new();
    fixture.create_aged_file("app.log", b"log", local(2024, 1, 1, 10, 15, 0));
    fixture.create_aged_file("notes.txt", b"text", local(2024, 1, 1, 10, 15, 0));

    fixture.run_move("*.log", 1).expect("Move run should succeed");

    assert_eq!(fixture.source_files(), vec!["notes.txt"]);
    assert_eq!(fixture.target_files(), vec!["app.log"]);
}

// ============================================================================
// Test Suite 4: Configuration and Exclusions
// ============================================================================

#[test]
fn test_archive_leaves_files_protected_by_exclusion_rules() {
    let fixture = TestFixture::new();
    fixture.create_aged_file("app.log", b"app", local(2024, 1, 1, 10, 15, 0));
    fixture.create_aged_file("audit.log", b"audit", local(2024, 1, 1, 10, 15, 0));

    let config_dir = TempDir::new().expect("Failed to create config directory");
    let config_path = config_dir.path().join("retire.toml");
    fs::write(
        &config_path,
        r#"
        [exclude]
        filenames = ["audit.log"]
    "#,
    )
    .expect("Failed to write config");

    fixture
        .run_archive_with_config("*.log", "Logs", 1, Some(config_path))
        .expect("Archive run should succeed");

    assert_eq!(fixture.source_files(), vec!["audit.log"]);
    assert_eq!(
        archive_entry_names(&fixture.target().join("Logs_2024010110.zip")),
        vec!["app.log"]
    );
}

#[test]
fn test_config_file_supplies_the_default_age() {
    let fixture = TestFixture::new();
    // Old enough for a one-minute cutoff, far too young for the
    // configured thirty-day default.
    let file = fixture.source().join("recent.log");
    fs::write(&file, b"recent").expect("Failed to write file");
    set_mtime(&file, Local::now() - chrono::Duration::hours(2));

    let config_dir = TempDir::new().expect("Failed to create config directory");
    let config_path = config_dir.path().join("retire.toml");
    fs::write(
        &config_path,
        r#"
        [defaults]
        min_age = 30
        age_unit = "day"
    "#,
    )
    .expect("Failed to write config");

    let cli = Cli {
        config: Some(config_path),
        command: Command::Move {
            source_dir: fixture.source().to_path_buf(),
            target_dir: fixture.target().to_path_buf(),
            pattern: "*.log".to_string(),
            min_age: None,
            age_unit: None,
            display_progress_after: None,
        },
    };
    run(cli, &AtomicBool::new(false)).expect("Move run should succeed");

    assert_eq!(fixture.source_files(), vec!["recent.log"]);
    assert!(fixture.target_files().is_empty());
}

#[test]
fn test_missing_explicit_config_file_is_a_fatal_error() {
    let fixture = TestFixture::new();
    fixture.create_aged_file("a.log", b"alpha", local(2024, 1, 1, 10, 15, 0));

    let result = fixture.run_archive_with_config(
        "*.log",
        "Logs",
        1,
        Some(PathBuf::from("/nonexistent/retire.toml")),
    );

    assert!(result.is_err());
    assert_eq!(fixture.source_files(), vec!["a.log"]);
}

// ============================================================================
// Test Suite 5: Validation and Error Scenarios
// ============================================================================

#[test]
fn test_missing_source_directory_fails_before_any_mutation() {
    let target = TempDir::new().expect("Failed to create temp directory");

    let cli = Cli {
        config: None,
        command: Command::Archive {
            source_dir: PathBuf::from("/nonexistent/retire-source"),
            target_dir: target.path().to_path_buf(),
            pattern: "*.log".to_string(),
            archive_prefix: "Logs".to_string(),
            min_age: Some(1),
            age_unit: None,
            display_progress_after: None,
            compression_level: None,
        },
    };

    let result = run(cli, &AtomicBool::new(false));

    let message = result.expect_err("Validation should fail");
    assert!(message.contains("source directory"));
    assert!(list_file_names(target.path()).is_empty());
}

#[test]
fn test_missing_target_directory_fails_before_any_mutation() {
    let fixture = TestFixture::new();
    fixture.create_aged_file("a.log", b"alpha", local(2024, 1, 1, 10, 15, 0));

    let cli = Cli {
        config: None,
        command: Command::Move {
            source_dir: fixture.source().to_path_buf(),
            target_dir: PathBuf::from("/nonexistent/retire-target"),
            pattern: "*.log".to_string(),
            min_age: Some(1),
            age_unit: None,
            display_progress_after: None,
        },
    };

    let result = run(cli, &AtomicBool::new(false));

    let message = result.expect_err("Validation should fail");
    assert!(message.contains("target directory"));
    assert_eq!(fixture.source_files(), vec!["a.log"]);
}

#[test]
fn test_subdirectories_in_the_source_are_ignored() {
    let fixture = TestFixture::new();
    fixture.create_aged_file("top.log", b"top", local(2024, 1, 1, 10, 15, 0));
    let nested_dir = fixture.source().join("nested");
    fs::create_dir(&nested_dir).expect("Failed to create subdirectory");
    let nested = nested_dir.join("inner.log");
    fs::write(&nested, b"inner").expect("Failed to write file");
    set_mtime(&nested, local(2024, 1, 1, 10, 15, 0));

    fixture
        .run_archive("*.log", "Logs", 1)
        .expect("Archive run should succeed");

    assert!(nested.exists(), "Nested files must not be touched");
    assert_eq!(
        archive_entry_names(&fixture.target().join("Logs_2024010110.zip")),
        vec!["top.log"]
    );
}

#[cfg(unix)]
#[test]
fn test_archive_keeps_originals_of_an_incomplete_bucket() {
    use std::os::unix::fs::PermissionsExt;

    // Running as root bypasses permission checks, so the scenario
    // cannot be reproduced there.
    if effective_uid() == 0 {
        return;
    }

    let fixture = TestFixture::new();
    fixture.create_aged_file("good.log", b"good", local(2024, 1, 1, 10, 15, 0));
    let locked = fixture.create_aged_file("locked.log", b"locked", local(2024, 1, 1, 10, 45, 0));
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000))
        .expect("Failed to set permissions");

    fixture
        .run_archive("*.log", "Logs", 1)
        .expect("Archive run should still succeed");

    // The unreadable file poisoned its bucket: nothing in that hour is
    // deleted, even entries that were written.
    let mut remaining = fixture.source_files();
    remaining.sort();
    assert_eq!(remaining, vec!["good.log", "locked.log"]);

    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644))
        .expect("Failed to restore permissions");
}

#[cfg(unix)]
fn effective_uid() -> u32 {
    // Effective uid via /proc; good enough to detect a root test runner.
    fs::read_to_string("/proc/self/status")
        .ok()
        .and_then(|status| {
            status.lines().find_map(|line| {
                line.strip_prefix("Uid:")
                    .and_then(|rest| rest.split_whitespace().nth(1))
                    .and_then(|uid| uid.parse().ok())
            })
        })
        .unwrap_or(u32::MAX)
}
