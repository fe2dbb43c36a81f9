use datetidy::cli::{Disposition, Options, run, run_with_extractor};
use datetidy::config::{CompiledFilters, Config};
use datetidy::file_organizer::OrganizeError;
use datetidy::metadata::{MetadataError, MetadataExtractor, MetadataFields, MetadataValue};
/// Integration tests for datetidy
///
/// These tests drive complete runs against temporary source and destination
/// trees and check the resulting layout on disk.
///
/// Test categories:
/// 1. Basic placement
/// 2. Duplicates and collisions
/// 3. Dry-run mode
/// 4. Age filter and recursion
/// 5. Metadata timestamps and filters
/// 6. Edge cases and error scenarios
use filetime::FileTime;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

/// 2023-06-15 12:00:00 UTC, mid-month in every time zone.
const JUNE_2023: i64 = 1_686_830_400;

/// 2022-01-15 12:00:00 UTC.
const JANUARY_2022: i64 = 1_642_248_000;

/// A source and a destination directory inside one temporary directory.
struct TestFixture {
    temp_dir: TempDir,
}

impl TestFixture {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        fs::create_dir(temp_dir.path().join("src")).expect("Failed to create src");
        fs::create_dir(temp_dir.path().join("dst")).expect("Failed to create dst");
        TestFixture { temp_dir }
    }

    fn src(&self) -> PathBuf {
        self.temp_dir.path().join("src")
    }

    fn dst(&self) -> PathBuf {
        self.temp_dir.path().join("dst")
    }

    /// Create a file under `root` with the given modification time.
    fn create_at(&self, root: &Path, rel_path: &str, content: &str, mtime: i64) -> PathBuf {
        let path = root.join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&path, content).expect("Failed to write file");
        filetime::set_file_mtime(&path, FileTime::from_unix_time(mtime, 0))
            .expect("Failed to set mtime");
        path
    }

    /// Create a source file modified in June 2023.
    fn create_source(&self, rel_path: &str, content: &str) -> PathBuf {
        self.create_at(&self.src(), rel_path, content, JUNE_2023)
    }

    /// Create a file already placed in the June 2023 bucket.
    fn create_placed(&self, name: &str, content: &str) -> PathBuf {
        self.create_at(&self.dst(), &format!("2023/06/{}", name), content, JUNE_2023)
    }

    fn assert_file_content(&self, path: &Path, expected: &str) {
        let content = fs::read_to_string(path)
            .unwrap_or_else(|_| panic!("File should exist: {}", path.display()));
        assert_eq!(content, expected, "Unexpected content in {}", path.display());
    }

    /// Every file below the temporary directory with its content, sorted.
    fn snapshot(&self) -> Vec<(PathBuf, String)> {
        let mut files = Vec::new();
        Self::walk_dir(self.temp_dir.path(), &mut files);
        files.sort();
        files
    }

    fn walk_dir(dir: &Path, files: &mut Vec<(PathBuf, String)>) {
        if let Ok(entries) = fs::read_dir(dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_file() {
                    let content = fs::read_to_string(&path).unwrap_or_default();
                    files.push((path, content));
                } else if path.is_dir() {
                    Self::walk_dir(&path, files);
                }
            }
        }
    }
}

fn organize(fixture: &TestFixture, options: &Options) -> datetidy::RunReport {
    run(
        &fixture.src(),
        &fixture.dst(),
        options,
        CompiledFilters::allow_all(),
    )
    .expect("Run failed")
}

fn recursive() -> Options {
    Options {
        recursive: true,
        ..Default::default()
    }
}

// ============================================================================
// Test Suite 1: Basic Placement
// ============================================================================

#[test]
fn test_single_file_lands_in_month_bucket() {
    let fixture = TestFixture::new();
    let source = fixture.create_source("a.jpg", "pixels");

    let report = organize(&fixture, &Options::default());

    let target = fixture.dst().join("2023").join("06").join("a.jpg");
    fixture.assert_file_content(&target, "pixels");
    assert!(!source.exists(), "Source should be moved away");
    assert_eq!(
        report.find(&source).map(|r| &r.disposition),
        Some(&Disposition::Moved { target })
    );
}

#[test]
fn test_files_from_different_months() {
    let fixture = TestFixture::new();
    fixture.create_source("june.jpg", "a");
    fixture.create_at(&fixture.src(), "january.jpg", "b", JANUARY_2022);

    let report = organize(&fixture, &Options::default());

    assert_eq!(report.count("moved"), 2);
    assert!(fixture.dst().join("2023/06/june.jpg").is_file());
    assert!(fixture.dst().join("2022/01/january.jpg").is_file());
}

#[test]
fn test_empty_source() {
    let fixture = TestFixture::new();

    let report = organize(&fixture, &Options::default());

    assert!(report.records.is_empty());
    assert_eq!(fs::read_dir(fixture.dst()).unwrap().count(), 0);
}

#[test]
fn test_second_run_has_nothing_to_do() {
    let fixture = TestFixture::new();
    fixture.create_source("a.jpg", "a");
    fixture.create_source("b.jpg", "b");

    organize(&fixture, &Options::default());
    let before = fixture.snapshot();
    let report = organize(&fixture, &Options::default());

    assert!(report.records.is_empty());
    assert_eq!(fixture.snapshot(), before);
}

// ============================================================================
// Test Suite 2: Duplicates and Collisions
// ============================================================================

#[test]
fn test_identical_content_merges() {
    let fixture = TestFixture::new();
    let placed = fixture.create_placed("a.jpg", "same");
    let source = fixture.create_source("a.jpg", "same");

    let report = organize(&fixture, &Options::default());

    assert!(!source.exists(), "Duplicate source should be removed");
    fixture.assert_file_content(&placed, "same");
    assert!(!fixture.dst().join("2023/06/a_1.jpg").exists());
    assert_eq!(
        report.find(&source).map(|r| &r.disposition),
        Some(&Disposition::Merged { existing: placed })
    );
}

#[test]
fn test_two_identical_sources_in_one_run() {
    let fixture = TestFixture::new();
    let first = fixture.create_source("one/a.jpg", "same");
    let second = fixture.create_source("two/a.jpg", "same");

    let report = organize(&fixture, &recursive());

    assert_eq!(report.count("moved"), 1);
    assert_eq!(report.count("merged"), 1);
    assert!(!first.exists());
    assert!(!second.exists());
    let month = fixture.dst().join("2023/06");
    assert_eq!(fs::read_dir(&month).unwrap().count(), 1);
    fixture.assert_file_content(&month.join("a.jpg"), "same");
}

#[test]
fn test_different_content_is_renamed() {
    let fixture = TestFixture::new();
    let placed = fixture.create_placed("a.jpg", "old");
    let source = fixture.create_source("a.jpg", "new");

    let report = organize(&fixture, &Options::default());

    let renamed = fixture.dst().join("2023/06/a_1.jpg");
    fixture.assert_file_content(&placed, "old");
    fixture.assert_file_content(&renamed, "new");
    assert!(!source.exists());
    assert_eq!(
        report.find(&source).map(|r| &r.disposition),
        Some(&Disposition::Renamed { target: renamed })
    );
}

#[test]
fn test_two_different_sources_with_same_name_in_one_run() {
    let fixture = TestFixture::new();
    fixture.create_source("one/a.jpg", "first");
    fixture.create_source("two/a.jpg", "second");

    let report = organize(&fixture, &recursive());

    assert_eq!(report.count("moved"), 1);
    assert_eq!(report.count("renamed"), 1);
    let month = fixture.dst().join("2023/06");
    let mut contents = vec![
        fs::read_to_string(month.join("a.jpg")).unwrap(),
        fs::read_to_string(month.join("a_1.jpg")).unwrap(),
    ];
    contents.sort();
    assert_eq!(contents, vec!["first", "second"]);
}

#[test]
fn test_rename_picks_next_free_suffix() {
    let fixture = TestFixture::new();
    fixture.create_placed("photo.jpg", "0");
    fixture.create_placed("photo_1.jpg", "1");
    fixture.create_placed("photo_2.jpg", "2");
    fixture.create_source("photo.jpg", "3");

    organize(&fixture, &Options::default());

    fixture.assert_file_content(&fixture.dst().join("2023/06/photo_3.jpg"), "3");
}

#[test]
fn test_rename_keeps_inner_dots_in_base_name() {
    let fixture = TestFixture::new();
    fixture.create_placed("archive.gz", "other");
    fixture.create_placed("archive.tar.gz", "old tarball");
    fixture.create_source("archive.tar.gz", "new tarball");

    organize(&fixture, &Options::default());

    fixture.assert_file_content(
        &fixture.dst().join("2023/06/archive.tar_1.gz"),
        "new tarball",
    );
    fixture.assert_file_content(&fixture.dst().join("2023/06/archive.gz"), "other");
}

#[test]
fn test_file_already_in_place_is_skipped() {
    let fixture = TestFixture::new();
    let placed = fixture.create_placed("a.jpg", "a");
    let month = fixture.dst().join("2023/06");

    let report = run(
        &month,
        &fixture.dst(),
        &Options::default(),
        CompiledFilters::allow_all(),
    )
    .expect("Run failed");

    assert_eq!(
        report.find(&placed).map(|r| &r.disposition),
        Some(&Disposition::SameFile)
    );
    fixture.assert_file_content(&placed, "a");
}

// ============================================================================
// Test Suite 3: Dry-Run Mode
// ============================================================================

#[test]
fn test_dry_run_is_idempotent_and_read_only() {
    let fixture = TestFixture::new();
    fixture.create_placed("dup.jpg", "same");
    fixture.create_placed("clash.jpg", "old");
    fixture.create_source("dup.jpg", "same");
    fixture.create_source("clash.jpg", "new");
    fixture.create_source("nested/fresh.jpg", "fresh");
    let before = fixture.snapshot();

    let options = Options {
        recursive: true,
        dry_run: true,
        ..Default::default()
    };
    let first = organize(&fixture, &options);
    let second = organize(&fixture, &options);

    assert_eq!(fixture.snapshot(), before, "Dry run must not modify files");
    assert!(!fixture.dst().join("2023/06/fresh.jpg").exists());

    let mut first_records = first.records.clone();
    let mut second_records = second.records.clone();
    first_records.sort_by(|a, b| a.path.cmp(&b.path));
    second_records.sort_by(|a, b| a.path.cmp(&b.path));
    assert_eq!(first_records, second_records);

    assert_eq!(first.count("merged"), 1);
    assert_eq!(first.count("renamed"), 1);
    assert_eq!(first.count("moved"), 1);
}

#[test]
fn test_dry_run_does_not_create_directories() {
    let fixture = TestFixture::new();
    fixture.create_source("a.jpg", "a");

    organize(
        &fixture,
        &Options {
            dry_run: true,
            ..Default::default()
        },
    );

    assert_eq!(fs::read_dir(fixture.dst()).unwrap().count(), 0);
    assert!(fixture.src().join("a.jpg").exists());
}

// ============================================================================
// Test Suite 4: Age Filter and Recursion
// ============================================================================

#[test]
fn test_recent_files_stay_in_source() {
    let fixture = TestFixture::new();
    let fresh = fixture.src().join("fresh.jpg");
    fs::write(&fresh, "just taken").unwrap();
    let old = fixture.create_source("old.jpg", "old");

    let report = organize(
        &fixture,
        &Options {
            min_age_days: 30,
            ..Default::default()
        },
    );

    fixture.assert_file_content(&fresh, "just taken");
    assert!(!old.exists());
    assert_eq!(
        report.find(&fresh).map(|r| &r.disposition),
        Some(&Disposition::TooNew)
    );
}

#[test]
fn test_non_recursive_leaves_subdirectories() {
    let fixture = TestFixture::new();
    let nested = fixture.create_source("nested/a.jpg", "a");

    let report = organize(&fixture, &Options::default());

    assert!(nested.exists());
    assert!(report.records.is_empty());
}

#[test]
fn test_recursive_collects_nested_files() {
    let fixture = TestFixture::new();
    let nested = fixture.create_source("a/b/c/deep.jpg", "deep");

    organize(&fixture, &recursive());

    assert!(!nested.exists());
    fixture.assert_file_content(&fixture.dst().join("2023/06/deep.jpg"), "deep");
}

#[test]
fn test_destination_inside_source_is_not_rewalked() {
    let fixture = TestFixture::new();
    let src = fixture.src();
    let inner_dst = src.join("sorted");
    fixture.create_source("a.jpg", "a");

    let run_inner = || {
        run(&src, &inner_dst, &recursive(), CompiledFilters::allow_all()).expect("Run failed")
    };

    let first = run_inner();
    assert_eq!(first.count("moved"), 1);
    let second = run_inner();

    assert!(second.records.is_empty());
    fixture.assert_file_content(&inner_dst.join("2023/06/a.jpg"), "a");
}

#[cfg(unix)]
#[test]
fn test_symlinked_directory_is_not_followed() {
    let fixture = TestFixture::new();
    let outside = fixture.temp_dir.path().join("outside");
    fixture.create_at(&outside, "keep.jpg", "keep", JUNE_2023);
    std::os::unix::fs::symlink(&outside, fixture.src().join("link")).unwrap();

    let report = organize(&fixture, &recursive());

    assert!(outside.join("keep.jpg").exists());
    assert_eq!(report.count("symlink"), 1);
    assert_eq!(report.count("moved"), 0);
}

// ============================================================================
// Test Suite 5: Metadata Timestamps and Filters
// ============================================================================

/// Hands out a fixed capture time for files ending in `.jpg`.
struct StubExtractor {
    calls: usize,
}

impl MetadataExtractor for StubExtractor {
    fn extract(&mut self, path: &Path) -> Result<MetadataFields, MetadataError> {
        self.calls += 1;
        if path.extension().is_some_and(|ext| ext == "jpg") {
            let mut fields = MetadataFields::new();
            fields.insert(
                "DateTimeOriginal".to_string(),
                MetadataValue::Text("2019:12:24 20:15:00".to_string()),
            );
            Ok(fields)
        } else {
            Err(MetadataError::Unsupported {
                path: path.to_path_buf(),
            })
        }
    }
}

#[test]
fn test_metadata_capture_time_selects_bucket() {
    let fixture = TestFixture::new();
    fixture.create_source("shot.jpg", "jpeg");
    fixture.create_source("notes.txt", "text");
    let mut extractor = StubExtractor { calls: 0 };

    let report = run_with_extractor(
        &fixture.src(),
        &fixture.dst(),
        &Options {
            use_metadata: true,
            ..Default::default()
        },
        CompiledFilters::allow_all(),
        Some(&mut extractor),
    )
    .expect("Run failed");

    assert_eq!(extractor.calls, 2);
    assert_eq!(report.count("moved"), 2);
    fixture.assert_file_content(&fixture.dst().join("2019/12/shot.jpg"), "jpeg");
    // No capture time: falls back to the modification time.
    fixture.assert_file_content(&fixture.dst().join("2023/06/notes.txt"), "text");
}

#[test]
fn test_exif_session_falls_back_for_files_without_exif() {
    let fixture = TestFixture::new();
    fixture.create_source("plain.txt", "no exif here");

    let report = organize(
        &fixture,
        &Options {
            use_metadata: true,
            ..Default::default()
        },
    );

    assert_eq!(report.count("moved"), 1);
    assert!(fixture.dst().join("2023/06/plain.txt").is_file());
}

#[test]
fn test_excluded_files_stay_in_source() {
    let fixture = TestFixture::new();
    let partial = fixture.create_source("upload.tmp", "partial");
    let thumbs = fixture.create_source("Thumbs.db", "cache");
    fixture.create_source("a.jpg", "a");

    let config = Config::from_toml(
        r#"
        [filters.exclude]
        filenames = ["Thumbs.db"]
        extensions = ["tmp"]
        "#,
    )
    .unwrap();
    let filters = config.compile_filters().unwrap();

    let report = run(&fixture.src(), &fixture.dst(), &Options::default(), filters)
        .expect("Run failed");

    assert!(partial.exists());
    assert!(thumbs.exists());
    assert_eq!(report.count("excluded"), 2);
    assert_eq!(report.count("moved"), 1);
}

// ============================================================================
// Test Suite 6: Edge Cases and Error Scenarios
// ============================================================================

#[test]
fn test_missing_source_is_fatal() {
    let fixture = TestFixture::new();

    let result = run(
        &fixture.src().join("missing"),
        &fixture.dst(),
        &Options::default(),
        CompiledFilters::allow_all(),
    );

    assert!(matches!(result, Err(OrganizeError::SourceUnreadable { .. })));
}

/// Removes a source subdirectory the first time it is asked for metadata.
struct SubtreeRemover {
    doomed: PathBuf,
}

impl MetadataExtractor for SubtreeRemover {
    fn extract(&mut self, path: &Path) -> Result<MetadataFields, MetadataError> {
        if self.doomed.exists() {
            fs::remove_dir_all(&self.doomed).expect("Failed to remove subdirectory");
        }
        Err(MetadataError::Unsupported {
            path: path.to_path_buf(),
        })
    }
}

#[test]
fn test_unlistable_subdirectory_is_reported_and_skipped() {
    let fixture = TestFixture::new();
    fixture.create_source("top.jpg", "top");
    let gone = fixture.src().join("gone");
    fixture.create_source("gone/lost.jpg", "lost");
    let kept = fixture.create_source("kept/k.jpg", "kept");
    let mut extractor = SubtreeRemover {
        doomed: gone.clone(),
    };

    let report = run_with_extractor(
        &fixture.src(),
        &fixture.dst(),
        &Options {
            recursive: true,
            use_metadata: true,
            ..Default::default()
        },
        CompiledFilters::allow_all(),
        Some(&mut extractor),
    )
    .expect("Run failed");

    assert_eq!(report.failed_dirs.len(), 1);
    assert_eq!(report.failed_dirs[0].0, gone);
    assert!(report.has_failures());
    assert!(!kept.exists());
    fixture.assert_file_content(&fixture.dst().join("2023/06/k.jpg"), "kept");
    fixture.assert_file_content(&fixture.dst().join("2023/06/top.jpg"), "top");
}

#[test]
fn test_failure_is_isolated_to_one_file() {
    let fixture = TestFixture::new();
    // A regular file where the 2023 year directory should go.
    fs::write(fixture.dst().join("2023"), "blocker").unwrap();
    let blocked = fixture.create_source("june.jpg", "a");
    let fine = fixture.create_at(&fixture.src(), "january.jpg", "b", JANUARY_2022);

    let report = organize(&fixture, &Options::default());

    assert!(blocked.exists(), "Failed file must stay at its source path");
    assert!(!fine.exists());
    assert!(fixture.dst().join("2022/01/january.jpg").is_file());
    assert_eq!(report.count("failed"), 1);
    assert!(report.has_failures());
}
