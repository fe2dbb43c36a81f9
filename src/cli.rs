//! Run orchestration for datetidy.
//!
//! This module ties the pieces together for one run:
//! - walking the source tree
//! - deciding and applying a placement for every file
//! - printing progress as it goes
//! - collecting a [`RunReport`] of what happened to each path

use crate::config::{CompiledFilters, RunDefaults};
use crate::file_organizer::OrganizeResult;
use crate::metadata::{ExifSession, MetadataExtractor};
use crate::output::OutputFormatter;
use crate::placement::{PlacementDecision, PlacementPolicy, TimestampSource};
use crate::walker::{FileEntry, SkipReason, TreeWalker, WalkEvent, WalkOptions};
use std::path::{Path, PathBuf};

/// Options for one run. Read-only while the run is in progress.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    /// Descend into subdirectories of the source.
    pub recursive: bool,
    /// Report decisions without touching the disk.
    pub dry_run: bool,
    /// Leave files modified within this many days alone.
    pub min_age_days: u64,
    /// Prefer the capture time embedded in the file over its mtime.
    pub use_metadata: bool,
}

impl Options {
    /// Starts from configured defaults.
    pub fn from_defaults(defaults: &RunDefaults) -> Self {
        Self {
            recursive: defaults.recursive,
            dry_run: false,
            min_age_days: defaults.min_age_days,
            use_metadata: defaults.use_metadata,
        }
    }
}

/// What happened to one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    TooNew,
    Excluded,
    SymbolicLink,
    SameFile,
    /// Identical content already at `existing`; the source was removed.
    Merged { existing: PathBuf },
    Moved { target: PathBuf },
    /// Moved under a new name because a different file held the original one.
    Renamed { target: PathBuf },
    Failed { reason: String },
}

impl Disposition {
    /// Short label used in the summary table.
    pub fn label(&self) -> &'static str {
        match self {
            Disposition::TooNew => "too new",
            Disposition::Excluded => "excluded",
            Disposition::SymbolicLink => "symlink",
            Disposition::SameFile => "same file",
            Disposition::Merged { .. } => "merged",
            Disposition::Moved { .. } => "moved",
            Disposition::Renamed { .. } => "renamed",
            Disposition::Failed { .. } => "failed",
        }
    }

    fn from_skip(reason: SkipReason) -> Self {
        match reason {
            SkipReason::TooNew => Disposition::TooNew,
            SkipReason::Excluded => Disposition::Excluded,
            SkipReason::SymbolicLink => Disposition::SymbolicLink,
            SkipReason::SameFile => Disposition::SameFile,
        }
    }

    fn from_decision(decision: PlacementDecision) -> Self {
        match decision {
            PlacementDecision::Skip(reason) => Self::from_skip(reason),
            PlacementDecision::MergeDeleteSource { existing } => Disposition::Merged { existing },
            PlacementDecision::MoveTo {
                target,
                renamed: false,
            } => Disposition::Moved { target },
            PlacementDecision::MoveTo {
                target,
                renamed: true,
            } => Disposition::Renamed { target },
        }
    }
}

/// One line of the run report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub path: PathBuf,
    pub disposition: Disposition,
}

/// Everything a run did, in walk order.
#[derive(Debug, Default)]
pub struct RunReport {
    pub records: Vec<Record>,
    /// Subdirectories that could not be listed, with the reason.
    pub failed_dirs: Vec<(PathBuf, String)>,
}

impl RunReport {
    /// Number of records whose disposition has the given label.
    pub fn count(&self, label: &str) -> usize {
        self.records
            .iter()
            .filter(|r| r.disposition.label() == label)
            .count()
    }

    /// Returns the record for `path`, if it was reported.
    pub fn find(&self, path: &Path) -> Option<&Record> {
        self.records.iter().find(|r| r.path == path)
    }

    /// True if any file or directory failed.
    pub fn has_failures(&self) -> bool {
        !self.failed_dirs.is_empty() || self.count("failed") > 0
    }

    /// Counts per disposition, in a fixed order.
    pub fn summary(&self) -> Vec<(&'static str, usize)> {
        [
            "moved",
            "renamed",
            "merged",
            "same file",
            "too new",
            "excluded",
            "symlink",
            "failed",
        ]
        .into_iter()
        .map(|label| (label, self.count(label)))
        .collect()
    }

    fn push(&mut self, path: PathBuf, disposition: Disposition) {
        self.records.push(Record { path, disposition });
    }
}

/// Organizes `source` into `destination`.
///
/// When `options.use_metadata` is set an [`ExifSession`] is opened for the
/// length of the run and dropped when it returns.
///
/// # Errors
///
/// Only a source root that cannot be listed is an error. Everything that goes
/// wrong below the root is recorded in the returned report.
///
/// # Examples
///
/// ```no_run
/// use datetidy::cli::{run, Options};
/// use datetidy::config::CompiledFilters;
/// use std::path::Path;
///
/// let options = Options { recursive: true, dry_run: true, ..Default::default() };
/// let report = run(
///     Path::new("/phone/camera"),
///     Path::new("/archive/photos"),
///     &options,
///     CompiledFilters::allow_all(),
/// )?;
/// println!("{} files would move", report.count("moved"));
/// # Ok::<(), datetidy::file_organizer::OrganizeError>(())
/// ```
pub fn run(
    source: &Path,
    destination: &Path,
    options: &Options,
    filters: CompiledFilters,
) -> OrganizeResult<RunReport> {
    if options.use_metadata {
        let mut session = ExifSession::new();
        run_with_extractor(source, destination, options, filters, Some(&mut session))
    } else {
        run_with_extractor(source, destination, options, filters, None)
    }
}

/// Like [`run`], with the metadata extractor supplied by the caller.
pub fn run_with_extractor(
    source: &Path,
    destination: &Path,
    options: &Options,
    filters: CompiledFilters,
    extractor: Option<&mut dyn MetadataExtractor>,
) -> OrganizeResult<RunReport> {
    let walk_options = WalkOptions {
        recursive: options.recursive,
        min_age_days: options.min_age_days,
        prune: vec![destination.to_path_buf()],
    };
    let walker = TreeWalker::open(source, walk_options, filters)?;

    if options.dry_run {
        OutputFormatter::dry_run_notice("No files will be modified.");
    }
    OutputFormatter::info(&format!("Processing directory: {}", source.display()));

    let mut policy = PlacementPolicy::new(destination, options.dry_run, extractor);
    let mut report = RunReport::default();

    for event in walker {
        match event {
            WalkEvent::EnterDir(dir) => {
                OutputFormatter::info(&format!("Processing directory: {}", dir.display()));
            }
            WalkEvent::Skipped { path, reason } => {
                OutputFormatter::plain(&format!(
                    "  Skipping file {}: {}",
                    display_name(&path),
                    reason.describe()
                ));
                report.push(path, Disposition::from_skip(reason));
            }
            WalkEvent::EntryFailed { path, error } => {
                OutputFormatter::failure(&format!(
                    "  Error reading {}: {}",
                    path.display(),
                    error
                ));
                report.push(
                    path,
                    Disposition::Failed {
                        reason: error.to_string(),
                    },
                );
            }
            WalkEvent::DirFailed { path, error } => {
                OutputFormatter::failure(&format!(
                    "Error listing directory {}: {}",
                    path.display(),
                    error
                ));
                report.failed_dirs.push((path, error.to_string()));
            }
            WalkEvent::File(entry) => {
                let disposition = place_file(&mut policy, &entry);
                report.push(entry.path, disposition);
            }
        }
    }

    OutputFormatter::summary_table(&report.summary());
    if options.dry_run {
        OutputFormatter::dry_run_notice("Dry run complete. No files were modified.");
    }

    Ok(report)
}

/// Places one file and prints what happened.
fn place_file(policy: &mut PlacementPolicy<'_>, entry: &FileEntry) -> Disposition {
    OutputFormatter::plain(&format!("  Processing file: {}", entry.name));

    let placement = match policy.decide(entry) {
        Ok(placement) => placement,
        Err(e) => {
            OutputFormatter::failure(&format!("    {}", e));
            return Disposition::Failed {
                reason: e.to_string(),
            };
        }
    };

    for warning in &placement.warnings {
        OutputFormatter::warning(&format!("    {}", warning));
    }
    if placement.timestamp.source == TimestampSource::Metadata {
        OutputFormatter::plain(&format!("    capture time {}", placement.timestamp.when));
    }

    let verb = if policy.is_dry_run() { "would be " } else { "" };
    let line = match &placement.decision {
        PlacementDecision::Skip(reason) => format!("    -> {}", reason.describe()),
        PlacementDecision::MergeDeleteSource { existing } => format!(
            "    -> {}: same contents, source {}removed",
            existing.display(),
            verb
        ),
        PlacementDecision::MoveTo {
            target,
            renamed: false,
        } => format!("    -> {}: {}moved", target.display(), verb),
        PlacementDecision::MoveTo {
            target,
            renamed: true,
        } => format!(
            "    -> {}: different file exists, {}moved under new name",
            target.display(),
            verb
        ),
    };

    if let Err(e) = policy.apply(entry, &placement.decision) {
        OutputFormatter::failure(&format!("    {}", e));
        return Disposition::Failed {
            reason: e.to_string(),
        };
    }

    match placement.decision {
        PlacementDecision::Skip(_) => OutputFormatter::plain(&line),
        _ => OutputFormatter::success(&line),
    }
    Disposition::from_decision(placement.decision)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
