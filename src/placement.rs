//! Per-file placement decisions.
//!
//! For every file the walker hands over, [`PlacementPolicy`] works out the
//! month bucket, looks at what already sits at the target path and picks one
//! of four outcomes:
//!
//! - nothing there: move the file in
//! - the very same file (same device and inode): skip
//! - a file with identical content: delete the source
//! - a different file: move in under a `_N` suffixed name
//!
//! Deciding and applying are separate steps so a dry run can report exactly
//! what a real run would do without touching the disk.

use crate::content::{self, Comparison};
use crate::file_organizer::{FileOrganizer, OrganizeError, OrganizeResult};
use crate::metadata::{self, MetadataExtractor};
use crate::naming;
use crate::walker::{FileEntry, FileIdentity, SkipReason};
use chrono::{Datelike, NaiveDateTime};
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where the effective timestamp came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampSource {
    Modified,
    Metadata,
}

/// The timestamp that selects the month bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveTimestamp {
    pub when: NaiveDateTime,
    pub source: TimestampSource,
}

/// What to do with one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlacementDecision {
    /// Leave the file where it is.
    Skip(SkipReason),
    /// `existing` has the same content; delete the source.
    MergeDeleteSource { existing: PathBuf },
    /// Move the file to `target`. `renamed` is set when the original name was
    /// taken by a different file.
    MoveTo { target: PathBuf, renamed: bool },
}

/// A decision together with what led to it.
#[derive(Debug, Clone)]
pub struct Placement {
    pub decision: PlacementDecision,
    pub timestamp: EffectiveTimestamp,
    /// Degraded paths taken while deciding, e.g. unreadable metadata.
    pub warnings: Vec<String>,
}

/// Decides and applies placements into a destination tree.
pub struct PlacementPolicy<'a> {
    destination: PathBuf,
    dry_run: bool,
    metadata: Option<&'a mut dyn MetadataExtractor>,
}

impl<'a> PlacementPolicy<'a> {
    /// Creates a policy for `destination`.
    ///
    /// With a metadata extractor the capture time embedded in a file is
    /// preferred over its modification time.
    pub fn new(
        destination: &Path,
        dry_run: bool,
        metadata: Option<&'a mut dyn MetadataExtractor>,
    ) -> Self {
        Self {
            destination: destination.to_path_buf(),
            dry_run,
            metadata,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Returns `DST/YYYY/MM` for a timestamp.
    pub fn month_dir(&self, when: NaiveDateTime) -> PathBuf {
        self.destination
            .join(format!("{:04}", when.year()))
            .join(format!("{:02}", when.month()))
    }

    /// Picks the metadata capture time if there is one, the modification time
    /// otherwise. Metadata failures are pushed onto `warnings`.
    pub fn effective_timestamp(
        &mut self,
        entry: &FileEntry,
        warnings: &mut Vec<String>,
    ) -> EffectiveTimestamp {
        let modified = EffectiveTimestamp {
            when: entry.modified.naive_local(),
            source: TimestampSource::Modified,
        };

        let Some(extractor) = self.metadata.as_mut() else {
            return modified;
        };

        match extractor
            .extract(&entry.path)
            .and_then(|fields| metadata::capture_time(&fields))
        {
            Ok(when) => EffectiveTimestamp {
                when,
                source: TimestampSource::Metadata,
            },
            Err(e) => {
                warnings.push(format!("Exif error: {}", e));
                modified
            }
        }
    }

    /// Works out what should happen to `entry` without changing anything.
    pub fn decide(&mut self, entry: &FileEntry) -> OrganizeResult<Placement> {
        let mut warnings = Vec::new();
        let timestamp = self.effective_timestamp(entry, &mut warnings);
        let target_dir = self.month_dir(timestamp.when);
        let file_name = entry
            .path
            .file_name()
            .unwrap_or_else(|| OsStr::new(&entry.name));
        let target = target_dir.join(file_name);

        let existing = match fs::metadata(&target) {
            Ok(meta) => Some(meta),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                return Err(OrganizeError::TargetInspectFailed {
                    path: target,
                    source: e,
                });
            }
        };

        let decision = match existing {
            // A dangling link still occupies the name.
            None if naming::entry_exists(&target) => Self::renamed(&target_dir, entry),
            None => PlacementDecision::MoveTo {
                target,
                renamed: false,
            },
            Some(meta) if FileIdentity::of(&target, &meta) == entry.identity => {
                PlacementDecision::Skip(SkipReason::SameFile)
            }
            Some(meta) if meta.is_file() => {
                match content::compare_sized(&entry.path, entry.size, &target) {
                    Comparison::Identical => PlacementDecision::MergeDeleteSource { existing: target },
                    Comparison::Different => Self::renamed(&target_dir, entry),
                    Comparison::Unreadable { path, error } => {
                        warnings.push(format!(
                            "cannot compare with {}: {}; keeping both",
                            path.display(),
                            error
                        ));
                        Self::renamed(&target_dir, entry)
                    }
                }
            }
            Some(_) => Self::renamed(&target_dir, entry),
        };
        debug!(source = %entry.path.display(), ?decision, "decided placement");

        Ok(Placement {
            decision,
            timestamp,
            warnings,
        })
    }

    fn renamed(target_dir: &Path, entry: &FileEntry) -> PlacementDecision {
        PlacementDecision::MoveTo {
            target: naming::unique_name(target_dir, &entry.name),
            renamed: true,
        }
    }

    /// Carries out a decision. Does nothing in dry-run mode.
    pub fn apply(&self, entry: &FileEntry, decision: &PlacementDecision) -> OrganizeResult<()> {
        if self.dry_run {
            return Ok(());
        }

        match decision {
            PlacementDecision::Skip(_) => Ok(()),
            PlacementDecision::MergeDeleteSource { .. } => FileOrganizer::remove_source(&entry.path),
            PlacementDecision::MoveTo { target, .. } => {
                if let Some(dir) = target.parent() {
                    FileOrganizer::ensure_dir(dir, FileOrganizer::dir_mode(&entry.dir))?;
                }
                FileOrganizer::move_file(&entry.path, target)
            }
        }
    }

    /// Decides and applies in one step.
    pub fn place(&mut self, entry: &FileEntry) -> OrganizeResult<Placement> {
        let placement = self.decide(entry)?;
        self.apply(entry, &placement.decision)?;
        Ok(placement)
    }
}
