//! Lazy enumeration of the files to organize.
//!
//! [`TreeWalker`] lists one directory at a time. Subdirectories found while
//! listing are queued and visited after the files of the current directory,
//! so deep trees never grow the call stack. Symbolic links are reported and
//! never followed.

use crate::config::CompiledFilters;
use crate::file_organizer::{OrganizeError, OrganizeResult};
use chrono::{DateTime, Days, Local};
use std::collections::VecDeque;
use std::fs::{self, DirEntry, Metadata, ReadDir};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Identifies the stored file behind a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileIdentity {
    /// Device and inode number.
    Inode { dev: u64, ino: u64 },
    /// Canonical path, on platforms without inode numbers.
    Path(PathBuf),
}

impl FileIdentity {
    /// Derives the identity of `path` from its metadata.
    pub fn of(path: &Path, meta: &Metadata) -> Self {
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            let _ = path;
            FileIdentity::Inode {
                dev: meta.dev(),
                ino: meta.ino(),
            }
        }
        #[cfg(not(unix))]
        {
            let _ = meta;
            FileIdentity::Path(fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf()))
        }
    }
}

/// Snapshot of a regular file taken when it was listed.
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// Full path of the file.
    pub path: PathBuf,
    /// Directory the file was found in.
    pub dir: PathBuf,
    /// File name (lossy for non UTF-8 names).
    pub name: String,
    /// Last modification time in local time.
    pub modified: DateTime<Local>,
    pub identity: FileIdentity,
    pub size: u64,
}

impl FileEntry {
    fn from_dir_entry(dir: &Path, entry: &DirEntry, meta: &Metadata) -> io::Result<Self> {
        let path = entry.path();
        let modified = DateTime::<Local>::from(meta.modified()?);
        Ok(Self {
            identity: FileIdentity::of(&path, meta),
            name: entry.file_name().to_string_lossy().into_owned(),
            dir: dir.to_path_buf(),
            path,
            modified,
            size: meta.len(),
        })
    }
}

/// Why an entry was passed over without being placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Modified more recently than the minimum age allows.
    TooNew,
    /// Rejected by the configured filters.
    Excluded,
    /// A symbolic link, which is never followed.
    SymbolicLink,
    /// Already sits at its target.
    SameFile,
}

impl SkipReason {
    pub fn describe(&self) -> &'static str {
        match self {
            SkipReason::TooNew => "is too new",
            SkipReason::Excluded => "excluded by filters",
            SkipReason::SymbolicLink => "symbolic link, not followed",
            SkipReason::SameFile => "same file, skipping",
        }
    }
}

/// One step of the walk.
#[derive(Debug)]
pub enum WalkEvent {
    /// A directory is about to be listed.
    EnterDir(PathBuf),
    /// A regular file old enough to be placed.
    File(FileEntry),
    /// An entry that is left alone.
    Skipped { path: PathBuf, reason: SkipReason },
    /// A single entry could not be inspected.
    EntryFailed { path: PathBuf, error: io::Error },
    /// A directory could not be listed; its subtree is abandoned.
    DirFailed { path: PathBuf, error: io::Error },
}

/// Settings that shape a walk.
#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    pub recursive: bool,
    /// Files modified within this many days are skipped.
    pub min_age_days: u64,
    /// Directories that are never descended into.
    pub prune: Vec<PathBuf>,
}

/// Iterator over the files below a source directory.
pub struct TreeWalker {
    root: PathBuf,
    pending: VecDeque<PathBuf>,
    current: Option<(PathBuf, ReadDir)>,
    recursive: bool,
    keep_after: Option<DateTime<Local>>,
    prune: Vec<PathBuf>,
    filters: CompiledFilters,
}

impl TreeWalker {
    /// Opens the root directory.
    ///
    /// Failing to list the root is fatal; failures further down are reported
    /// as [`WalkEvent::DirFailed`] and the walk goes on.
    pub fn open(root: &Path, options: WalkOptions, filters: CompiledFilters) -> OrganizeResult<Self> {
        let read_dir = fs::read_dir(root).map_err(|e| OrganizeError::SourceUnreadable {
            path: root.to_path_buf(),
            source: e,
        })?;

        let keep_after = Local::now().checked_sub_days(Days::new(options.min_age_days));

        let prune = options.prune.iter().map(|p| resolve_prune_path(p)).collect();

        Ok(Self {
            root: root.to_path_buf(),
            pending: VecDeque::new(),
            current: Some((root.to_path_buf(), read_dir)),
            recursive: options.recursive,
            keep_after,
            prune,
            filters,
        })
    }

    /// Files modified after this instant are skipped as too new. `None` when
    /// the minimum age reaches past the earliest representable date.
    pub fn keep_after(&self) -> Option<DateTime<Local>> {
        self.keep_after
    }

    fn is_pruned(&self, dir: &Path) -> bool {
        if self.prune.is_empty() {
            return false;
        }
        let canonical = fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf());
        self.prune.iter().any(|p| *p == canonical)
    }

    /// Turns one listed entry into an event, or `None` for entries that are
    /// silently ignored (queued directories, sockets, devices).
    fn classify(&mut self, dir: &Path, entry: DirEntry) -> Option<WalkEvent> {
        let path = entry.path();
        let file_type = match entry.file_type() {
            Ok(file_type) => file_type,
            Err(error) => return Some(WalkEvent::EntryFailed { path, error }),
        };

        if file_type.is_symlink() {
            return Some(WalkEvent::Skipped {
                path,
                reason: SkipReason::SymbolicLink,
            });
        }

        if file_type.is_dir() {
            if self.recursive {
                if self.is_pruned(&path) {
                    debug!(dir = %path.display(), "not descending into pruned directory");
                } else {
                    self.pending.push_back(path);
                }
            }
            return None;
        }

        if !file_type.is_file() {
            return None;
        }

        // Filters see paths relative to the source root.
        let relative = path.strip_prefix(&self.root).unwrap_or(&path);
        if !self.filters.should_include(relative) {
            return Some(WalkEvent::Skipped {
                path,
                reason: SkipReason::Excluded,
            });
        }

        let meta = match entry.metadata() {
            Ok(meta) => meta,
            Err(error) => return Some(WalkEvent::EntryFailed { path, error }),
        };
        let file = match FileEntry::from_dir_entry(dir, &entry, &meta) {
            Ok(file) => file,
            Err(error) => return Some(WalkEvent::EntryFailed { path, error }),
        };

        if self.keep_after.is_none_or(|keep_after| file.modified > keep_after) {
            return Some(WalkEvent::Skipped {
                path,
                reason: SkipReason::TooNew,
            });
        }

        Some(WalkEvent::File(file))
    }
}

/// Resolves `path` the way `fs::canonicalize` would, even when its tail does
/// not exist yet: the deepest existing ancestor is canonicalized and the
/// missing components are joined back on.
fn resolve_prune_path(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut missing = Vec::new();
    let mut existing = absolute.as_path();
    loop {
        if let Ok(canonical) = fs::canonicalize(existing) {
            return missing
                .iter()
                .rev()
                .fold(canonical, |acc: PathBuf, part| acc.join(part));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return absolute,
        }
    }
}

impl Iterator for TreeWalker {
    type Item = WalkEvent;

    fn next(&mut self) -> Option<WalkEvent> {
        loop {
            let Some((dir, mut read_dir)) = self.current.take() else {
                let dir = self.pending.pop_front()?;
                match fs::read_dir(&dir) {
                    Ok(read_dir) => {
                        self.current = Some((dir.clone(), read_dir));
                        return Some(WalkEvent::EnterDir(dir));
                    }
                    Err(error) => return Some(WalkEvent::DirFailed { path: dir, error }),
                }
            };

            match read_dir.next() {
                None => continue,
                Some(Err(error)) => {
                    // Listing broke midway: abandon the rest of this directory.
                    return Some(WalkEvent::DirFailed { path: dir, error });
                }
                Some(Ok(entry)) => {
                    let event = self.classify(&dir, entry);
                    self.current = Some((dir, read_dir));
                    if let Some(event) = event {
                        return Some(event);
                    }
                }
            }
        }
    }
}
