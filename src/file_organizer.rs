//! Filesystem mutations used when placing files.
//!
//! Everything that changes the disk goes through [`FileOrganizer`]: creating
//! month directories, moving a file into place and deleting a duplicate
//! source. A move either completes or leaves the source where it was.

use crate::content;
use filetime::FileTime;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Errors that can occur while organizing files.
#[derive(Debug, thiserror::Error)]
pub enum OrganizeError {
    /// The source root could not be opened. Fatal for the run.
    #[error("Error accessing directory {}: {source}", path.display())]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Failed to create a target month directory.
    #[error("Failed to create directory {}: {source}", path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Failed to move a file to its target.
    #[error("Failed to move {} to {}: {source}", from.display(), to.display())]
    FileMoveFailure {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Failed to delete a source file.
    #[error("Failed to remove {}: {source}", path.display())]
    RemoveFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The existing target could not be inspected.
    #[error("Failed to inspect {}: {source}", path.display())]
    TargetInspectFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Something appeared at the target path after the decision was made.
    #[error("Target {} is already occupied", path.display())]
    TargetOccupied { path: PathBuf },
    /// A cross-device copy did not match its source.
    #[error("Copy of {} at {} does not match the original", from.display(), to.display())]
    CopyVerificationFailed { from: PathBuf, to: PathBuf },
}

/// Result type for file organization operations.
pub type OrganizeResult<T> = Result<T, OrganizeError>;

/// Performs the disk changes behind placement decisions.
pub struct FileOrganizer;

impl FileOrganizer {
    /// Creates `dir` and any missing parents.
    ///
    /// On Unix new directories get `mode`, normally the mode of the directory
    /// the file came from. Elsewhere the mode is ignored.
    pub fn ensure_dir(dir: &Path, mode: Option<u32>) -> OrganizeResult<()> {
        if dir.is_dir() {
            return Ok(());
        }

        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            if let Some(mode) = mode {
                builder.mode(mode);
            }
        }
        #[cfg(not(unix))]
        let _ = mode;

        builder
            .create(dir)
            .map_err(|e| OrganizeError::DirectoryCreationFailed {
                path: dir.to_path_buf(),
                source: e,
            })
    }

    /// Returns the permission bits of `dir`, if they can be read.
    pub fn dir_mode(dir: &Path) -> Option<u32> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::metadata(dir)
                .ok()
                .map(|meta| meta.permissions().mode() & 0o7777)
        }
        #[cfg(not(unix))]
        {
            let _ = dir;
            None
        }
    }

    /// Moves `from` to `to`, which must not exist yet.
    ///
    /// A plain rename is tried first. When source and target live on
    /// different filesystems the file is copied, verified and then removed.
    pub fn move_file(from: &Path, to: &Path) -> OrganizeResult<()> {
        if crate::naming::entry_exists(to) {
            return Err(OrganizeError::TargetOccupied {
                path: to.to_path_buf(),
            });
        }

        match fs::rename(from, to) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                debug!(from = %from.display(), to = %to.display(), "rename crosses devices, copying");
                Self::copy_then_remove(from, to)
            }
            Err(e) => Err(OrganizeError::FileMoveFailure {
                from: from.to_path_buf(),
                to: to.to_path_buf(),
                source: e,
            }),
        }
    }

    /// Deletes a source file whose content already exists at the target.
    pub fn remove_source(path: &Path) -> OrganizeResult<()> {
        fs::remove_file(path).map_err(|e| OrganizeError::RemoveFailed {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Copies `from` next to `to`, verifies it, renames it into place and
    /// removes `from`.
    ///
    /// The copy is written under a hidden temporary name in the target
    /// directory, so a failure never leaves a partial file at `to`.
    pub(crate) fn copy_then_remove(from: &Path, to: &Path) -> OrganizeResult<()> {
        let partial = Self::partial_path(to);
        let move_failure = |e: io::Error| OrganizeError::FileMoveFailure {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source: e,
        };

        let staged = fs::copy(from, &partial)
            .and_then(|_| fs::metadata(from))
            .and_then(|meta| {
                filetime::set_file_mtime(&partial, FileTime::from_last_modification_time(&meta))
            })
            .map_err(move_failure);
        if let Err(e) = staged {
            Self::discard(&partial);
            return Err(e);
        }

        if !content::compare(from, &partial).is_identical() {
            Self::discard(&partial);
            return Err(OrganizeError::CopyVerificationFailed {
                from: from.to_path_buf(),
                to: to.to_path_buf(),
            });
        }

        if let Err(e) = fs::rename(&partial, to) {
            Self::discard(&partial);
            return Err(move_failure(e));
        }

        Self::remove_source(from)
    }

    fn partial_path(to: &Path) -> PathBuf {
        let name = to
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        to.with_file_name(format!(".{}.datetidy-partial", name))
    }

    fn discard(partial: &Path) {
        if let Err(e) = fs::remove_file(partial)
            && e.kind() != io::ErrorKind::NotFound
        {
            warn!(path = %partial.display(), error = %e, "could not remove partial copy");
        }
    }
}
