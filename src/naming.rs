//! Collision-free destination names.
//!
//! When a different file already occupies the target name, the incoming file
//! gets a numeric suffix between its base name and its extension:
//! `photo.jpg` becomes `photo_1.jpg`, then `photo_2.jpg`, and so on.

use std::fs;
use std::path::{Path, PathBuf};

/// Splits a file name into base name and extension at the last `.`.
///
/// A name without a `.` has no extension; a name ending in `.` has an empty
/// one. With several dots only the last segment is the extension.
///
/// # Examples
///
/// ```
/// use datetidy::naming::split_name;
///
/// assert_eq!(split_name("photo.jpg"), ("photo", Some("jpg")));
/// assert_eq!(split_name("archive.tar.gz"), ("archive.tar", Some("gz")));
/// assert_eq!(split_name("README"), ("README", None));
/// ```
pub fn split_name(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((base, ext)) => (base, Some(ext)),
        None => (name, None),
    }
}

/// Builds the `N`-th candidate name.
fn candidate_name(base: &str, ext: Option<&str>, n: u64) -> String {
    match ext {
        Some(ext) => format!("{}_{}.{}", base, n, ext),
        None => format!("{}_{}", base, n),
    }
}

/// Returns true if anything (file, directory, dangling link) sits at `path`.
pub(crate) fn entry_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Returns the first path `dir/base_N.ext` (N starting at 1) that is free.
///
/// Every candidate is checked against the directory as it is right now, so
/// two calls may return different names if the directory changed in between.
/// Nothing guards against another process taking the name after this returns.
///
/// A name without any `.` gets `base_N` rather than `base_N.`; a name that
/// ends in `.` keeps its trailing dot (`trailing.` becomes `trailing_1.`).
///
/// # Examples
///
/// ```no_run
/// use datetidy::naming::unique_name;
/// use std::path::Path;
///
/// // With photo_1.jpg and photo_2.jpg present this yields photo_3.jpg.
/// let path = unique_name(Path::new("/archive/2023/06"), "photo.jpg");
/// println!("{}", path.display());
/// ```
pub fn unique_name(dir: &Path, name: &str) -> PathBuf {
    let (base, ext) = split_name(name);
    let mut n: u64 = 1;
    loop {
        let candidate = dir.join(candidate_name(base, ext, n));
        if !entry_exists(&candidate) {
            return candidate;
        }
        n += 1;
    }
}
