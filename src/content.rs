//! Content comparison by BLAKE3 digest.
//!
//! Two files are considered identical when their sizes match and their
//! BLAKE3 digests are equal. A digest collision is not guarded against.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::debug;

const CHUNK_SIZE: usize = 64 * 1024;

/// Result of comparing two files.
#[derive(Debug)]
pub enum Comparison {
    /// Both files have the same content.
    Identical,
    /// The files differ in size or digest.
    Different,
    /// One of the files could not be read.
    Unreadable { path: PathBuf, error: io::Error },
}

impl Comparison {
    /// Returns true only for [`Comparison::Identical`].
    ///
    /// An unreadable file counts as different, so callers fall back to keeping
    /// both files instead of deleting one.
    pub fn is_identical(&self) -> bool {
        matches!(self, Comparison::Identical)
    }
}

/// Computes the BLAKE3 digest of a file's full content.
pub fn file_digest(path: &Path) -> io::Result<blake3::Hash> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0_u8; CHUNK_SIZE];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize())
}

/// Compares the content of two files.
pub fn compare(left: &Path, right: &Path) -> Comparison {
    match fs::metadata(left) {
        Ok(meta) => compare_sized(left, meta.len(), right),
        Err(error) => unreadable(left, error),
    }
}

/// Like [`compare`], with the size of `left` already known.
pub fn compare_sized(left: &Path, left_len: u64, right: &Path) -> Comparison {
    let right_len = match fs::metadata(right) {
        Ok(meta) => meta.len(),
        Err(error) => return unreadable(right, error),
    };
    if left_len != right_len {
        debug!(left = %left.display(), right = %right.display(), "sizes differ");
        return Comparison::Different;
    }

    let left_hash = match file_digest(left) {
        Ok(hash) => hash,
        Err(error) => return unreadable(left, error),
    };
    let right_hash = match file_digest(right) {
        Ok(hash) => hash,
        Err(error) => return unreadable(right, error),
    };
    debug!(
        left = %left.display(),
        right = %right.display(),
        left_hash = %left_hash.to_hex(),
        right_hash = %right_hash.to_hex(),
        "compared digests"
    );

    if left_hash == right_hash {
        Comparison::Identical
    } else {
        Comparison::Different
    }
}

fn unreadable(path: &Path, error: io::Error) -> Comparison {
    Comparison::Unreadable {
        path: path.to_path_buf(),
        error,
    }
}
