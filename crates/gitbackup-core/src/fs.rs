//! Source tree access.
//!
//! Enumeration produces [`CandidateFile`] entries; reading file bytes goes
//! through the [`SourceFs`] trait so the ingestion pipeline can be driven
//! against an instrumented file system in tests.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::debug;
use walkdir::WalkDir;

use crate::pattern::normalize_path;

/// A file discovered under the source root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    /// Absolute path on disk.
    pub path: PathBuf,
    /// Path relative to the source root, `/`-separated.
    pub relative: String,
    /// Last modification time, if the platform reported one.
    pub modified: Option<SystemTime>,
    /// Size in bytes; `None` when the file could not be stat'ed.
    pub size: Option<u64>,
}

/// Computes the normalized relative path of `path` below `root`.
///
/// Returns `None` when `path` is not below `root` or is not valid UTF-8.
pub fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    if rel.as_os_str().is_empty() {
        return None;
    }
    Some(normalize_path(rel.to_str()?).into_owned())
}

/// Read access to source files.
pub trait SourceFs: Send + Sync {
    /// Reads the whole file.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Reads at most `limit` bytes from the start of the file.
    fn read_head(&self, path: &Path, limit: usize) -> io::Result<Vec<u8>>;
}

/// [`SourceFs`] backed by the local file system.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl SourceFs for LocalFs {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn read_head(&self, path: &Path, limit: usize) -> io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(limit.min(64 * 1024));
        File::open(path)?.take(limit as u64).read_to_end(&mut buf)?;
        Ok(buf)
    }
}

/// A path that could not be visited during enumeration.
#[derive(Debug, Clone)]
pub struct WalkFailure {
    pub path: Option<PathBuf>,
    pub message: String,
}

/// Result of walking a source tree.
#[derive(Debug, Default)]
pub struct Enumeration {
    pub files: Vec<CandidateFile>,
    pub failures: Vec<WalkFailure>,
}

/// Recursively lists the regular files under `root`.
///
/// Symlinks are not followed and `.git` directories are not descended
/// into. Entries that cannot be visited are reported in
/// [`Enumeration::failures`] instead of aborting the walk.
pub fn enumerate(root: &Path) -> Enumeration {
    let mut result = Enumeration::default();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            !(entry.depth() > 0 && entry.file_type().is_dir() && entry.file_name() == ".git")
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                result.failures.push(WalkFailure {
                    path: e.path().map(Path::to_path_buf),
                    message: e.to_string(),
                });
                continue;
            },
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let Some(relative) = relative_path(root, entry.path()) else {
            // Tree entries are keyed by the exact name; a lossy rewrite
            // could merge two files into one.
            if entry.path().to_str().is_none() {
                result.failures.push(WalkFailure {
                    path: Some(entry.path().to_path_buf()),
                    message: "file name is not valid UTF-8, skipping".to_string(),
                });
            }
            continue;
        };

        // A failed stat leaves size and mtime unknown; filters fail open.
        let metadata = entry.metadata().ok();

        result.files.push(CandidateFile {
            path: entry.path().to_path_buf(),
            relative,
            modified: metadata.as_ref().and_then(|m| m.modified().ok()),
            size: metadata.map(|m| m.len()),
        });
    }

    debug!(
        "Enumerated {} files under {:?} ({} failures)",
        result.files.len(),
        root,
        result.failures.len()
    );

    result
}
