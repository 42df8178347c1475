//! Error types for snapshot construction.

use std::path::PathBuf;

use gitbackup_core::CoreError;

/// Errors that can occur while building a snapshot.
///
/// Per-file problems (unreadable source files, a single failed blob) are
/// not errors: they are reported to the observer and the file is skipped.
/// Every variant here aborts the run.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// The configuration is invalid or the source root is unusable.
    #[error(transparent)]
    Config(#[from] CoreError),

    /// An object store operation failed.
    #[error("git error: {0}")]
    Store(String),

    /// The working copy could not be updated.
    #[error("working copy error at {path}: {reason}")]
    Worktree { path: PathBuf, reason: String },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A background task could not be joined.
    #[error("task failed: {0}")]
    Task(String),
}

impl SnapshotError {
    /// Creates a new store error.
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Creates a new working copy error.
    pub fn worktree(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Worktree {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new task error.
    pub fn task(msg: impl Into<String>) -> Self {
        Self::Task(msg.into())
    }

    /// Returns true if the run failed before any ingestion started because
    /// of the configuration.
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::Config(e) if e.is_config_error())
    }

    /// Returns true if the object store rejected an operation.
    pub fn is_store_error(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}
