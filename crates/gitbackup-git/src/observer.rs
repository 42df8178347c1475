//! Run event reporting.

use gitbackup_core::Verdict;
use tracing::{debug, info, trace, warn};

use crate::ingest::IngestStats;
use crate::snapshot::CommitResult;

/// Receives events while a backup runs.
///
/// Callbacks may arrive concurrently from worker threads. All methods
/// default to doing nothing.
pub trait BackupObserver: Send + Sync {
    /// A file was accepted and read.
    fn file_included(&self, _path: &str, _bytes: usize) {}

    /// A file was left out.
    fn file_excluded(&self, _path: &str, _verdict: &Verdict) {}

    /// A recoverable problem; the affected file was skipped.
    fn warning(&self, _message: &str) {}

    /// Periodic progress snapshot.
    fn progress(&self, _stats: &IngestStats) {}

    /// The run finished.
    fn finished(&self, _result: &CommitResult, _stats: &IngestStats) {}
}

/// Reports events through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl BackupObserver for TracingObserver {
    fn file_included(&self, path: &str, bytes: usize) {
        trace!("Included {} ({} bytes)", path, bytes);
    }

    fn file_excluded(&self, path: &str, verdict: &Verdict) {
        debug!("Excluded {}: {}", path, verdict);
    }

    fn warning(&self, message: &str) {
        warn!("{}", message);
    }

    fn progress(&self, stats: &IngestStats) {
        info!(
            "Processed {}/{} files ({} included, {} excluded)",
            stats.processed,
            stats.discovered,
            stats.included + stats.unchanged,
            stats.excluded()
        );
    }

    fn finished(&self, result: &CommitResult, stats: &IngestStats) {
        match result {
            CommitResult::Committed { commit, files, .. } => {
                info!("Backup committed as {} ({} files)", commit, files)
            },
            CommitResult::NoChanges { head, .. } => info!("No changes since {}", head),
            CommitResult::DryRun { files, bytes } => {
                info!("Dry run: {} files, {} bytes would be backed up", files, bytes)
            },
        }
        if stats.failed > 0 {
            warn!("{} files could not be read", stats.failed);
        }
    }
}

/// Ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentObserver;

impl BackupObserver for SilentObserver {}
