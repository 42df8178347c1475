use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use gitbackup_core::fs::enumerate;
use tracing::{debug, info};

use super::{CommitRequest, CommitResult, IngestStrategy, SnapshotBuilder};
use crate::error::SnapshotError;
use crate::ingest::Payload;
use crate::observer::BackupObserver;
use crate::store::ObjectStore;

const GITIGNORE: &str = ".gitignore";

/// Mirrors accepted files into the store's working tree, then stages the
/// whole tree and commits it.
///
/// Files in the working tree that no longer exist in the source (or are now
/// excluded) are removed before staging. `.gitignore` is regenerated from
/// the exclusion patterns on every run, so a root `.gitignore` in the source
/// is reported and skipped.
pub struct WorkingCopyStrategy<'a, S: ObjectStore + ?Sized> {
    store: &'a mut S,
    worktree: PathBuf,
    ignore_lines: Vec<String>,
    request: CommitRequest,
    observer: &'a dyn BackupObserver,
    present: BTreeSet<String>,
}

impl<'a, S: ObjectStore + ?Sized> WorkingCopyStrategy<'a, S> {
    pub fn new(
        store: &'a mut S,
        worktree: impl Into<PathBuf>,
        ignore_lines: &[String],
        request: CommitRequest,
        observer: &'a dyn BackupObserver,
    ) -> Self {
        Self {
            store,
            worktree: worktree.into(),
            ignore_lines: ignore_lines.to_vec(),
            request,
            observer,
            present: BTreeSet::new(),
        }
    }

    fn write_copy(&self, path: &str, content: &[u8]) -> std::io::Result<()> {
        let dest = self.worktree.join(path);
        self.clear_conflicts(&dest)?;
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(dest, content)
    }

    /// Removes whatever stands in the way of writing a file at `dest`: an
    /// older file where a parent directory is now needed, or an older
    /// directory where the file now goes.
    fn clear_conflicts(&self, dest: &Path) -> std::io::Result<()> {
        for ancestor in dest.ancestors().skip(1) {
            if ancestor == self.worktree || !ancestor.starts_with(&self.worktree) {
                break;
            }
            if std::fs::symlink_metadata(ancestor).is_ok_and(|m| !m.is_dir()) {
                debug!("Replacing stale copy {:?} with a directory", ancestor);
                std::fs::remove_file(ancestor)?;
            }
        }

        if std::fs::symlink_metadata(dest).is_ok_and(|m| m.is_dir()) {
            debug!("Replacing stale directory {:?} with a file", dest);
            std::fs::remove_dir_all(dest)?;
        }
        Ok(())
    }

    fn prune_stale(&self) {
        let listing = enumerate(&self.worktree);
        let mut removed = 0usize;

        for file in listing.files {
            if file.relative == GITIGNORE || self.present.contains(&file.relative) {
                continue;
            }
            match std::fs::remove_file(&file.path) {
                Ok(()) => {
                    debug!("Removed stale copy {}", file.relative);
                    removed += 1;
                },
                Err(e) => self
                    .observer
                    .warning(&format!("Failed to remove stale copy {}: {}", file.relative, e)),
            }
        }

        if removed > 0 {
            info!("Removed {} stale files from the working copy", removed);
        }
    }

    fn write_gitignore(&self) -> Result<(), SnapshotError> {
        let path = self.worktree.join(GITIGNORE);
        let mut content = self.ignore_lines.join("\n");
        content.push('\n');
        std::fs::write(&path, content).map_err(|e| SnapshotError::worktree(&path, e.to_string()))
    }
}

impl<S: ObjectStore + ?Sized> IngestStrategy for WorkingCopyStrategy<'_, S> {
    fn ingest(&mut self, payload: Payload) -> Result<(), SnapshotError> {
        if payload.path() == GITIGNORE {
            self.observer.warning(
                "Source .gitignore is not backed up in working-copy mode; \
                 the store's .gitignore is generated from the exclusion patterns",
            );
            return Ok(());
        }

        match payload {
            Payload::Unchanged { path } => {
                self.present.insert(path);
            },
            Payload::File { path, content } => match self.write_copy(&path, &content) {
                Ok(()) => {
                    self.present.insert(path);
                },
                Err(e) => {
                    self.observer
                        .warning(&format!("Failed to copy {} into the working tree: {}", path, e));
                    // Keep whatever older copy is there rather than pruning it.
                    if self.worktree.join(&path).is_file() {
                        self.present.insert(path);
                    }
                },
            },
        }
        Ok(())
    }

    fn finalize(self: Box<Self>) -> Result<CommitResult, SnapshotError> {
        self.prune_stale();
        self.write_gitignore()?;

        let Self {
            store,
            worktree,
            request,
            observer,
            mut present,
            ..
        } = *self;
        present.insert(GITIGNORE.to_string());

        let mut builder = SnapshotBuilder::new(&mut *store);
        for path in &present {
            let content = match std::fs::read(worktree.join(path)) {
                Ok(content) => content,
                Err(e) => {
                    observer.warning(&format!("Failed to stage {}: {}", path, e));
                    continue;
                },
            };
            if let Err(e) = builder.add_file(path, &content) {
                observer.warning(&format!("Failed to store {}: {}", path, e));
            }
        }

        let result = builder.finish(&request)?;

        if let CommitResult::Committed { tree, .. } = &result {
            if let Err(e) = store.sync_index(*tree) {
                observer.warning(&format!("Failed to refresh the index: {}", e));
            }
        }

        Ok(result)
    }

    fn mirror_root(&self) -> Option<&Path> {
        Some(&self.worktree)
    }
}
