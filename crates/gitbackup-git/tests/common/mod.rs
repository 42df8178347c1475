#![allow(dead_code)]
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gitbackup_core::{BackupConfigBuilder, LocalFs, SourceFs, Verdict};
use gitbackup_git::{BackupObserver, CommitResult, GitStore, IngestStats, ObjectId};
use parking_lot::Mutex;
use tempfile::TempDir;

pub const AUTHOR: (&str, &str) = ("Backup Bot", "backup@example.com");

/// Writes `content` to `rel` below `root`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, content: &[u8]) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

/// A source tree and a separate directory for the store.
pub struct Fixture {
    pub source: TempDir,
    pub target: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            source: tempfile::tempdir().unwrap(),
            target: tempfile::tempdir().unwrap(),
        }
    }

    pub fn write(&self, rel: &str, content: &[u8]) {
        write_file(self.source.path(), rel, content);
    }

    pub fn store_path(&self) -> PathBuf {
        self.target.path().join("snapshots")
    }

    /// Builder preloaded with paths and identity.
    pub fn config(&self) -> BackupConfigBuilder {
        gitbackup_core::BackupConfig::builder()
            .source_root(self.source.path())
            .snapshot_store(self.store_path())
            .author(AUTHOR.0, AUTHOR.1)
            .workers(4)
    }

    pub fn open_store(&self) -> GitStore {
        GitStore::open(&self.store_path(), "main", AUTHOR).unwrap()
    }

    /// Commit ids on the snapshot branch, newest first.
    pub fn history(&self) -> Vec<ObjectId> {
        use gitbackup_git::ObjectStore;

        let store = self.open_store();
        let mut out = Vec::new();
        let mut next = store.head_commit().unwrap();
        while let Some(commit) = next {
            out.push(commit);
            next = store.parents_of(commit).unwrap().first().copied();
        }
        out
    }

    /// Files in the head snapshot.
    pub fn head_files(&self) -> std::collections::BTreeMap<String, Vec<u8>> {
        use gitbackup_git::ObjectStore;

        let store = self.open_store();
        let head = store.head_commit().unwrap().expect("no snapshot yet");
        store.read_tree(store.tree_of(head).unwrap()).unwrap()
    }
}

/// [`SourceFs`] that counts every open per path.
#[derive(Default)]
pub struct CountingFs {
    opens: Mutex<HashMap<PathBuf, usize>>,
}

impl CountingFs {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn opens(&self, path: &Path) -> usize {
        self.opens.lock().get(path).copied().unwrap_or(0)
    }

    fn record(&self, path: &Path) {
        *self.opens.lock().entry(path.to_path_buf()).or_default() += 1;
    }
}

impl SourceFs for CountingFs {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.record(path);
        LocalFs.read(path)
    }

    fn read_head(&self, path: &Path, limit: usize) -> io::Result<Vec<u8>> {
        self.record(path);
        LocalFs.read_head(path, limit)
    }
}

/// [`SourceFs`] whose full reads fail for one path.
pub struct FailingFs {
    broken: PathBuf,
}

impl FailingFs {
    pub fn new(broken: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self { broken: broken.into() })
    }
}

impl SourceFs for FailingFs {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        if path == self.broken {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "access denied"));
        }
        LocalFs.read(path)
    }

    fn read_head(&self, path: &Path, limit: usize) -> io::Result<Vec<u8>> {
        LocalFs.read_head(path, limit)
    }
}

/// Observer that keeps every event.
#[derive(Default)]
pub struct RecordingObserver {
    pub included: Mutex<Vec<String>>,
    pub excluded: Mutex<Vec<(String, Verdict)>>,
    pub warnings: Mutex<Vec<String>>,
    pub progress: Mutex<Vec<IngestStats>>,
    pub finished: Mutex<Option<CommitResult>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings.lock().clone()
    }

    pub fn excluded_paths(&self) -> Vec<String> {
        let mut paths: Vec<_> = self.excluded.lock().iter().map(|(p, _)| p.clone()).collect();
        paths.sort();
        paths
    }
}

impl BackupObserver for RecordingObserver {
    fn file_included(&self, path: &str, _bytes: usize) {
        self.included.lock().push(path.to_string());
    }

    fn file_excluded(&self, path: &str, verdict: &Verdict) {
        self.excluded.lock().push((path.to_string(), verdict.clone()));
    }

    fn warning(&self, message: &str) {
        self.warnings.lock().push(message.to_string());
    }

    fn progress(&self, stats: &IngestStats) {
        self.progress.lock().push(stats.clone());
    }

    fn finished(&self, result: &CommitResult, _stats: &IngestStats) {
        *self.finished.lock() = Some(result.clone());
    }
}
