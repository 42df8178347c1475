use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::SystemTime;

use gitbackup_core::fs::{CandidateFile, SourceFs, enumerate};
use gitbackup_core::{ExclusionEvaluator, Verdict};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::{IngestStats, Payload};
use crate::error::SnapshotError;
use crate::observer::BackupObserver;
use crate::snapshot::IngestStrategy;

/// Payloads buffered between workers and the consumer.
pub const DEFAULT_QUEUE_DEPTH: usize = 64;

/// What a worker decided for one candidate.
enum Decision {
    Excluded(Verdict),
    Send(Payload),
    Failed(String),
}

/// Walks the source tree and feeds accepted files to an [`IngestStrategy`].
///
/// Classification and reads run on `workers` threads; the strategy runs on
/// the calling thread, so it may hold handles that are not `Send`.
pub struct IngestPipeline<'a> {
    root: PathBuf,
    evaluator: &'a ExclusionEvaluator,
    fs: &'a dyn SourceFs,
    observer: &'a dyn BackupObserver,
    workers: usize,
    queue_depth: usize,
    progress_interval: usize,
}

impl<'a> IngestPipeline<'a> {
    pub fn new(
        root: impl Into<PathBuf>,
        evaluator: &'a ExclusionEvaluator,
        fs: &'a dyn SourceFs,
        observer: &'a dyn BackupObserver,
    ) -> Self {
        Self {
            root: root.into(),
            evaluator,
            fs,
            observer,
            workers: num_cpus::get(),
            queue_depth: DEFAULT_QUEUE_DEPTH,
            progress_interval: 500,
        }
    }

    /// Sets the number of worker threads (at least one).
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Sets the channel capacity (at least one).
    pub fn queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth.max(1);
        self
    }

    /// Reports progress every `every` processed files; zero disables it.
    pub fn progress_interval(mut self, every: usize) -> Self {
        self.progress_interval = every;
        self
    }

    /// Runs ingestion to completion.
    ///
    /// Returns once every worker has exited and the channel is drained, or
    /// with the first error the strategy reports.
    pub fn run(&self, strategy: &mut dyn IngestStrategy) -> Result<IngestStats, SnapshotError> {
        let listing = enumerate(&self.root);

        let stats = Mutex::new(IngestStats {
            discovered: listing.files.len(),
            failed: listing.failures.len(),
            ..Default::default()
        });
        for failure in &listing.failures {
            let location = failure
                .path
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| self.root.display().to_string());
            self.observer
                .warning(&format!("Cannot enumerate {}: {}", location, failure.message));
        }

        let files = listing.files;
        let worker_count = self.workers.min(files.len()).max(1);
        let mirror = strategy.mirror_root().map(Path::to_path_buf);
        let cursor = AtomicUsize::new(0);

        info!(
            "Ingesting {} files from {:?} with {} workers",
            files.len(),
            self.root,
            worker_count
        );

        let (tx, mut rx) = mpsc::channel::<Payload>(self.queue_depth);

        let outcome = std::thread::scope(|scope| {
            for id in 0..worker_count {
                let tx = tx.clone();
                let files = &files;
                let cursor = &cursor;
                let stats = &stats;
                let mirror = mirror.as_deref();
                scope.spawn(move || self.work(id, files, cursor, stats, mirror, tx));
            }
            drop(tx);

            while let Some(payload) = rx.blocking_recv() {
                if let Err(e) = strategy.ingest(payload) {
                    // Dropping the receiver makes every pending send fail,
                    // which stops the workers.
                    drop(rx);
                    return Err(e);
                }
            }
            Ok(())
        });

        outcome?;

        let stats = stats.into_inner();
        debug!("Ingestion finished: {:?}", stats);
        Ok(stats)
    }

    fn work(
        &self,
        id: usize,
        files: &[CandidateFile],
        cursor: &AtomicUsize,
        stats: &Mutex<IngestStats>,
        mirror: Option<&Path>,
        tx: mpsc::Sender<Payload>,
    ) {
        let mut handled = 0usize;

        loop {
            let index = cursor.fetch_add(1, Ordering::Relaxed);
            let Some(file) = files.get(index) else {
                break;
            };

            let decision = self.decide(file, mirror);
            let payload = self.record(file, decision, stats);
            handled += 1;

            if let Some(payload) = payload {
                if tx.blocking_send(payload).is_err() {
                    debug!("Worker {} stopping: consumer is gone", id);
                    break;
                }
            }
        }

        debug!("Worker {} handled {} files", id, handled);
    }

    fn decide(&self, file: &CandidateFile, mirror: Option<&Path>) -> Decision {
        match self.evaluator.classify(file, self.fs) {
            Verdict::Included => {},
            Verdict::IncludedUnchecked { reason } => {
                self.observer.warning(&format!(
                    "Could not sample {} for binary content, including it: {}",
                    file.relative, reason
                ));
            },
            verdict => return Decision::Excluded(verdict),
        }

        if let Some(mirror) = mirror {
            if is_current(&mirror.join(&file.relative), file.modified) {
                return Decision::Send(Payload::Unchanged {
                    path: file.relative.clone(),
                });
            }
        }

        match self.fs.read(&file.path) {
            Ok(content) => Decision::Send(Payload::File {
                path: file.relative.clone(),
                content,
            }),
            Err(e) => Decision::Failed(e.to_string()),
        }
    }

    fn record(&self, file: &CandidateFile, decision: Decision, stats: &Mutex<IngestStats>) -> Option<Payload> {
        let (payload, snapshot) = {
            let mut stats = stats.lock();
            let payload = match decision {
                Decision::Excluded(verdict) => {
                    stats.record_exclusion(&verdict);
                    self.observer.file_excluded(&file.relative, &verdict);
                    None
                },
                Decision::Failed(reason) => {
                    stats.failed += 1;
                    stats.processed += 1;
                    self.observer
                        .warning(&format!("Failed to read {}: {}", file.relative, reason));
                    None
                },
                Decision::Send(payload) => {
                    stats.processed += 1;
                    match &payload {
                        Payload::File { content, .. } => {
                            stats.included += 1;
                            stats.bytes_read += content.len() as u64;
                            self.observer.file_included(&file.relative, content.len());
                        },
                        Payload::Unchanged { .. } => stats.unchanged += 1,
                    }
                    Some(payload)
                },
            };

            let due = self.progress_interval > 0 && stats.processed % self.progress_interval == 0;
            (payload, due.then(|| stats.clone()))
        };

        if let Some(snapshot) = snapshot {
            self.observer.progress(&snapshot);
        }
        payload
    }
}

/// A mirrored copy is current when it is a regular file at least as new as
/// the source.
fn is_current(copy: &Path, source_modified: Option<SystemTime>) -> bool {
    let Some(source_modified) = source_modified else {
        return false;
    };
    match std::fs::symlink_metadata(copy) {
        Ok(meta) if meta.is_file() => meta
            .modified()
            .map(|copy_modified| copy_modified >= source_modified)
            .unwrap_or(false),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::observer::SilentObserver;
    use crate::snapshot::CommitResult;

    /// Collects payloads in memory.
    #[derive(Default)]
    struct Collect {
        files: BTreeMap<String, Vec<u8>>,
        unchanged: Vec<String>,
        mirror: Option<PathBuf>,
        fail_on: Option<String>,
    }

    impl IngestStrategy for Collect {
        fn ingest(&mut self, payload: Payload) -> Result<(), SnapshotError> {
            if self.fail_on.as_deref() == Some(payload.path()) {
                return Err(SnapshotError::store("object database unavailable"));
            }
            match payload {
                Payload::File { path, content } => {
                    self.files.insert(path, content);
                },
                Payload::Unchanged { path } => self.unchanged.push(path),
            }
            Ok(())
        }

        fn finalize(self: Box<Self>) -> Result<CommitResult, SnapshotError> {
            Ok(CommitResult::DryRun {
                files: self.files.len(),
                bytes: 0,
            })
        }

        fn mirror_root(&self) -> Option<&Path> {
            self.mirror.as_deref()
        }
    }

    fn write(root: &Path, rel: &str, content: &[u8]) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_collects_included_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.txt", b"alpha");
        write(dir.path(), "b.tmp", b"scratch");
        write(dir.path(), "sub/c.txt", b"gamma");

        let evaluator = ExclusionEvaluator::new(&["*.tmp"]);
        let fs = gitbackup_core::LocalFs;
        let observer = SilentObserver;
        let mut collect = Collect::default();

        let stats = IngestPipeline::new(dir.path(), &evaluator, &fs, &observer)
            .workers(3)
            .run(&mut collect)
            .unwrap();

        assert_eq!(collect.files.keys().cloned().collect::<Vec<_>>(), vec!["a.txt", "sub/c.txt"]);
        assert_eq!(collect.files["sub/c.txt"], b"gamma");
        assert_eq!(stats.discovered, 3);
        assert_eq!(stats.processed, 3);
        assert_eq!(stats.included, 2);
        assert_eq!(stats.excluded_by_pattern, 1);
        assert_eq!(stats.bytes_read, 10);
    }

    #[test]
    fn test_empty_source_tree() {
        let dir = tempfile::tempdir().unwrap();
        let evaluator = ExclusionEvaluator::default();
        let fs = gitbackup_core::LocalFs;
        let observer = SilentObserver;
        let mut collect = Collect::default();

        let stats = IngestPipeline::new(dir.path(), &evaluator, &fs, &observer)
            .run(&mut collect)
            .unwrap();

        assert_eq!(stats, IngestStats::default());
        assert!(collect.files.is_empty());
    }

    #[test]
    fn test_current_mirror_copy_is_not_read() {
        let source = tempfile::tempdir().unwrap();
        let mirror = tempfile::tempdir().unwrap();
        write(source.path(), "a.txt", b"alpha");
        // Written after the source, so at least as new.
        write(mirror.path(), "a.txt", b"alpha");

        let evaluator = ExclusionEvaluator::default();
        let fs = gitbackup_core::LocalFs;
        let observer = SilentObserver;
        let mut collect = Collect {
            mirror: Some(mirror.path().to_path_buf()),
            ..Default::default()
        };

        let stats = IngestPipeline::new(source.path(), &evaluator, &fs, &observer)
            .run(&mut collect)
            .unwrap();

        assert_eq!(collect.unchanged, vec!["a.txt"]);
        assert!(collect.files.is_empty());
        assert_eq!(stats.unchanged, 1);
        assert_eq!(stats.bytes_read, 0);
    }

    #[test]
    fn test_consumer_error_stops_run() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..50 {
            write(dir.path(), &format!("f{:02}.txt", i), b"data");
        }

        let evaluator = ExclusionEvaluator::default();
        let fs = gitbackup_core::LocalFs;
        let observer = SilentObserver;
        let mut collect = Collect {
            fail_on: Some("f10.txt".into()),
            ..Default::default()
        };

        let err = IngestPipeline::new(dir.path(), &evaluator, &fs, &observer)
            .workers(4)
            .queue_depth(2)
            .run(&mut collect)
            .unwrap_err();

        assert!(err.is_store_error());
    }

    #[test]
    fn test_is_current_without_source_time() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.txt", b"x");
        assert!(!is_current(&dir.path().join("a.txt"), None));
        assert!(!is_current(&dir.path().join("missing.txt"), Some(SystemTime::now())));
    }

    #[test]
    fn test_directory_is_never_a_current_copy() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a/b.txt", b"x");
        assert!(!is_current(&dir.path().join("a"), Some(SystemTime::UNIX_EPOCH)));
        assert!(is_current(&dir.path().join("a/b.txt"), Some(SystemTime::UNIX_EPOCH)));
    }
}
