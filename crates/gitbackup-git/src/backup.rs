//! End-to-end backup runs.

use std::path::PathBuf;
use std::sync::Arc;

use gitbackup_core::{BackupConfig, DEFAULT_EXCLUDES, ExclusionEvaluator, LocalFs, PathLayout, SourceFs};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::SnapshotError;
use crate::ingest::{IngestPipeline, IngestStats};
use crate::observer::{BackupObserver, TracingObserver};
use crate::snapshot::{
    CommitRequest, CommitResult, DirectStrategy, DryRunStrategy, IngestStrategy, WorkingCopyStrategy,
};
use crate::store::{GitStore, ObjectStore};

/// Per-run switches that are not part of the configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Evaluate and read files but write nothing.
    pub dry_run: bool,
    /// Commit even when nothing changed.
    pub force: bool,
}

/// Summary of a finished run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupOutcome {
    pub result: CommitResult,
    pub stats: IngestStats,
    pub store: PathBuf,
    pub branch: Option<String>,
}

/// Drives one configuration through ingestion and commit.
///
/// # Example
///
/// ```ignore
/// use gitbackup_core::BackupConfig;
/// use gitbackup_git::{BackupRunner, RunOptions};
///
/// let config = BackupConfig::builder()
///     .source_root("/home/me/notes")
///     .snapshot_store("/backups/notes.git")
///     .author("Backup", "backup@example.com")
///     .build()?;
///
/// let outcome = BackupRunner::new(config).run(RunOptions::default()).await?;
/// println!("{:?}", outcome.result);
/// ```
#[derive(Clone)]
pub struct BackupRunner {
    config: BackupConfig,
    fs: Arc<dyn SourceFs>,
    observer: Arc<dyn BackupObserver>,
}

impl std::fmt::Debug for BackupRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupRunner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl BackupRunner {
    /// Creates a runner reading the local file system and logging through
    /// `tracing`.
    pub fn new(config: BackupConfig) -> Self {
        Self {
            config,
            fs: Arc::new(LocalFs),
            observer: Arc::new(TracingObserver),
        }
    }

    /// Replaces the source file system.
    pub fn with_source_fs(mut self, fs: Arc<dyn SourceFs>) -> Self {
        self.fs = fs;
        self
    }

    /// Replaces the event observer.
    pub fn with_observer(mut self, observer: Arc<dyn BackupObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &BackupConfig {
        &self.config
    }

    /// Runs the backup on a blocking thread.
    pub async fn run(&self, options: RunOptions) -> Result<BackupOutcome, SnapshotError> {
        let runner = self.clone();
        tokio::task::spawn_blocking(move || runner.run_blocking(options))
            .await
            .map_err(|e| SnapshotError::task(format!("Backup task failed: {}", e)))?
    }

    /// Runs the backup on the current thread.
    ///
    /// Must not be called from within an async context; use
    /// [`run`](Self::run) there.
    pub fn run_blocking(&self, options: RunOptions) -> Result<BackupOutcome, SnapshotError> {
        self.config.validate()?;

        let config = &self.config;
        let evaluator = ExclusionEvaluator::from_config(config);
        let workers = config.workers().unwrap_or_else(num_cpus::get);
        let pipeline = IngestPipeline::new(config.source_root(), &evaluator, self.fs.as_ref(), self.observer.as_ref())
            .workers(workers)
            .progress_interval(config.progress_interval());
        let request = CommitRequest::now(config.author_name(), config.author_email(), options.force);

        info!(
            "Backing up {:?} into {:?}{}",
            config.source_root(),
            config.snapshot_store(),
            if options.dry_run { " (dry run)" } else { "" }
        );

        let (result, stats, branch) = if options.dry_run {
            let mut strategy = Box::new(DryRunStrategy::new());
            let stats = pipeline.run(strategy.as_mut())?;
            (strategy.finalize()?, stats, None)
        } else {
            let identity = (config.author_name(), config.author_email());
            let mut store = GitStore::open_or_init(
                config.snapshot_store(),
                config.use_flat_store(),
                config.branch(),
                identity,
            )?;
            let branch = store.head_branch().to_string();

            let mut strategy: Box<dyn IngestStrategy + '_> = if config.use_flat_store() {
                Box::new(DirectStrategy::new(
                    &mut store,
                    config.path_layout(),
                    request,
                    self.observer.as_ref(),
                ))
            } else {
                if config.path_layout() == PathLayout::Flatten {
                    warn!("Flattened paths only apply to the flat store; keeping directory layout");
                }
                let worktree = store.workdir().ok_or_else(|| {
                    SnapshotError::store(format!(
                        "{:?} is a bare repository; working copy mode needs a working tree",
                        config.snapshot_store()
                    ))
                })?;
                let ignore_lines: Vec<String> = if evaluator.pattern_lines().is_empty() {
                    DEFAULT_EXCLUDES.iter().map(|p| p.to_string()).collect()
                } else {
                    evaluator.pattern_lines().to_vec()
                };
                Box::new(WorkingCopyStrategy::new(
                    &mut store,
                    worktree,
                    &ignore_lines,
                    request,
                    self.observer.as_ref(),
                ))
            };

            let stats = pipeline.run(strategy.as_mut())?;
            (strategy.finalize()?, stats, Some(branch))
        };

        self.observer.finished(&result, &stats);

        Ok(BackupOutcome {
            result,
            stats,
            store: config.snapshot_store().to_path_buf(),
            branch,
        })
    }
}
