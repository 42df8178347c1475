//! Backup run configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// How relative paths are laid out inside the snapshot tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathLayout {
    /// Keep the directory structure of the source tree.
    #[default]
    Preserve,
    /// Legacy layout: every file at the top level, separators replaced by
    /// underscores (`a/b/c.txt` becomes `a_b_c.txt`).
    Flatten,
}

impl PathLayout {
    /// Maps a normalized relative path to its name inside the tree.
    pub fn apply(self, relative: &str) -> String {
        match self {
            Self::Preserve => relative.replace('\\', "/"),
            Self::Flatten => relative.replace(['/', '\\'], "_"),
        }
    }
}

/// Configuration for a backup run.
///
/// Built through [`BackupConfig::builder`], which validates the record.
/// The configuration is immutable for the duration of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupConfig {
    /// Directory tree to back up.
    source_root: PathBuf,

    /// Destination repository path.
    snapshot_store: PathBuf,

    /// Name recorded as author and committer.
    author_name: String,

    /// Email recorded as author and committer.
    author_email: String,

    /// Ordered ignore-style patterns.
    #[serde(default)]
    exclusion_patterns: Vec<String>,

    /// Write objects directly into a bare repository instead of copying
    /// files into a working tree.
    #[serde(default = "default_true")]
    use_flat_store: bool,

    /// Files larger than this are skipped (0 = unbounded).
    #[serde(default)]
    max_file_size: u64,

    /// Files smaller than this are skipped (0 = unbounded).
    #[serde(default)]
    min_file_size: u64,

    /// Skip files whose content looks binary.
    #[serde(default)]
    exclude_binary: bool,

    /// Branch that carries the snapshot history.
    #[serde(default = "default_branch")]
    branch: String,

    /// Path layout used in flat mode.
    #[serde(default)]
    path_layout: PathLayout,

    /// Worker threads for ingestion (defaults to the number of CPUs).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    workers: Option<usize>,

    /// Emit a progress event every this many files.
    #[serde(default = "default_progress_interval")]
    progress_interval: usize,
}

fn default_true() -> bool {
    true
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_progress_interval() -> usize {
    500
}

impl BackupConfig {
    /// Creates a new builder for BackupConfig.
    pub fn builder() -> BackupConfigBuilder {
        BackupConfigBuilder::default()
    }

    /// Returns the source root.
    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// Returns the destination repository path.
    pub fn snapshot_store(&self) -> &Path {
        &self.snapshot_store
    }

    /// Returns the author name.
    pub fn author_name(&self) -> &str {
        &self.author_name
    }

    /// Returns the author email.
    pub fn author_email(&self) -> &str {
        &self.author_email
    }

    /// Returns the exclusion patterns in configured order.
    pub fn exclusion_patterns(&self) -> &[String] {
        &self.exclusion_patterns
    }

    /// Returns true for flat (bare, direct object) mode.
    pub fn use_flat_store(&self) -> bool {
        self.use_flat_store
    }

    /// Returns the maximum file size (0 = unbounded).
    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Returns the minimum file size (0 = unbounded).
    pub fn min_file_size(&self) -> u64 {
        self.min_file_size
    }

    /// Returns whether binary files are excluded.
    pub fn exclude_binary(&self) -> bool {
        self.exclude_binary
    }

    /// Returns the snapshot branch name.
    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Returns the path layout.
    pub fn path_layout(&self) -> PathLayout {
        self.path_layout
    }

    /// Returns the configured worker count, if any.
    pub fn workers(&self) -> Option<usize> {
        self.workers
    }

    /// Returns the progress reporting interval.
    pub fn progress_interval(&self) -> usize {
        self.progress_interval
    }

    /// Re-checks the invariants a builder enforces. Useful after
    /// deserializing a record from elsewhere.
    pub fn validate(&self) -> Result<()> {
        if self.author_name.trim().is_empty() {
            return Err(CoreError::invalid_config("author_name", "cannot be empty"));
        }
        if self.author_email.trim().is_empty() {
            return Err(CoreError::invalid_config("author_email", "cannot be empty"));
        }
        if self.branch.trim().is_empty() || self.branch.contains(char::is_whitespace) {
            return Err(CoreError::invalid_config("branch", "must be a single word"));
        }
        if self.max_file_size > 0 && self.min_file_size > self.max_file_size {
            return Err(CoreError::invalid_config(
                "min_file_size",
                format!(
                    "{} is larger than max_file_size {}",
                    self.min_file_size, self.max_file_size
                ),
            ));
        }
        if self.workers == Some(0) {
            return Err(CoreError::invalid_config("workers", "must be at least 1"));
        }

        if !self.source_root.is_dir() {
            return Err(CoreError::source_root_missing(&self.source_root));
        }
        if self.snapshot_store.as_os_str().is_empty() {
            return Err(CoreError::invalid_config("snapshot_store", "cannot be empty"));
        }

        let source = std::fs::canonicalize(&self.source_root)?;
        let store = absolute_lenient(&self.snapshot_store);
        if store.starts_with(&source) {
            return Err(CoreError::invalid_config(
                "snapshot_store",
                "must not be inside the source root",
            ));
        }

        Ok(())
    }
}

/// Canonicalizes the longest existing ancestor of `path` and re-appends the
/// rest, so paths that do not exist yet can still be compared.
fn absolute_lenient(path: &Path) -> PathBuf {
    let mut existing = path.to_path_buf();
    let mut rest = Vec::new();

    loop {
        if let Ok(canonical) = std::fs::canonicalize(&existing) {
            let mut out = canonical;
            for part in rest.iter().rev() {
                out.push(part);
            }
            return out;
        }
        match (existing.file_name().map(|n| n.to_os_string()), existing.parent()) {
            (Some(name), Some(parent)) => {
                rest.push(name);
                existing = parent.to_path_buf();
            },
            _ => return path.to_path_buf(),
        }
    }
}

/// Builder for BackupConfig.
#[derive(Debug, Default)]
pub struct BackupConfigBuilder {
    source_root: Option<PathBuf>,
    snapshot_store: Option<PathBuf>,
    author_name: Option<String>,
    author_email: Option<String>,
    exclusion_patterns: Vec<String>,
    use_flat_store: Option<bool>,
    max_file_size: u64,
    min_file_size: u64,
    exclude_binary: bool,
    branch: Option<String>,
    path_layout: PathLayout,
    workers: Option<usize>,
    progress_interval: Option<usize>,
}

impl BackupConfigBuilder {
    /// Sets the source root.
    pub fn source_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_root = Some(path.into());
        self
    }

    /// Sets the destination repository path.
    pub fn snapshot_store(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_store = Some(path.into());
        self
    }

    /// Sets the author identity.
    pub fn author(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.author_name = Some(name.into());
        self.author_email = Some(email.into());
        self
    }

    /// Appends one exclusion pattern.
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclusion_patterns.push(pattern.into());
        self
    }

    /// Replaces the exclusion patterns.
    pub fn exclusion_patterns(mut self, patterns: Vec<impl Into<String>>) -> Self {
        self.exclusion_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Selects flat (bare) or working-copy mode.
    pub fn use_flat_store(mut self, flat: bool) -> Self {
        self.use_flat_store = Some(flat);
        self
    }

    /// Sets the size window (0 = unbounded).
    pub fn file_size_limits(mut self, min: u64, max: u64) -> Self {
        self.min_file_size = min;
        self.max_file_size = max;
        self
    }

    /// Enables the binary content filter.
    pub fn exclude_binary(mut self, exclude: bool) -> Self {
        self.exclude_binary = exclude;
        self
    }

    /// Sets the snapshot branch.
    pub fn branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Sets the path layout.
    pub fn path_layout(mut self, layout: PathLayout) -> Self {
        self.path_layout = layout;
        self
    }

    /// Sets the ingestion worker count.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Sets the progress reporting interval.
    pub fn progress_interval(mut self, every: usize) -> Self {
        self.progress_interval = Some(every);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a required field is missing, a value is out of
    /// range, or the source root does not exist.
    pub fn build(self) -> Result<BackupConfig> {
        let source_root = self
            .source_root
            .ok_or_else(|| CoreError::invalid_config("source_root", "is required"))?;
        let snapshot_store = self
            .snapshot_store
            .ok_or_else(|| CoreError::invalid_config("snapshot_store", "is required"))?;
        let author_name = self
            .author_name
            .ok_or_else(|| CoreError::invalid_config("author_name", "is required"))?;
        let author_email = self
            .author_email
            .ok_or_else(|| CoreError::invalid_config("author_email", "is required"))?;

        let config = BackupConfig {
            source_root,
            snapshot_store,
            author_name,
            author_email,
            exclusion_patterns: self.exclusion_patterns,
            use_flat_store: self.use_flat_store.unwrap_or(true),
            max_file_size: self.max_file_size,
            min_file_size: self.min_file_size,
            exclude_binary: self.exclude_binary,
            branch: self.branch.unwrap_or_else(default_branch),
            path_layout: self.path_layout,
            workers: self.workers,
            progress_interval: self
                .progress_interval
                .unwrap_or_else(default_progress_interval),
        };

        config.validate()?;
        Ok(config)
    }
}
