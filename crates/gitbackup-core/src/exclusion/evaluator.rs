//! Ordered exclusion evaluation.

use std::fmt;

use tracing::trace;

use super::binary::{SNIFF_LIMIT, looks_binary};
use crate::config::BackupConfig;
use crate::fs::{CandidateFile, SourceFs};
use crate::pattern::{Pattern, normalize_path};

/// Outcome of evaluating one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The file belongs in the snapshot.
    Included,
    /// The file is included, but its content could not be sniffed for
    /// binary data.
    IncludedUnchecked {
        /// Why the sample could not be read.
        reason: String,
    },
    /// The path is inside a `.git` directory.
    GitMetadata,
    /// The last matching pattern excluded the path.
    Pattern {
        /// The pattern that decided the outcome.
        pattern: String,
    },
    /// The file is larger than the configured maximum.
    TooLarge {
        size: u64,
        limit: u64,
    },
    /// The file is smaller than the configured minimum.
    TooSmall {
        size: u64,
        limit: u64,
    },
    /// The file content looks binary.
    Binary,
}

impl Verdict {
    /// Returns true if the file must be left out of the snapshot.
    pub fn is_excluded(&self) -> bool {
        !matches!(self, Self::Included | Self::IncludedUnchecked { .. })
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Included => write!(f, "included"),
            Self::IncludedUnchecked { reason } => write!(f, "included (unchecked: {})", reason),
            Self::GitMetadata => write!(f, "git metadata"),
            Self::Pattern { pattern } => write!(f, "pattern '{}'", pattern),
            Self::TooLarge { size, limit } => write!(f, "size {} > max {}", size, limit),
            Self::TooSmall { size, limit } => write!(f, "size {} < min {}", size, limit),
            Self::Binary => write!(f, "binary content"),
        }
    }
}

#[derive(Debug, Clone)]
struct Rule {
    negated: bool,
    pattern: Pattern,
}

/// Decides whether files are eligible for a snapshot.
///
/// Patterns are evaluated in configured order and the last matching one
/// wins: a plain pattern excludes, a `!pattern` re-includes. Blank lines
/// and `#` comments are ignored.
#[derive(Debug, Clone, Default)]
pub struct ExclusionEvaluator {
    rules: Vec<Rule>,
    lines: Vec<String>,
    max_file_size: u64,
    min_file_size: u64,
    exclude_binary: bool,
}

impl ExclusionEvaluator {
    /// Compiles an evaluator from ordered pattern lines with no size or
    /// content filters.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let lines: Vec<String> = patterns.iter().map(|p| p.as_ref().to_string()).collect();

        let rules = lines
            .iter()
            .filter_map(|line| {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    return None;
                }
                let (negated, body) = match line.strip_prefix('!') {
                    Some(body) => (true, body),
                    None => (false, line),
                };
                Some(Rule {
                    negated,
                    pattern: Pattern::compile(body),
                })
            })
            .collect();

        Self {
            rules,
            lines,
            ..Self::default()
        }
    }

    /// Builds the evaluator described by a backup configuration.
    pub fn from_config(config: &BackupConfig) -> Self {
        Self::new(config.exclusion_patterns())
            .with_size_limits(config.min_file_size(), config.max_file_size())
            .with_binary_exclusion(config.exclude_binary())
    }

    /// Sets the size window. A limit of 0 disables that bound.
    pub fn with_size_limits(mut self, min: u64, max: u64) -> Self {
        self.min_file_size = min;
        self.max_file_size = max;
        self
    }

    /// Enables or disables the binary content filter.
    pub fn with_binary_exclusion(mut self, enabled: bool) -> Self {
        self.exclude_binary = enabled;
        self
    }

    /// Returns the pattern lines as configured, comments included.
    pub fn pattern_lines(&self) -> &[String] {
        &self.lines
    }

    /// Applies only the `.git` guard and the ordered patterns.
    ///
    /// Returns the pattern that excluded the path, if any.
    pub fn excluding_pattern(&self, relative: &str) -> Option<&str> {
        let path = normalize_path(relative);
        let mut decided: Option<&Rule> = None;

        for rule in &self.rules {
            if rule.pattern.matches(&path) {
                decided = Some(rule);
            }
        }

        decided
            .filter(|rule| !rule.negated)
            .map(|rule| rule.pattern.as_str())
    }

    /// Returns true if the ordered patterns exclude `relative`.
    pub fn matches_patterns(&self, relative: &str) -> bool {
        is_git_metadata(relative) || self.excluding_pattern(relative).is_some()
    }

    /// Classifies a candidate file.
    ///
    /// File content is only sampled when every cheaper rule has already
    /// let the file through, so excluded files are never opened.
    pub fn classify(&self, file: &CandidateFile, fs: &dyn SourceFs) -> Verdict {
        if is_git_metadata(&file.relative) {
            return Verdict::GitMetadata;
        }

        if let Some(pattern) = self.excluding_pattern(&file.relative) {
            trace!("{} excluded by pattern {:?}", file.relative, pattern);
            return Verdict::Pattern {
                pattern: pattern.to_string(),
            };
        }

        if let Some(size) = file.size {
            if self.max_file_size > 0 && size > self.max_file_size {
                return Verdict::TooLarge {
                    size,
                    limit: self.max_file_size,
                };
            }
            if self.min_file_size > 0 && size < self.min_file_size {
                return Verdict::TooSmall {
                    size,
                    limit: self.min_file_size,
                };
            }
        }

        if self.exclude_binary {
            if file.size == Some(0) {
                return Verdict::Included;
            }
            return match fs.read_head(&file.path, SNIFF_LIMIT) {
                Ok(sample) if looks_binary(&sample) => Verdict::Binary,
                Ok(_) => Verdict::Included,
                Err(e) => Verdict::IncludedUnchecked {
                    reason: e.to_string(),
                },
            };
        }

        Verdict::Included
    }

    /// Returns true if `file` must be left out of the snapshot.
    pub fn is_excluded(&self, file: &CandidateFile, fs: &dyn SourceFs) -> bool {
        self.classify(file, fs).is_excluded()
    }
}

/// Returns true for `.git` itself and anything below a `.git/` segment.
pub fn is_git_metadata(relative: &str) -> bool {
    let path = normalize_path(relative).to_lowercase();
    path == ".git" || path.starts_with(".git/") || path.contains("/.git/") || path.ends_with("/.git")
}
