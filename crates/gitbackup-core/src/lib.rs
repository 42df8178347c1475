//! # gitbackup core
//!
//! Domain types and the file eligibility engine for gitbackup.
//!
//! This crate contains no git code. It decides *which* files belong in a
//! snapshot:
//!
//! - [`pattern`] - ignore-style pattern compilation and matching
//! - [`exclusion`] - ordered pattern evaluation plus size and binary filters
//! - [`fs`] - source tree enumeration and the [`SourceFs`] read seam
//! - [`config`] - the validated [`BackupConfig`] record and its INI loader
//!
//! ## Example
//!
//! ```
//! use gitbackup_core::exclusion::ExclusionEvaluator;
//!
//! let rules = ExclusionEvaluator::new(&["*.log", "!keep.log"]);
//! assert!(rules.matches_patterns("debug.log"));
//! assert!(!rules.matches_patterns("keep.log"));
//! ```

pub mod config;
pub mod error;
pub mod exclusion;
pub mod fs;
pub mod pattern;

pub use config::{BackupConfig, BackupConfigBuilder, DEFAULT_EXCLUDES, PathLayout};
pub use error::{CoreError, Result};
pub use exclusion::{ExclusionEvaluator, Verdict};
pub use fs::{CandidateFile, LocalFs, SourceFs};
pub use pattern::{Pattern, pattern_matches};

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
