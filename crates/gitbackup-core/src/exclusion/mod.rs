//! File eligibility rules.
//!
//! An [`ExclusionEvaluator`] combines the ordered ignore patterns with the
//! size and binary-content filters and decides, per file, whether it takes
//! part in a snapshot.

mod binary;
mod evaluator;

pub use binary::{SNIFF_LIMIT, looks_binary};
pub use evaluator::{ExclusionEvaluator, Verdict, is_git_metadata};
