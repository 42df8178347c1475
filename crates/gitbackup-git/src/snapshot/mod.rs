//! Snapshot construction.
//!
//! The [`SnapshotBuilder`] turns accepted file contents into blobs, a tree
//! and a commit. How payloads reach it depends on the store mode, captured
//! by the [`IngestStrategy`] implementations:
//!
//! - [`DirectStrategy`] - blobs straight into the object store
//! - [`WorkingCopyStrategy`] - mirror into the store's working tree, then stage
//! - [`DryRunStrategy`] - count only, nothing written

mod builder;
mod direct;
mod dry_run;
mod strategy;
mod working_copy;

pub use builder::{CommitRequest, CommitResult, SnapshotBuilder, commit_message};
pub use direct::DirectStrategy;
pub use dry_run::DryRunStrategy;
pub use strategy::IngestStrategy;
pub use working_copy::WorkingCopyStrategy;
