//! # gitbackup git engine
//!
//! Turns an eligible source tree into git snapshots.
//!
//! - [`store`] - the [`ObjectStore`] seam and its gix implementation
//! - [`ingest`] - worker pool that classifies and reads files
//! - [`snapshot`] - blob/tree/commit assembly and the store-mode strategies
//! - [`backup`] - [`BackupRunner`], which ties a configuration to all of the above
//!
//! Each run produces at most one commit. A run whose tree equals the
//! current head's tree produces none unless forced.

pub mod backup;
pub mod error;
pub mod ingest;
pub mod observer;
pub mod snapshot;
pub mod store;

pub use backup::{BackupOutcome, BackupRunner, RunOptions};
pub use error::SnapshotError;
pub use ingest::{IngestPipeline, IngestStats, Payload};
pub use observer::{BackupObserver, SilentObserver, TracingObserver};
pub use snapshot::{CommitRequest, CommitResult, IngestStrategy, SnapshotBuilder};
pub use store::{GitStore, ObjectId, ObjectStore, Signature};

// Re-export gitbackup_core for consumers
pub use gitbackup_core;
