use std::path::Path;

use crate::error::SnapshotError;
use crate::ingest::Payload;
use crate::snapshot::CommitResult;

/// Consumer side of the ingestion pipeline.
///
/// A strategy receives every accepted payload on the consumer thread and
/// turns the collected set into a snapshot when ingestion ends. Errors
/// returned from [`ingest`](IngestStrategy::ingest) abort the run; problems
/// with a single file are reported to the observer instead.
pub trait IngestStrategy {
    /// Handles one payload.
    fn ingest(&mut self, payload: Payload) -> Result<(), SnapshotError>;

    /// Builds the snapshot from everything ingested.
    fn finalize(self: Box<Self>) -> Result<CommitResult, SnapshotError>;

    /// Directory holding the mirrored copy, when workers may skip files
    /// whose copy is already current.
    fn mirror_root(&self) -> Option<&Path> {
        None
    }
}
