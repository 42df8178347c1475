use gitbackup_core::PathLayout;
use tracing::debug;

use super::{CommitRequest, CommitResult, IngestStrategy, SnapshotBuilder};
use crate::error::SnapshotError;
use crate::ingest::Payload;
use crate::observer::BackupObserver;
use crate::store::ObjectStore;

/// Writes each payload straight into the object store as a blob.
pub struct DirectStrategy<'a, S: ObjectStore + ?Sized> {
    builder: SnapshotBuilder<'a, S>,
    layout: PathLayout,
    request: CommitRequest,
    observer: &'a dyn BackupObserver,
}

impl<'a, S: ObjectStore + ?Sized> DirectStrategy<'a, S> {
    pub fn new(
        store: &'a mut S,
        layout: PathLayout,
        request: CommitRequest,
        observer: &'a dyn BackupObserver,
    ) -> Self {
        Self {
            builder: SnapshotBuilder::new(store),
            layout,
            request,
            observer,
        }
    }
}

impl<S: ObjectStore + ?Sized> IngestStrategy for DirectStrategy<'_, S> {
    fn ingest(&mut self, payload: Payload) -> Result<(), SnapshotError> {
        let (path, content) = match payload {
            Payload::File { path, content } => (path, content),
            Payload::Unchanged { path } => {
                debug!("Ignoring unchanged marker for {} in direct mode", path);
                return Ok(());
            },
        };

        let key = self.layout.apply(&path);
        if self.builder.contains(&key) {
            self.observer
                .warning(&format!("{} maps to {} which is already taken; keeping the later file", path, key));
        }

        if let Err(e) = self.builder.add_file(&key, &content) {
            self.observer
                .warning(&format!("Failed to store {}: {}", path, e));
        }
        Ok(())
    }

    fn finalize(self: Box<Self>) -> Result<CommitResult, SnapshotError> {
        self.builder.finish(&self.request)
    }
}
