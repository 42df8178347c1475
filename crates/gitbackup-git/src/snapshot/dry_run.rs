use super::{CommitResult, IngestStrategy};
use crate::error::SnapshotError;
use crate::ingest::Payload;

/// Counts what a run would store without touching any repository.
#[derive(Debug, Default)]
pub struct DryRunStrategy {
    files: usize,
    bytes: u64,
}

impl DryRunStrategy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IngestStrategy for DryRunStrategy {
    fn ingest(&mut self, payload: Payload) -> Result<(), SnapshotError> {
        self.files += 1;
        self.bytes += payload.len() as u64;
        Ok(())
    }

    fn finalize(self: Box<Self>) -> Result<CommitResult, SnapshotError> {
        Ok(CommitResult::DryRun {
            files: self.files,
            bytes: self.bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_files_and_bytes() {
        let mut strategy = Box::new(DryRunStrategy::new());
        strategy
            .ingest(Payload::File {
                path: "a.txt".into(),
                content: b"hello".to_vec(),
            })
            .unwrap();
        strategy
            .ingest(Payload::File {
                path: "b.txt".into(),
                content: b"!".to_vec(),
            })
            .unwrap();

        assert_eq!(strategy.finalize().unwrap(), CommitResult::DryRun { files: 2, bytes: 6 });
    }
}
