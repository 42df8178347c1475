use serde::Serialize;

use gitbackup_core::Verdict;

/// Counters describing one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestStats {
    /// Files found by enumeration.
    pub discovered: usize,
    /// Files for which a decision was reached.
    pub processed: usize,
    /// Files read and sent to the consumer.
    pub included: usize,
    /// Files skipped because the mirrored copy was current.
    pub unchanged: usize,
    /// Files left out by a pattern or the `.git` guard.
    pub excluded_by_pattern: usize,
    /// Files left out by the size limits.
    pub excluded_by_size: usize,
    /// Files left out as binary.
    pub excluded_binary: usize,
    /// Files or directories that could not be read.
    pub failed: usize,
    /// Content bytes read from the source.
    pub bytes_read: u64,
}

impl IngestStats {
    /// Total number of excluded files.
    pub fn excluded(&self) -> usize {
        self.excluded_by_pattern + self.excluded_by_size + self.excluded_binary
    }

    pub(crate) fn record_exclusion(&mut self, verdict: &Verdict) {
        match verdict {
            Verdict::GitMetadata | Verdict::Pattern { .. } => self.excluded_by_pattern += 1,
            Verdict::TooLarge { .. } | Verdict::TooSmall { .. } => self.excluded_by_size += 1,
            Verdict::Binary => self.excluded_binary += 1,
            Verdict::Included | Verdict::IncludedUnchecked { .. } => {},
        }
        self.processed += 1;
    }
}
