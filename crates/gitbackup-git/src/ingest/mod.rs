//! Concurrent ingestion of the source tree.
//!
//! Workers enumerate nothing themselves: they claim candidates from the
//! enumerated list, run the exclusion checks, read accepted files and send
//! [`Payload`]s over a bounded channel to a single consumer that owns the
//! snapshot store.

mod payload;
mod pipeline;
mod stats;

pub use payload::Payload;
pub use pipeline::{DEFAULT_QUEUE_DEPTH, IngestPipeline};
pub use stats::IngestStats;
