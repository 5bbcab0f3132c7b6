//! tempo-sync: per-task stream synchronization.
//!
//! One `StreamGroup` per processing task drains records staged by the
//! fetcher into per-partition queues, delivers them one at a time to their
//! receivers while advancing a monotonic stream-time clock, biases
//! consumption toward the partition that is furthest behind in event time,
//! applies per-partition backpressure to the fetcher, and fires punctuation
//! callbacks at registered stream-time targets.
//!
//! Quick example:
//! ```no_run
//! use std::sync::Arc;
//! use serde_json::Value;
//! use tempo_core::prelude::*;
//! use tempo_sync::{ProcessStatus, StreamGroup};
//!
//! struct Printer;
//! impl Receiver for Printer {
//!     fn receive(&self, key: Value, value: Value, _record_time: i64, stream_time: i64)
//!         -> tempo_core::Result<()>
//!     {
//!         println!("{key} {value} @ {stream_time}");
//!         Ok(())
//!     }
//! }
//!
//! struct Fetcher;
//! impl Ingestor for Fetcher {
//!     fn pause(&self, _partition: &PartitionId) {}
//!     fn unpause(&self, _partition: &PartitionId, _from_offset: i64) {}
//! }
//!
//! # fn main() -> tempo_core::Result<()> {
//! let group = StreamGroup::new(
//!     "task-0",
//!     Arc::new(Fetcher),
//!     Arc::new(ExtractFn::new(|_topic: &str, _key: &Value, value: &Value| {
//!         value.get("ts").and_then(Value::as_i64).unwrap_or(0)
//!     })),
//!     GroupConfig::new(64),
//! )?;
//!
//! let partition = PartitionId::new("events", 0);
//! group.add_partition(
//!     partition.clone(),
//!     Arc::new(Printer),
//!     Arc::new(JsonDeserializer),
//!     Arc::new(JsonDeserializer),
//! )?;
//!
//! group.add_records(partition, vec![
//!     RawRecord { offset: 0, key: None, value: br#"{"ts":42}"#.to_vec() },
//! ]);
//!
//! let mut status = ProcessStatus::default();
//! group.process(&mut status)?;
//! # Ok(()) }
//! ```

pub mod chooser;
pub mod group;
pub mod punctuation;
pub mod queue;
pub mod tracker;

pub use chooser::Chooser;
pub use group::{ProcessStatus, StreamGroup};
pub use punctuation::PunctuationQueue;
pub use queue::RecordQueue;
pub use tracker::{EarliestTimestampTracker, MinTimestampTracker, TimestampTracker};

pub mod prelude {
    pub use super::{
        Chooser, EarliestTimestampTracker, MinTimestampTracker, ProcessStatus, PunctuationQueue,
        RecordQueue, StreamGroup, TimestampTracker,
    };
}
