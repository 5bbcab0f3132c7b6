//! tempo-core: fundamental types and collaborator traits for the stream
//! synchronization core.
//!
//! Provides the abstractions the synchronizer is built from:
//! - `PartitionId`, `RawRecord`, `StampedRecord`, `Timestamp`
//! - Traits for the external collaborators: `Receiver`, `Ingestor`,
//!   `TimestampExtractor`, `Deserializer`, `Punctuator`
//! - `Error`/`Result` and the group configuration
//!
//! The synchronization machinery itself lives in `tempo-sync`.

pub mod config;
pub mod record;

use serde_json::Value;

pub use config::{ChooserKind, GroupConfig};
pub use record::{PartitionId, RawRecord, StampedRecord, Timestamp, NO_TIMESTAMP};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A partition was registered twice with the same group.
    #[error("duplicate partition {0}")]
    DuplicatePartition(PartitionId),
    /// Rejected at construction or scheduling time.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The chooser produced an empty queue: an internal invariant was
    /// violated. Not recoverable.
    #[error("chosen queue for partition {0} is empty")]
    EmptyChosenQueue(PartitionId),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// The downstream sink bound to one partition.
///
/// Called synchronously under the group lock, one record at a time, with the
/// record's own timestamp alongside the group's stream time. Implementations
/// must not call back into the owning group. An error propagates to the
/// `process` caller and the popped record is not re-enqueued.
pub trait Receiver: Send + Sync {
    fn receive(
        &self,
        key: Value,
        value: Value,
        record_time: Timestamp,
        stream_time: Timestamp,
    ) -> Result<()>;
}

/// The external fetcher. Both calls are idempotent: a pause may be requested
/// for an already-paused partition and vice versa.
pub trait Ingestor: Send + Sync {
    /// Stop delivering records for `partition`.
    fn pause(&self, partition: &PartitionId);
    /// Resume delivery for `partition` starting at `from_offset`.
    fn unpause(&self, partition: &PartitionId, from_offset: i64);
}

/// Derives a record's logical timestamp from its topic, key and value.
///
/// Runs under the group lock during staged-batch drain; implementations must
/// be side-effect-free and fast.
pub trait TimestampExtractor: Send + Sync {
    fn extract(&self, topic: &str, key: &Value, value: &Value) -> Result<Timestamp>;
}

/// Adapter turning an infallible closure into a [`TimestampExtractor`].
pub struct ExtractFn<F>(pub F);

impl<F> ExtractFn<F> {
    pub fn new(f: F) -> Self { Self(f) }
}

impl<F> TimestampExtractor for ExtractFn<F>
where
    F: Fn(&str, &Value, &Value) -> Timestamp + Send + Sync,
{
    fn extract(&self, topic: &str, key: &Value, value: &Value) -> Result<Timestamp> {
        Ok((self.0)(topic, key, value))
    }
}

/// Decodes raw fetched bytes into a payload value. Registered per receiver,
/// separately for keys and values; runs under the group lock during drain.
pub trait Deserializer: Send + Sync {
    fn deserialize(&self, topic: &str, bytes: &[u8]) -> Result<Value>;
}

/// [`Deserializer`] for JSON payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDeserializer;

impl Deserializer for JsonDeserializer {
    fn deserialize(&self, _topic: &str, bytes: &[u8]) -> Result<Value> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// A stream-time punctuation callback. Invoked synchronously inside
/// `process` when stream time reaches a scheduled target; never driven by
/// wall-clock time.
pub trait Punctuator: Send + Sync {
    fn punctuate(&self, stream_time: Timestamp) -> Result<()>;
}

pub mod prelude {
    pub use super::record::{PartitionId, RawRecord, StampedRecord, Timestamp, NO_TIMESTAMP};
    pub use super::{
        ChooserKind, Deserializer, Error, ExtractFn, GroupConfig, Ingestor, JsonDeserializer,
        Punctuator, Receiver, Result, TimestampExtractor,
    };
}
