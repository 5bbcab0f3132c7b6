use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Logical record timestamp. Its physical meaning is opaque to the core:
/// typically milliseconds since epoch, but also validly derived from key or
/// value content by a [`TimestampExtractor`](crate::TimestampExtractor).
pub type Timestamp = i64;

/// Sentinel timestamp of an empty tracker and of a freshly created group's
/// stream time.
pub const NO_TIMESTAMP: Timestamp = i64::MIN;

/// One input partition of a logical topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionId {
    pub topic: String,
    pub partition: i32,
}

impl PartitionId {
    pub fn new(topic: impl Into<String>, partition: i32) -> Self {
        Self { topic: topic.into(), partition }
    }
}

impl std::fmt::Display for PartitionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.topic, self.partition)
    }
}

/// A record as handed over by the fetcher: undecoded bytes plus the offset
/// it occupies in its source partition. Keys are optional and decode to
/// `Value::Null` when absent.
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub value: Vec<u8>,
}

/// The buffered form of a record: decoded payloads stamped with the
/// extracted timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StampedRecord {
    pub key: Value,
    pub value: Value,
    pub timestamp: Timestamp,
    pub offset: i64,
}
