//! Per-partition FIFO of stamped records.

use std::collections::VecDeque;
use std::sync::Arc;

use tempo_core::{Deserializer, PartitionId, Receiver, StampedRecord, Timestamp};

use crate::tracker::TimestampTracker;

/// FIFO of stamped records for one partition, with a timestamp tracker
/// running in parallel to the buffer.
///
/// The queue holds non-owning handles to its receiver and deserializers,
/// whose lifetime is the enclosing task's. While non-empty, the tracked
/// timestamp is the tracker policy's answer for the residual records.
pub struct RecordQueue {
    partition: PartitionId,
    records: VecDeque<StampedRecord>,
    tracker: Box<dyn TimestampTracker>,
    receiver: Arc<dyn Receiver>,
    key_deserializer: Arc<dyn Deserializer>,
    value_deserializer: Arc<dyn Deserializer>,
    offset: i64,
}

impl RecordQueue {
    pub fn new(
        partition: PartitionId,
        receiver: Arc<dyn Receiver>,
        key_deserializer: Arc<dyn Deserializer>,
        value_deserializer: Arc<dyn Deserializer>,
        tracker: Box<dyn TimestampTracker>,
    ) -> Self {
        Self {
            partition,
            records: VecDeque::new(),
            tracker,
            receiver,
            key_deserializer,
            value_deserializer,
            offset: -1,
        }
    }

    /// Append a record and track its stamp. The queue's offset becomes the
    /// record's offset.
    pub fn add(&mut self, record: StampedRecord) {
        self.tracker.add_stamped(&record);
        self.offset = record.offset;
        self.records.push_back(record);
    }

    /// Pop the front record, if any, and drop it from the tracker.
    pub fn next(&mut self) -> Option<StampedRecord> {
        let record = self.records.pop_front()?;
        self.tracker.remove_stamped(&record);
        Some(record)
    }

    /// The tracker's timestamp for the currently buffered records.
    pub fn tracked_timestamp(&self) -> Timestamp {
        self.tracker.get()
    }

    pub fn partition(&self) -> &PartitionId {
        &self.partition
    }

    /// Offset of the most recently enqueued record.
    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub fn size(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn receiver(&self) -> &Arc<dyn Receiver> {
        &self.receiver
    }

    pub fn key_deserializer(&self) -> &Arc<dyn Deserializer> {
        &self.key_deserializer
    }

    pub fn value_deserializer(&self) -> &Arc<dyn Deserializer> {
        &self.value_deserializer
    }
}
