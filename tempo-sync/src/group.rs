//! Ingest/process orchestration for one task's input partitions.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, trace};

use tempo_core::{
    Deserializer, Error, GroupConfig, Ingestor, PartitionId, Punctuator, RawRecord, Receiver,
    Result, StampedRecord, Timestamp, TimestampExtractor, NO_TIMESTAMP,
};

use crate::chooser::Chooser;
use crate::punctuation::PunctuationQueue;
use crate::queue::RecordQueue;
use crate::tracker::MinTimestampTracker;

/// Advisory feedback from one `process` step to the caller's poll loop.
///
/// `poll_required` means there is reason to invoke the fetcher: every queue
/// was empty, or the queue just drained dipped below the desired depth.
/// Spurious `true` is allowed; a missed `true` is a bug.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessStatus {
    pub poll_required: bool,
}

struct StagedBatch {
    partition: PartitionId,
    records: Box<dyn Iterator<Item = RawRecord> + Send>,
}

struct Inner {
    stash: HashMap<PartitionId, RecordQueue>,
    new_records: VecDeque<StagedBatch>,
    consumed_offsets: HashMap<PartitionId, i64>,
    stream_time: Timestamp,
    chooser: Chooser,
    punctuations: PunctuationQueue,
}

/// Synchronizes consumption across one task's input partitions.
///
/// Batches staged by the fetcher thread are drained into per-partition
/// queues at the top of each `process` step; one record is popped from the
/// queue the chooser picks, stream time advances to the popped queue's
/// tracked timestamp, the record's receiver runs, and matured punctuations
/// fire. Per-partition backpressure pauses the fetcher when a queue reaches
/// the desired depth and unpauses it on the step that drains the queue back
/// down through that depth.
///
/// A single monitor guards all mutable state; the buffered-record count is
/// additionally published through an atomic so out-of-lock observers see a
/// recent value. The group never blocks beyond contention on its own
/// monitor and holds no threads of its own.
pub struct StreamGroup {
    name: String,
    ingestor: Arc<dyn Ingestor>,
    extractor: Arc<dyn TimestampExtractor>,
    desired_unprocessed: usize,
    inner: Mutex<Inner>,
    buffered: AtomicUsize,
}

impl StreamGroup {
    pub fn new(
        name: impl Into<String>,
        ingestor: Arc<dyn Ingestor>,
        extractor: Arc<dyn TimestampExtractor>,
        config: GroupConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            name: name.into(),
            ingestor,
            extractor,
            desired_unprocessed: config.desired_unprocessed_per_partition,
            inner: Mutex::new(Inner {
                stash: HashMap::new(),
                new_records: VecDeque::new(),
                consumed_offsets: HashMap::new(),
                stream_time: NO_TIMESTAMP,
                chooser: Chooser::from_kind(config.chooser),
                punctuations: PunctuationQueue::default(),
            }),
            buffered: AtomicUsize::new(0),
        })
    }

    /// Install a fresh queue for `partition`, bound to `receiver` and its
    /// deserializers. Registering a partition twice is an error and leaves
    /// the existing queue untouched.
    pub fn add_partition(
        &self,
        partition: PartitionId,
        receiver: Arc<dyn Receiver>,
        key_deserializer: Arc<dyn Deserializer>,
        value_deserializer: Arc<dyn Deserializer>,
    ) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.stash.contains_key(&partition) {
            return Err(Error::DuplicatePartition(partition));
        }
        let queue = RecordQueue::new(
            partition.clone(),
            receiver,
            key_deserializer,
            value_deserializer,
            Box::new(MinTimestampTracker::default()),
        );
        inner.stash.insert(partition, queue);
        Ok(())
    }

    /// Stage a batch of raw records for `partition`.
    ///
    /// No per-record work happens on this path: deserialization, timestamp
    /// extraction and enqueueing run at the top of the next `process` step,
    /// off the fetcher's call path. A batch for a partition this group does
    /// not own is dropped at drain time (it may have been revoked since the
    /// fetch).
    pub fn add_records<I>(&self, partition: PartitionId, records: I)
    where
        I: IntoIterator<Item = RawRecord>,
        I::IntoIter: Send + 'static,
    {
        let mut inner = self.inner.lock();
        inner.new_records.push_back(StagedBatch {
            partition,
            records: Box::new(records.into_iter()),
        });
    }

    /// Register `punctuator` to fire every `interval_ms` of stream time,
    /// starting at `start_time + interval_ms`.
    pub fn schedule_punctuation(
        &self,
        punctuator: Arc<dyn Punctuator>,
        interval_ms: i64,
        start_time: Timestamp,
    ) -> Result<()> {
        self.inner.lock().punctuations.schedule(punctuator, interval_ms, start_time)
    }

    /// Run one synchronization step: drain staged batches into their queues,
    /// pick a queue, deliver one record, fire matured punctuations.
    pub fn process(&self, status: &mut ProcessStatus) -> Result<()> {
        status.poll_required = false;

        let mut guard = self.inner.lock();
        self.ingest_new_records(&mut guard)?;

        let Inner { stash, chooser, consumed_offsets, stream_time, punctuations, .. } =
            &mut *guard;

        let Some(partition) = chooser.next() else {
            status.poll_required = true;
            return Ok(());
        };
        let Some(queue) = stash.get_mut(&partition) else {
            return Err(Error::EmptyChosenQueue(partition));
        };
        if queue.is_empty() {
            return Err(Error::EmptyChosenQueue(partition));
        }

        // The pause fired when the queue grew to the desired depth; popping
        // now takes it back below, so let the fetcher resume from the last
        // offset this queue has seen.
        if queue.size() == self.desired_unprocessed {
            debug!(
                group = %self.name,
                partition = %partition,
                from_offset = queue.offset(),
                "unpausing partition"
            );
            self.ingestor.unpause(&partition, queue.offset());
        }

        let tracked = queue.tracked_timestamp();
        let Some(record) = queue.next() else {
            return Err(Error::EmptyChosenQueue(partition));
        };

        if queue.size() < self.desired_unprocessed {
            status.poll_required = true;
        }

        // Stream time never decreases.
        if *stream_time < tracked {
            *stream_time = tracked;
        }

        trace!(
            group = %self.name,
            partition = %partition,
            offset = record.offset,
            record_time = record.timestamp,
            stream_time = *stream_time,
            "dispatching record"
        );
        queue.receiver().receive(record.key, record.value, record.timestamp, *stream_time)?;

        consumed_offsets.insert(partition.clone(), record.offset);

        if !queue.is_empty() {
            chooser.add(queue);
        }

        self.buffered.fetch_sub(1, Ordering::Relaxed);

        punctuations.may_punctuate(*stream_time)
    }

    fn ingest_new_records(&self, inner: &mut Inner) -> Result<()> {
        let Inner { stash, new_records, chooser, .. } = inner;
        while let Some(mut batch) = new_records.pop_front() {
            // The partition may have been revoked since the batch was staged.
            let Some(queue) = stash.get_mut(&batch.partition) else {
                debug!(
                    group = %self.name,
                    partition = %batch.partition,
                    "dropping batch for unknown partition"
                );
                continue;
            };
            let was_empty = queue.is_empty();
            while let Some(raw) = batch.records.next() {
                let topic = batch.partition.topic.as_str();
                let key = match &raw.key {
                    Some(bytes) => queue.key_deserializer().deserialize(topic, bytes)?,
                    None => Value::Null,
                };
                let value = queue.value_deserializer().deserialize(topic, &raw.value)?;
                let timestamp = self.extractor.extract(topic, &key, &value)?;
                queue.add(StampedRecord { key, value, timestamp, offset: raw.offset });
                self.buffered.fetch_add(1, Ordering::Relaxed);
            }
            if was_empty && !queue.is_empty() {
                chooser.add(queue);
            }
            if queue.size() >= self.desired_unprocessed {
                debug!(
                    group = %self.name,
                    partition = %batch.partition,
                    size = queue.size(),
                    "pausing partition"
                );
                self.ingestor.pause(&batch.partition);
            }
        }
        Ok(())
    }

    /// Total records buffered across all queues. Readable without taking the
    /// group lock; the value may trail an in-flight call by a step.
    pub fn buffered(&self) -> usize {
        self.buffered.load(Ordering::Relaxed)
    }

    /// Snapshot of the highest consumed offset per partition.
    pub fn consumed_offsets(&self) -> HashMap<PartitionId, i64> {
        self.inner.lock().consumed_offsets.clone()
    }

    /// The group's logical clock: the maximum tracked timestamp observed at
    /// record-pop time, `NO_TIMESTAMP` before the first pop.
    pub fn stream_time(&self) -> Timestamp {
        self.inner.lock().stream_time
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Release the chooser and drop every queue. Staged batches and the
    /// buffered count are cleared with them.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.chooser.close();
        inner.stash.clear();
        inner.new_records.clear();
        self.buffered.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;
    use serde_json::json;
    use std::collections::HashSet;
    use tempo_core::{ExtractFn, JsonDeserializer};

    #[derive(Default)]
    struct NoopIngestor {
        paused: PlMutex<HashSet<PartitionId>>,
    }

    impl Ingestor for NoopIngestor {
        fn pause(&self, partition: &PartitionId) {
            self.paused.lock().insert(partition.clone());
        }
        fn unpause(&self, partition: &PartitionId, _from_offset: i64) {
            self.paused.lock().remove(partition);
        }
    }

    #[derive(Default)]
    struct CountingReceiver {
        received: PlMutex<Vec<(Timestamp, Timestamp)>>,
    }

    impl Receiver for CountingReceiver {
        fn receive(
            &self,
            _key: Value,
            _value: Value,
            record_time: Timestamp,
            stream_time: Timestamp,
        ) -> Result<()> {
            self.received.lock().push((record_time, stream_time));
            Ok(())
        }
    }

    fn group(desired: usize) -> (Arc<NoopIngestor>, StreamGroup) {
        let ingestor = Arc::new(NoopIngestor::default());
        let extractor = Arc::new(ExtractFn::new(|_topic: &str, _key: &Value, value: &Value| {
            value.get("ts").and_then(Value::as_i64).unwrap_or(0)
        }));
        let g = StreamGroup::new("test-group", ingestor.clone(), extractor, GroupConfig::new(desired))
            .unwrap();
        (ingestor, g)
    }

    fn raw(offset: i64, ts: i64) -> RawRecord {
        RawRecord { offset, key: None, value: json!({ "ts": ts }).to_string().into_bytes() }
    }

    #[test]
    fn rejects_invalid_config() {
        let ingestor = Arc::new(NoopIngestor::default());
        let extractor =
            Arc::new(ExtractFn::new(|_: &str, _: &Value, _: &Value| 0));
        assert!(StreamGroup::new("g", ingestor, extractor, GroupConfig::new(0)).is_err());
    }

    #[test]
    fn duplicate_partition_is_an_error() {
        let (_, g) = group(3);
        let p = PartitionId::new("topic", 0);
        g.add_partition(
            p.clone(),
            Arc::new(CountingReceiver::default()),
            Arc::new(JsonDeserializer),
            Arc::new(JsonDeserializer),
        )
        .unwrap();
        let err = g
            .add_partition(
                p,
                Arc::new(CountingReceiver::default()),
                Arc::new(JsonDeserializer),
                Arc::new(JsonDeserializer),
            )
            .unwrap_err();
        assert!(matches!(err, Error::DuplicatePartition(_)));
    }

    #[test]
    fn batches_for_unknown_partitions_are_dropped() {
        let (_, g) = group(3);
        g.add_records(PartitionId::new("revoked", 9), vec![raw(0, 10)]);
        let mut status = ProcessStatus::default();
        g.process(&mut status).unwrap();
        assert!(status.poll_required);
        assert_eq!(g.buffered(), 0);
    }

    #[test]
    fn buffered_counts_ingested_minus_delivered() {
        let (_, g) = group(10);
        let p = PartitionId::new("topic", 0);
        let receiver = Arc::new(CountingReceiver::default());
        g.add_partition(p.clone(), receiver, Arc::new(JsonDeserializer), Arc::new(JsonDeserializer))
            .unwrap();
        g.add_records(p, vec![raw(0, 10), raw(1, 20), raw(2, 30)]);
        assert_eq!(g.buffered(), 0); // staged, not yet ingested

        let mut status = ProcessStatus::default();
        g.process(&mut status).unwrap();
        assert_eq!(g.buffered(), 2);
        g.process(&mut status).unwrap();
        g.process(&mut status).unwrap();
        assert_eq!(g.buffered(), 0);
    }

    #[test]
    fn empty_group_asks_for_a_poll() {
        let (_, g) = group(3);
        let mut status = ProcessStatus::default();
        g.process(&mut status).unwrap();
        assert!(status.poll_required);
    }

    #[test]
    fn close_clears_queues_and_counter() {
        let (_, g) = group(10);
        let p = PartitionId::new("topic", 0);
        g.add_partition(
            p.clone(),
            Arc::new(CountingReceiver::default()),
            Arc::new(JsonDeserializer),
            Arc::new(JsonDeserializer),
        )
        .unwrap();
        g.add_records(p, vec![raw(0, 10), raw(1, 20)]);
        let mut status = ProcessStatus::default();
        g.process(&mut status).unwrap();
        assert_eq!(g.buffered(), 1);
        g.close();
        assert_eq!(g.buffered(), 0);
        g.process(&mut status).unwrap();
        assert!(status.poll_required);
    }

    #[test]
    fn failing_receiver_propagates_and_does_not_record_offset() {
        struct FailingReceiver;
        impl Receiver for FailingReceiver {
            fn receive(&self, _: Value, _: Value, _: Timestamp, _: Timestamp) -> Result<()> {
                Err(anyhow::anyhow!("sink rejected record").into())
            }
        }

        let (_, g) = group(10);
        let p = PartitionId::new("topic", 0);
        g.add_partition(
            p.clone(),
            Arc::new(FailingReceiver),
            Arc::new(JsonDeserializer),
            Arc::new(JsonDeserializer),
        )
        .unwrap();
        g.add_records(p, vec![raw(0, 10)]);
        let mut status = ProcessStatus::default();
        assert!(g.process(&mut status).is_err());
        assert!(g.consumed_offsets().is_empty());
    }
}
