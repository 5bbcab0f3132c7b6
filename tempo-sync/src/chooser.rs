//! Queue selection policies.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, VecDeque};

use tempo_core::{ChooserKind, PartitionId, Timestamp};

use crate::queue::RecordQueue;

/// Picks which non-empty queue to drain next.
///
/// The chooser holds partition ids rather than the queues themselves; the
/// group resolves the returned id against its stash. Callers add a queue at
/// most once while resident, always non-empty, and a resident queue stays
/// non-empty until chosen.
pub struct Chooser {
    inner: Inner,
}

enum Inner {
    Fifo(VecDeque<PartitionId>),
    TimeBased { heap: BinaryHeap<Reverse<TimeEntry>>, seq: u64 },
}

struct TimeEntry {
    tracked: Timestamp,
    seq: u64,
    partition: PartitionId,
}

impl PartialEq for TimeEntry {
    fn eq(&self, other: &Self) -> bool {
        self.tracked == other.tracked && self.seq == other.seq
    }
}

impl Eq for TimeEntry {}

impl PartialOrd for TimeEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimeEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.tracked, self.seq).cmp(&(other.tracked, other.seq))
    }
}

impl Chooser {
    /// Arrival-order policy.
    pub fn fifo() -> Self {
        Self { inner: Inner::Fifo(VecDeque::new()) }
    }

    /// Smallest-tracked-timestamp policy, arrival order breaking ties. The
    /// priority is the queue's tracked timestamp captured at insertion.
    pub fn time_based() -> Self {
        Self { inner: Inner::TimeBased { heap: BinaryHeap::new(), seq: 0 } }
    }

    pub fn from_kind(kind: ChooserKind) -> Self {
        match kind {
            ChooserKind::Fifo => Self::fifo(),
            ChooserKind::TimeBased => Self::time_based(),
        }
    }

    /// Register a newly non-empty queue as a candidate.
    pub fn add(&mut self, queue: &RecordQueue) {
        match &mut self.inner {
            Inner::Fifo(order) => order.push_back(queue.partition().clone()),
            Inner::TimeBased { heap, seq } => {
                heap.push(Reverse(TimeEntry {
                    tracked: queue.tracked_timestamp(),
                    seq: *seq,
                    partition: queue.partition().clone(),
                }));
                *seq += 1;
            }
        }
    }

    /// Remove and return the next partition to drain, if any.
    pub fn next(&mut self) -> Option<PartitionId> {
        match &mut self.inner {
            Inner::Fifo(order) => order.pop_front(),
            Inner::TimeBased { heap, .. } => heap.pop().map(|Reverse(entry)| entry.partition),
        }
    }

    /// Drop every candidate.
    pub fn close(&mut self) {
        match &mut self.inner {
            Inner::Fifo(order) => order.clear(),
            Inner::TimeBased { heap, .. } => heap.clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::MinTimestampTracker;
    use serde_json::Value;
    use std::sync::Arc;
    use tempo_core::{JsonDeserializer, Receiver, Result, StampedRecord};

    struct NullReceiver;

    impl Receiver for NullReceiver {
        fn receive(&self, _: Value, _: Value, _: Timestamp, _: Timestamp) -> Result<()> {
            Ok(())
        }
    }

    fn queue_with(partition: i32, timestamp: Timestamp) -> RecordQueue {
        let mut q = RecordQueue::new(
            PartitionId::new("topic", partition),
            Arc::new(NullReceiver),
            Arc::new(JsonDeserializer),
            Arc::new(JsonDeserializer),
            Box::new(MinTimestampTracker::default()),
        );
        q.add(StampedRecord { key: Value::Null, value: Value::Null, timestamp, offset: 0 });
        q
    }

    #[test]
    fn fifo_returns_queues_in_arrival_order() {
        let mut chooser = Chooser::fifo();
        chooser.add(&queue_with(0, 30));
        chooser.add(&queue_with(1, 10));
        chooser.add(&queue_with(2, 20));
        assert_eq!(chooser.next().unwrap().partition, 0);
        assert_eq!(chooser.next().unwrap().partition, 1);
        assert_eq!(chooser.next().unwrap().partition, 2);
        assert!(chooser.next().is_none());
    }

    #[test]
    fn time_based_returns_smallest_tracked_timestamp_first() {
        let mut chooser = Chooser::time_based();
        chooser.add(&queue_with(0, 30));
        chooser.add(&queue_with(1, 10));
        chooser.add(&queue_with(2, 20));
        assert_eq!(chooser.next().unwrap().partition, 1);
        assert_eq!(chooser.next().unwrap().partition, 2);
        assert_eq!(chooser.next().unwrap().partition, 0);
    }

    #[test]
    fn time_based_breaks_ties_by_arrival() {
        let mut chooser = Chooser::time_based();
        chooser.add(&queue_with(5, 10));
        chooser.add(&queue_with(3, 10));
        chooser.add(&queue_with(4, 10));
        assert_eq!(chooser.next().unwrap().partition, 5);
        assert_eq!(chooser.next().unwrap().partition, 3);
        assert_eq!(chooser.next().unwrap().partition, 4);
    }

    #[test]
    fn close_drops_all_candidates() {
        let mut chooser = Chooser::time_based();
        chooser.add(&queue_with(0, 10));
        chooser.close();
        assert!(chooser.next().is_none());
    }
}
