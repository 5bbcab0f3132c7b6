//! Stream-time punctuation scheduling.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Arc;

use tempo_core::{Error, Punctuator, Result, Timestamp};

/// Ordered collection of stream-time-indexed callback schedules.
///
/// Stream time only moves at record-pop boundaries, so one `process` step
/// can carry the clock past several firing targets at once. Firings are not
/// coalesced: every matured target fires, in ascending target order, each
/// receiving the same observed stream time.
#[derive(Default)]
pub struct PunctuationQueue {
    schedules: BinaryHeap<Reverse<Schedule>>,
    seq: u64,
}

struct Schedule {
    fire_at: Timestamp,
    interval_ms: i64,
    seq: u64,
    punctuator: Arc<dyn Punctuator>,
}

impl PartialEq for Schedule {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at == other.fire_at && self.seq == other.seq
    }
}

impl Eq for Schedule {}

impl PartialOrd for Schedule {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Schedule {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.fire_at, self.seq).cmp(&(other.fire_at, other.seq))
    }
}

impl PunctuationQueue {
    /// Register `punctuator` to fire every `interval_ms` of stream time,
    /// first at `start_time + interval_ms`.
    pub fn schedule(
        &mut self,
        punctuator: Arc<dyn Punctuator>,
        interval_ms: i64,
        start_time: Timestamp,
    ) -> Result<()> {
        if interval_ms <= 0 {
            return Err(Error::InvalidConfig("punctuation interval must be positive".into()));
        }
        self.schedules.push(Reverse(Schedule {
            fire_at: start_time + interval_ms,
            interval_ms,
            seq: self.seq,
            punctuator,
        }));
        self.seq += 1;
        Ok(())
    }

    /// Fire every schedule whose target has matured at `stream_time`.
    ///
    /// Each schedule is re-armed before its callback runs, so a failing
    /// callback keeps its schedule; the error still propagates.
    pub fn may_punctuate(&mut self, stream_time: Timestamp) -> Result<()> {
        while let Some(Reverse(head)) = self.schedules.peek() {
            if head.fire_at > stream_time {
                break;
            }
            let Some(Reverse(mut schedule)) = self.schedules.pop() else {
                break;
            };
            schedule.fire_at += schedule.interval_ms;
            let punctuator = Arc::clone(&schedule.punctuator);
            self.schedules.push(Reverse(schedule));
            punctuator.punctuate(stream_time)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.schedules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schedules.is_empty()
    }
}
