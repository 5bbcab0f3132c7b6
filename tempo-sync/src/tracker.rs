//! Timestamp tracking policies for buffered records.

use std::collections::VecDeque;

use tempo_core::{StampedRecord, Timestamp, NO_TIMESTAMP};

/// Tracks a representative timestamp over a FIFO-ordered buffer of records.
///
/// The host adds records in arrival order and removes them in that same
/// order; the tracker answers with its policy's timestamp for the currently
/// buffered set. Records are identified by their partition offset.
pub trait TimestampTracker: Send {
    fn add_stamped(&mut self, record: &StampedRecord);
    /// Called with the record just removed from the front of the host FIFO.
    fn remove_stamped(&mut self, record: &StampedRecord);
    /// The tracked timestamp, or `NO_TIMESTAMP` when nothing is buffered.
    fn get(&self) -> Timestamp;
}

/// Minimum timestamp of the buffered set, tolerant of out-of-order stamps.
///
/// Monotone-minimum deque: an add pops every pending entry with a strictly
/// greater stamp before pushing its own, so the front always holds the
/// minimum. The comparison is strict so an equal stamp never displaces an
/// earlier one. A removal only ever matches the front; a record whose entry
/// was displaced needs no work. All operations are amortized O(1).
#[derive(Debug, Default)]
pub struct MinTimestampTracker {
    entries: VecDeque<(Timestamp, i64)>,
}

impl TimestampTracker for MinTimestampTracker {
    fn add_stamped(&mut self, record: &StampedRecord) {
        while let Some(&(timestamp, _)) = self.entries.back() {
            if timestamp > record.timestamp {
                self.entries.pop_back();
            } else {
                break;
            }
        }
        self.entries.push_back((record.timestamp, record.offset));
    }

    fn remove_stamped(&mut self, record: &StampedRecord) {
        if let Some(&(_, offset)) = self.entries.front() {
            if offset == record.offset {
                self.entries.pop_front();
            }
        }
    }

    fn get(&self) -> Timestamp {
        self.entries.front().map_or(NO_TIMESTAMP, |&(timestamp, _)| timestamp)
    }
}

/// Stamp of the oldest buffered record.
///
/// For sources whose stamps are already monotone this equals the minimum
/// without any displacement work.
#[derive(Debug, Default)]
pub struct EarliestTimestampTracker {
    entries: VecDeque<(Timestamp, i64)>,
}

impl TimestampTracker for EarliestTimestampTracker {
    fn add_stamped(&mut self, record: &StampedRecord) {
        self.entries.push_back((record.timestamp, record.offset));
    }

    fn remove_stamped(&mut self, record: &StampedRecord) {
        if let Some(&(_, offset)) = self.entries.front() {
            if offset == record.offset {
                self.entries.pop_front();
            }
        }
    }

    fn get(&self) -> Timestamp {
        self.entries.front().map_or(NO_TIMESTAMP, |&(timestamp, _)| timestamp)
    }
}
