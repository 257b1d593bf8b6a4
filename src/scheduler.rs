//! Time ordered queue used for the transport timers (incomplete timer and ack timer).
use crate::timestamp::TimestampTrait;
use alloc::collections::BinaryHeap;
use core::cmp::{Ordering, Reverse};
use core::time::Duration;

#[derive(Debug)]
pub struct TimeQueueEntry<T, Timestamp: TimestampTrait> {
    timestamp: Timestamp,
    item: T,
}
impl<T, Timestamp: TimestampTrait> TimeQueueEntry<T, Timestamp> {
    #[must_use]
    pub fn new(timestamp: Timestamp, item: T) -> TimeQueueEntry<T, Timestamp> {
        TimeQueueEntry { timestamp, item }
    }
    #[must_use]
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
    #[must_use]
    pub fn into_item(self) -> T {
        self.item
    }
}
impl<T, Timestamp: TimestampTrait> PartialOrd for TimeQueueEntry<T, Timestamp> {
    #[must_use]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl<T, Timestamp: TimestampTrait> PartialEq for TimeQueueEntry<T, Timestamp> {
    #[must_use]
    fn eq(&self, other: &Self) -> bool {
        self.timestamp.eq(&other.timestamp)
    }
}
impl<T, Timestamp: TimestampTrait> Eq for TimeQueueEntry<T, Timestamp> {}
impl<T, Timestamp: TimestampTrait> Ord for TimeQueueEntry<T, Timestamp> {
    #[must_use]
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp.cmp(&other.timestamp)
    }
}
/// Min-heap of items keyed by deadline. The earliest deadline is always at the top.
///
/// Items can't be removed early. Owners cancel timers by making the item stale (for example with
/// a generation counter) and ignoring it once it pops.
#[derive(Debug)]
pub struct TimeQueue<T, Timestamp: TimestampTrait> {
    priority_queue: BinaryHeap<Reverse<TimeQueueEntry<T, Timestamp>>>,
}
impl<T, Timestamp: TimestampTrait> Default for TimeQueue<T, Timestamp> {
    fn default() -> Self {
        Self::new()
    }
}
impl<T, Timestamp: TimestampTrait> TimeQueue<T, Timestamp> {
    #[must_use]
    pub fn new() -> TimeQueue<T, Timestamp> {
        TimeQueue {
            priority_queue: BinaryHeap::default(),
        }
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.priority_queue.len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.priority_queue.is_empty()
    }
    #[must_use]
    pub fn peek(&self) -> Option<&TimeQueueEntry<T, Timestamp>> {
        self.priority_queue.peek().map(|r| &r.0)
    }
    #[must_use]
    pub fn peek_timestamp(&self) -> Option<Timestamp> {
        Some(self.peek()?.timestamp())
    }
    pub fn push(&mut self, timestamp: Timestamp, item: T) {
        self.priority_queue
            .push(Reverse(TimeQueueEntry::new(timestamp, item)))
    }
    pub fn pop_force(&mut self) -> Option<TimeQueueEntry<T, Timestamp>> {
        self.priority_queue.pop().map(|r| r.0)
    }
    /// Pops the earliest entry if its deadline is at or before `now`.
    pub fn pop_ready(&mut self, now: Timestamp) -> Option<TimeQueueEntry<T, Timestamp>> {
        if self.next_is_ready(now) {
            self.pop_force()
        } else {
            None
        }
    }
    pub fn pop_item_ready(&mut self, now: Timestamp) -> Option<T> {
        Some(self.pop_ready(now)?.item)
    }
    /// Time left until the earliest deadline (zero if it already passed).
    #[must_use]
    pub fn time_until_next(&self, now: Timestamp) -> Option<Duration> {
        Some(now.until(self.peek_timestamp()?).unwrap_or_default())
    }
    #[must_use]
    pub fn next_is_ready(&self, now: Timestamp) -> bool {
        self.peek_timestamp().map_or(false, |t| t <= now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_earliest_first() {
        let start = Instant::now();
        let mut queue = TimeQueue::new();
        queue.push(start + Duration::from_secs(3), 3_u8);
        queue.push(start + Duration::from_secs(1), 1_u8);
        queue.push(start + Duration::from_secs(2), 2_u8);
        assert_eq!(queue.peek_timestamp(), Some(start + Duration::from_secs(1)));
        assert_eq!(queue.pop_item_ready(start), None);
        assert_eq!(
            queue.time_until_next(start),
            Some(Duration::from_secs(1))
        );
        let later = start + Duration::from_secs(2);
        assert_eq!(queue.pop_item_ready(later), Some(1));
        assert_eq!(queue.pop_item_ready(later), Some(2));
        assert_eq!(queue.pop_item_ready(later), None);
        assert_eq!(queue.len(), 1);
    }
}
