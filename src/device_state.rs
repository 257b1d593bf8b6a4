//! Local sequence number allocation.
use crate::mesh::{SequenceNumber, U24_MAX};
use core::sync::atomic::{AtomicU32, Ordering};

/// Range of sequence numbers handed out by one `SeqCounter::inc_seq` call.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct SeqRange(pub core::ops::Range<u32>);
impl SeqRange {
    #[must_use]
    pub fn start(&self) -> SequenceNumber {
        SequenceNumber::new(self.0.start)
    }
    #[must_use]
    pub fn len(&self) -> u32 {
        self.0.end - self.0.start
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    #[must_use]
    pub fn get(&self, offset: u32) -> Option<SequenceNumber> {
        if offset < self.len() {
            Some(SequenceNumber::new(self.0.start + offset))
        } else {
            None
        }
    }
}
impl Iterator for SeqRange {
    type Item = SequenceNumber;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(SequenceNumber::new)
    }
}
/// Atomic 24-bit sequence counter. Every network PDU the node sends takes one number.
#[derive(Debug, Default)]
pub struct SeqCounter(AtomicU32);
impl Clone for SeqCounter {
    fn clone(&self) -> Self {
        SeqCounter(AtomicU32::new(self.0.load(Ordering::SeqCst)))
    }
}
impl SeqCounter {
    #[must_use]
    pub fn new(next: SequenceNumber) -> Self {
        SeqCounter(AtomicU32::new(next.value()))
    }
    /// Next sequence number `inc_seq` would return. `None` once the space is used up.
    #[must_use]
    pub fn check(&self) -> Option<SequenceNumber> {
        let next = self.0.load(Ordering::SeqCst);
        if next > U24_MAX {
            None
        } else {
            Some(SequenceNumber::new(next))
        }
    }
    /// Allocates `amount` consecutive sequence numbers. Returns `None` (and allocates nothing)
    /// once the 24-bit space would overflow.
    pub fn inc_seq(&self, amount: u32) -> Option<SeqRange> {
        let mut current = self.0.load(Ordering::SeqCst);
        loop {
            let next = current.checked_add(amount)?;
            if next > U24_MAX + 1 {
                return None;
            }
            match self
                .0
                .compare_exchange(current, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return Some(SeqRange(current..next)),
                Err(actual) => current = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inc_seq() {
        let counter = SeqCounter::new(SequenceNumber::new(10));
        let range = counter.inc_seq(3).unwrap();
        assert_eq!(range.start(), SequenceNumber::new(10));
        assert_eq!(range.get(2), Some(SequenceNumber::new(12)));
        assert_eq!(range.get(3), None);
        assert_eq!(counter.check(), Some(SequenceNumber::new(13)));
    }
    #[test]
    fn test_exhaustion() {
        let counter = SeqCounter::new(SequenceNumber::new(U24_MAX - 1));
        assert!(counter.inc_seq(3).is_none());
        assert_eq!(counter.check(), Some(SequenceNumber::new(U24_MAX - 1)));
        let last: Vec<_> = counter.inc_seq(2).unwrap().collect();
        assert_eq!(
            last,
            vec![SequenceNumber::new(U24_MAX - 1), SequenceNumber::new(U24_MAX)]
        );
        assert!(counter.inc_seq(1).is_none());
        assert_eq!(counter.check(), None);
    }
}
