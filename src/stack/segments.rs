//! Inbound segmented messages being reassembled, keyed by `(src, SeqZero)`.
use crate::address::{Address, UnicastAddress};
use crate::lower::{BlockAck, SeqZero, PDU};
use crate::mesh::{IVIndex, NetKeyIndex, SequenceNumber, TTL};
use crate::reassembler::{Context, ReassembleError};
use alloc::collections::BTreeMap;

/// Key of one reassembly plus the generation its incomplete timer was armed with.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub struct ReassemblyKey {
    pub src: UnicastAddress,
    pub seq_zero: SeqZero,
    pub generation: u32,
}
#[derive(Clone, Debug)]
pub struct IncomingSegments {
    pub context: Context,
    pub src: UnicastAddress,
    pub dst: Address,
    pub seq_auth: SequenceNumber,
    pub ttl: TTL,
    pub iv_index: IVIndex,
    pub net_key_index: NetKeyIndex,
    generation: u32,
}
/// Network fields of the segment that started a reassembly.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct SegmentInfo {
    pub src: UnicastAddress,
    pub dst: Address,
    pub seq: SequenceNumber,
    pub ttl: TTL,
    pub iv_index: IVIndex,
    pub net_key_index: NetKeyIndex,
}
#[derive(Debug)]
pub enum SegmentOutcome {
    /// First segment of a new message. The incomplete timer has to be armed with the key.
    Started(ReassemblyKey),
    /// New segment of a message being reassembled. Keys from earlier segments went stale, the
    /// incomplete timer has to be re-armed with this one.
    Pending(ReassemblyKey),
    /// Every segment arrived. The entry was removed from the table.
    Complete(IncomingSegments),
    /// Segment already received.
    Duplicate,
    /// Segment of a message that already completed. The sender missed our ack, so it gets the
    /// full block ack again.
    AlreadyComplete(BlockAck),
}
#[derive(Debug, Default)]
pub struct ReassemblyTable {
    contexts: BTreeMap<(UnicastAddress, SeqZero), IncomingSegments>,
    /// Last completed `SeqAuth` per source.
    completed: BTreeMap<UnicastAddress, (IVIndex, SequenceNumber)>,
    next_generation: u32,
}
impl ReassemblyTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.contexts.len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
    #[must_use]
    pub fn contains(&self, src: UnicastAddress, seq_zero: SeqZero) -> bool {
        self.contexts.contains_key(&(src, seq_zero))
    }
    /// Adds one segment. Segments can arrive in any order.
    pub fn insert(
        &mut self,
        info: SegmentInfo,
        pdu: &PDU,
    ) -> Result<SegmentOutcome, ReassembleError> {
        let header = pdu.segment_header().ok_or(ReassembleError::NotSegmented)?;
        let seq_zero = header.seq_zero();
        let seq_auth = seq_zero
            .seq_auth(info.seq)
            .ok_or(ReassembleError::SegmentOutOfBounds)?;
        if let Some((iv_index, done)) = self.completed.get(&info.src) {
            if iv_index.0 == info.iv_index.0 && seq_auth.value() <= done.value() {
                let mut block_ack = BlockAck::default();
                for seg_o in 0..=header.seg_n().value() {
                    block_ack.set(seg_o);
                }
                return Ok(SegmentOutcome::AlreadyComplete(block_ack));
            }
        }
        let key = (info.src, seq_zero);
        self.next_generation = self.next_generation.wrapping_add(1);
        let generation = self.next_generation;
        let started = match self.contexts.get_mut(&key) {
            Some(segments) => {
                match segments.context.insert(pdu) {
                    Ok(()) => (),
                    Err(ReassembleError::SegmentAlreadyInserted) => {
                        return Ok(SegmentOutcome::Duplicate)
                    }
                    Err(e) => return Err(e),
                }
                // Progress restarts the incomplete timer.
                segments.generation = generation;
                false
            }
            None => {
                let context = Context::from_segment(pdu)?;
                self.contexts.insert(
                    key,
                    IncomingSegments {
                        context,
                        src: info.src,
                        dst: info.dst,
                        seq_auth,
                        ttl: info.ttl,
                        iv_index: info.iv_index,
                        net_key_index: info.net_key_index,
                        generation,
                    },
                );
                true
            }
        };
        let ready = self
            .contexts
            .get(&key)
            .map_or(false, |segments| segments.context.is_ready());
        if ready {
            if let Some(segments) = self.contexts.remove(&key) {
                self.completed
                    .insert(segments.src, (segments.iv_index, segments.seq_auth));
                return Ok(SegmentOutcome::Complete(segments));
            }
        }
        let timer_key = ReassemblyKey {
            src: info.src,
            seq_zero,
            generation,
        };
        if started {
            Ok(SegmentOutcome::Started(timer_key))
        } else {
            Ok(SegmentOutcome::Pending(timer_key))
        }
    }
    /// Drops the reassembly `key` was armed for. `None` if it already completed or was replaced.
    pub fn expire(&mut self, key: ReassemblyKey) -> Option<IncomingSegments> {
        let map_key = (key.src, key.seq_zero);
        if self.contexts.get(&map_key)?.generation != key.generation {
            return None;
        }
        self.contexts.remove(&map_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{AID, AKF, MIC};
    use crate::segmenter::Segmenter;
    use crate::upper::{EncryptedAppPayload, UpperPDU};

    fn info(seq: u32) -> SegmentInfo {
        SegmentInfo {
            src: UnicastAddress::new(0x0005),
            dst: Address::from(0x0001_u16),
            seq: SequenceNumber::new(seq),
            ttl: TTL::new(3),
            iv_index: IVIndex(0),
            net_key_index: NetKeyIndex::new(0),
        }
    }
    fn segmenter() -> Segmenter {
        let payload = EncryptedAppPayload::new(vec![0xAA; 30], MIC::Small(1), AKF(true), AID::new(1));
        Segmenter::new(UpperPDU::Access(payload), SeqZero::new(0x20)).unwrap()
    }

    #[test]
    fn test_out_of_order_with_duplicate() {
        let segmenter = segmenter();
        let segments: Vec<_> = segmenter.iter(BlockAck::default()).map(|(_, p)| p).collect();
        assert_eq!(segments.len(), 3);
        let mut table = ReassemblyTable::new();
        match table.insert(info(0x22), &segments[2]).unwrap() {
            SegmentOutcome::Started(key) => assert_eq!(key.seq_zero, SeqZero::new(0x20)),
            other => panic!("unexpected {:?}", other),
        }
        match table.insert(info(0x23), &segments[2]).unwrap() {
            SegmentOutcome::Duplicate => (),
            other => panic!("unexpected {:?}", other),
        }
        match table.insert(info(0x24), &segments[0]).unwrap() {
            SegmentOutcome::Pending(key) => assert_eq!(key.seq_zero, SeqZero::new(0x20)),
            other => panic!("unexpected {:?}", other),
        }
        match table.insert(info(0x25), &segments[1]).unwrap() {
            SegmentOutcome::Complete(done) => {
                assert_eq!(done.seq_auth, SequenceNumber::new(0x20));
                assert_eq!(done.context.finish().unwrap(), *segmenter.upper_pdu());
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(table.is_empty());
        match table.insert(info(0x26), &segments[1]).unwrap() {
            SegmentOutcome::AlreadyComplete(block_ack) => assert_eq!(block_ack, BlockAck(0b111)),
            other => panic!("unexpected {:?}", other),
        }
        assert!(table.is_empty());
    }
    #[test]
    fn test_expire() {
        let segmenter = segmenter();
        let first = segmenter.segment(crate::lower::SegO::new(0));
        let mut table = ReassemblyTable::new();
        let key = match table.insert(info(0x20), &first).unwrap() {
            SegmentOutcome::Started(key) => key,
            other => panic!("unexpected {:?}", other),
        };
        let stale = ReassemblyKey {
            generation: key.generation.wrapping_add(1),
            ..key
        };
        assert!(table.expire(stale).is_none());
        assert!(table.expire(key).is_some());
        assert!(table.expire(key).is_none());
        // Same SeqZero starts over once expired.
        match table.insert(info(0x20), &first).unwrap() {
            SegmentOutcome::Started(_) => (),
            other => panic!("unexpected {:?}", other),
        }
    }
    #[test]
    fn test_progress_restarts_timer() {
        let segmenter = segmenter();
        let mut table = ReassemblyTable::new();
        let first = match table
            .insert(info(0x20), &segmenter.segment(crate::lower::SegO::new(0)))
            .unwrap()
        {
            SegmentOutcome::Started(key) => key,
            other => panic!("unexpected {:?}", other),
        };
        let second = match table
            .insert(info(0x21), &segmenter.segment(crate::lower::SegO::new(1)))
            .unwrap()
        {
            SegmentOutcome::Pending(key) => key,
            other => panic!("unexpected {:?}", other),
        };
        assert_ne!(first.generation, second.generation);
        // The timer armed by the first segment no longer drops the message.
        assert!(table.expire(first).is_none());
        assert!(table.contains(second.src, second.seq_zero));
        // A duplicate isn't progress.
        match table
            .insert(info(0x22), &segmenter.segment(crate::lower::SegO::new(1)))
            .unwrap()
        {
            SegmentOutcome::Duplicate => (),
            other => panic!("unexpected {:?}", other),
        }
        assert!(table.expire(second).is_some());
        assert!(table.is_empty());
    }
}
