//! Splits an upper transport PDU into lower transport segments and regenerates any subset of them
//! for retransmission.
use crate::lower::{
    BlockAck, SegN, SegO, SegmentHeader, SegmentedAccessPDU, SegmentedControlPDU, SeqZero, PDU,
};
use crate::upper::UpperPDU;

/// Returned when the upper PDU needs more than 32 segments.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub struct TooManySegments(pub usize);

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Segmenter {
    upper_pdu: UpperPDU,
    bytes: Vec<u8>,
    seq_zero: SeqZero,
    seg_n: SegN,
}
impl Segmenter {
    pub fn new(upper_pdu: UpperPDU, seq_zero: SeqZero) -> Result<Self, TooManySegments> {
        let bytes = upper_pdu.to_bytes();
        let seg_n =
            SegN::for_len(bytes.len(), upper_pdu.seg_len()).ok_or(TooManySegments(bytes.len()))?;
        Ok(Self {
            upper_pdu,
            bytes,
            seq_zero,
            seg_n,
        })
    }
    #[must_use]
    pub fn upper_pdu(&self) -> &UpperPDU {
        &self.upper_pdu
    }
    #[must_use]
    pub fn seq_zero(&self) -> SeqZero {
        self.seq_zero
    }
    #[must_use]
    pub fn seg_n(&self) -> SegN {
        self.seg_n
    }
    #[must_use]
    pub fn seg_count(&self) -> usize {
        self.seg_n.seg_count()
    }
    fn seg_data(&self, seg_o: SegO) -> &[u8] {
        let seg_len = self.upper_pdu.seg_len();
        let start = usize::from(seg_o.value()) * seg_len;
        let end = core::cmp::min(start + seg_len, self.bytes.len());
        &self.bytes[start..end]
    }
    /// Lower transport PDU for segment `seg_o`. Identical bytes every time it's called.
    /// # Panics
    /// Panics if `seg_o > self.seg_n()`.
    #[must_use]
    pub fn segment(&self, seg_o: SegO) -> PDU {
        let header = SegmentHeader::new(self.upper_pdu.szmic(), self.seq_zero, seg_o, self.seg_n);
        let data = self.seg_data(seg_o);
        match &self.upper_pdu {
            UpperPDU::Access(p) => {
                PDU::SegmentedAccess(SegmentedAccessPDU::new(p.akf(), p.aid(), header, data))
            }
            UpperPDU::Control(p) => {
                PDU::SegmentedControl(SegmentedControlPDU::new(p.opcode, header, data))
            }
        }
    }
    /// Iterates, ascending, over the segments not set in `block_ack`.
    #[must_use]
    pub fn iter(&self, block_ack: BlockAck) -> SegmentIterator<'_> {
        SegmentIterator {
            block_ack,
            segmenter: self,
            next: 0,
        }
    }
}
pub struct SegmentIterator<'a> {
    block_ack: BlockAck,
    segmenter: &'a Segmenter,
    next: u8,
}
impl<'a> Iterator for SegmentIterator<'a> {
    type Item = (SegO, PDU);

    fn next(&mut self) -> Option<Self::Item> {
        // Skip acked segments.
        while self.next <= self.segmenter.seg_n.value() && self.block_ack.get(self.next) {
            self.next += 1;
        }
        if self.next > self.segmenter.seg_n.value() {
            None
        } else {
            let seg_o = SegO::new(self.next);
            self.next += 1;
            Some((seg_o, self.segmenter.segment(seg_o)))
        }
    }
}
