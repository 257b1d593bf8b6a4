//! Transport Layer Reassembler.
use crate::control::{ControlOpcode, ControlPayload};
use crate::crypto::aes::MicSize;
use crate::crypto::{AID, AKF};
use crate::lower::{
    BlockAck, SegN, SegO, SegmentHeader, SegmentedAccessPDU, SegmentedControlPDU, SeqZero, PDU,
};
use crate::upper::{EncryptedAppPayload, UpperPDU};
use core::fmt::{Display, Formatter};

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub enum ReassembleError {
    SegmentAlreadyInserted,
    DataTooLong,
    SegmentOutOfBounds,
    /// Segment doesn't belong to this context (different kind, `AID`, opcode or `SegN`).
    Mismatch,
    NotSegmented,
    Incomplete,
}
impl Display for ReassembleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), core::fmt::Error> {
        let s = match self {
            ReassembleError::SegmentAlreadyInserted => "segment already inserted",
            ReassembleError::DataTooLong => "segment data too long",
            ReassembleError::SegmentOutOfBounds => "segment out of bounds",
            ReassembleError::Mismatch => "segment doesn't match context",
            ReassembleError::NotSegmented => "pdu isn't segmented",
            ReassembleError::Incomplete => "segments missing",
        };
        f.write_str(s)
    }
}
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub enum ContextKind {
    Access { akf: AKF, aid: AID, szmic: bool },
    Control(ControlOpcode),
}

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub struct ContextHeader {
    kind: ContextKind,
    seq_zero: SeqZero,
    seg_n: SegN,
    block_ack: BlockAck,
}
impl ContextHeader {
    #[must_use]
    pub fn new(kind: ContextKind, seq_zero: SeqZero, seg_n: SegN) -> Self {
        Self {
            kind,
            seq_zero,
            seg_n,
            block_ack: BlockAck::default(),
        }
    }
    #[must_use]
    pub fn all_acked(&self) -> bool {
        self.block_ack.all_acked(self.seg_n)
    }
    #[must_use]
    pub fn is_control(&self) -> bool {
        match self.kind {
            ContextKind::Control(_) => true,
            ContextKind::Access { .. } => false,
        }
    }
    #[must_use]
    pub fn kind(&self) -> ContextKind {
        self.kind
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
    #[must_use]
    pub const fn block_ack(&self) -> BlockAck {
        self.block_ack
    }
    #[must_use]
    pub fn max_seg_len(&self) -> usize {
        if self.is_control() {
            SegmentedControlPDU::max_seg_len()
        } else {
            SegmentedAccessPDU::max_seg_len()
        }
    }
    #[must_use]
    pub fn seg_pos(&self, seg_o: SegO) -> Option<usize> {
        if seg_o.value() > self.seg_n.value() {
            None
        } else {
            Some(usize::from(seg_o.value()) * self.max_seg_len())
        }
    }
    #[must_use]
    pub fn max_len(&self) -> usize {
        self.max_seg_len() * self.seg_count()
    }
    #[must_use]
    pub fn mic_size(&self) -> Option<MicSize> {
        match self.kind {
            ContextKind::Access { szmic: true, .. } => Some(MicSize::Big),
            ContextKind::Access { szmic: false, .. } => Some(MicSize::Small),
            ContextKind::Control(_) => None,
        }
    }
}
fn split_segment(pdu: &PDU) -> Result<(ContextKind, &SegmentHeader, &[u8]), ReassembleError> {
    match pdu {
        PDU::SegmentedAccess(p) => Ok((
            ContextKind::Access {
                akf: p.akf(),
                aid: p.aid(),
                szmic: p.szmic().into(),
            },
            p.header(),
            p.segment_data(),
        )),
        PDU::SegmentedControl(p) => Ok((
            ContextKind::Control(p.opcode()),
            p.header(),
            p.segment_data(),
        )),
        _ => Err(ReassembleError::NotSegmented),
    }
}
/// Partially received segmented message.
#[derive(Clone, Debug)]
pub struct Context {
    storage: Vec<u8>,
    data_len: Option<usize>,
    header: ContextHeader,
}
impl Context {
    #[must_use]
    pub fn new(header: ContextHeader) -> Self {
        Self {
            storage: vec![0_u8; header.max_len()],
            data_len: None,
            header,
        }
    }
    /// Starts a context from any segment of the message (segments may arrive out of order).
    pub fn from_segment(pdu: &PDU) -> Result<Self, ReassembleError> {
        let (kind, header, _) = split_segment(pdu)?;
        let mut context = Self::new(ContextHeader::new(kind, header.seq_zero(), header.seg_n()));
        context.insert(pdu)?;
        Ok(context)
    }
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.header.all_acked()
    }
    #[must_use]
    pub fn header(&self) -> &ContextHeader {
        &self.header
    }
    pub fn insert(&mut self, pdu: &PDU) -> Result<(), ReassembleError> {
        let (kind, seg_header, data) = split_segment(pdu)?;
        if kind != self.header.kind
            || seg_header.seq_zero() != self.header.seq_zero
            || seg_header.seg_n() != self.header.seg_n
        {
            return Err(ReassembleError::Mismatch);
        }
        self.insert_data(seg_header.seg_o(), data)
    }
    pub fn insert_data(&mut self, seg_o: SegO, data: &[u8]) -> Result<(), ReassembleError> {
        let seg_len = self.header.max_seg_len();
        let is_last = seg_o.value() == self.header.seg_n.value();
        if data.len() > seg_len || (!is_last && data.len() != seg_len) {
            return Err(ReassembleError::DataTooLong);
        }
        if self.header.block_ack.get(seg_o.value()) {
            return Err(ReassembleError::SegmentAlreadyInserted);
        }
        let pos = self
            .header
            .seg_pos(seg_o)
            .ok_or(ReassembleError::SegmentOutOfBounds)?;
        self.storage[pos..pos + data.len()].copy_from_slice(data);
        self.header.block_ack.set(seg_o.value());
        if is_last {
            self.data_len = Some(pos + data.len());
        }
        Ok(())
    }
    /// Reassembled upper transport PDU. Fails if any segment is missing.
    pub fn finish(self) -> Result<UpperPDU, ReassembleError> {
        if !self.is_ready() {
            return Err(ReassembleError::Incomplete);
        }
        let len = self.data_len.ok_or(ReassembleError::Incomplete)?;
        let mut storage = self.storage;
        storage.truncate(len);
        match self.header.kind {
            ContextKind::Access { akf, aid, szmic } => {
                let mic_size = if szmic { MicSize::Big } else { MicSize::Small };
                EncryptedAppPayload::from_bytes(&storage, mic_size, akf, aid)
                    .map(UpperPDU::Access)
                    .ok_or(ReassembleError::SegmentOutOfBounds)
            }
            ContextKind::Control(opcode) => Ok(UpperPDU::Control(ControlPayload {
                opcode,
                payload: storage,
            })),
        }
    }
}
