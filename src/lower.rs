//! Lower Transport Layer. Frames upper transport PDUs into unsegmented or segmented
//! lower transport PDUs.
//!
//! | CTL | SEG | Format              | First octet       |
//! | --- | --- | ------------------- | ----------------- |
//! |  0  |  0  | Unsegmented Access  | `0 AKF AID(6)`    |
//! |  0  |  1  | Segmented Access    | `1 AKF AID(6)`    |
//! |  1  |  0  | Unsegmented Control | `0 Opcode(7)`     |
//! |  1  |  1  | Segmented Control   | `1 Opcode(7)`     |
//!
//! Segmented PDUs follow the first octet with a 3 byte big endian segment header
//! `SZMIC(1) SeqZero(13) SegO(5) SegN(5)`.
use crate::bytes::ToFromBytesEndian;
use crate::control::ControlOpcode;
use crate::crypto::{AID, AKF};
use crate::mesh::{SequenceNumber, CTL, U24};
use core::convert::TryFrom;
use core::fmt::{Display, Formatter};

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub enum LowerError {
    BadLength,
    BadOpcode,
    BadSegment,
}
impl Display for LowerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), core::fmt::Error> {
        match self {
            LowerError::BadLength => f.write_str("bad lower transport PDU length"),
            LowerError::BadOpcode => f.write_str("unknown control opcode"),
            LowerError::BadSegment => f.write_str("segment offset past last segment"),
        }
    }
}

#[derive(Copy, Clone, Hash, Debug, Ord, PartialOrd, Eq, PartialEq, Default)]
pub struct SZMIC(pub bool);
impl From<SZMIC> for bool {
    fn from(s: SZMIC) -> Self {
        s.0
    }
}
impl From<bool> for SZMIC {
    fn from(b: bool) -> Self {
        SZMIC(b)
    }
}
pub const SEQ_ZERO_MAX: u16 = (1_u16 << 13) - 1;
/// 13 bit SeqZero. The low 13 bits of the `SeqAuth` shared by every segment of a message.
#[derive(Copy, Clone, Hash, Debug, Ord, PartialOrd, Eq, PartialEq)]
pub struct SeqZero(u16);
impl SeqZero {
    /// # Panics
    /// Panics if `seq_zero > SEQ_ZERO_MAX`.
    #[must_use]
    pub fn new(seq_zero: u16) -> Self {
        assert!(seq_zero <= SEQ_ZERO_MAX, "seq_zero {} too big", seq_zero);
        SeqZero(seq_zero)
    }
    #[must_use]
    pub const fn new_masked(seq_zero: u16) -> Self {
        SeqZero(seq_zero & SEQ_ZERO_MAX)
    }
    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }
    #[must_use]
    pub fn from_seq(seq: SequenceNumber) -> Self {
        Self::new_masked(seq.value() as u16)
    }
    /// Recovers the full `SeqAuth` from the `SequenceNumber` of one of the segments. `SeqAuth` is
    /// the largest number `<= seq` whose low 13 bits are `self`. `None` if none exists.
    #[must_use]
    pub fn seq_auth(self, seq: SequenceNumber) -> Option<SequenceNumber> {
        let seq = seq.value();
        let candidate = (seq & !u32::from(SEQ_ZERO_MAX)) | u32::from(self.0);
        if candidate <= seq {
            Some(SequenceNumber::new(candidate))
        } else {
            candidate.checked_sub(1 << 13).map(SequenceNumber::new)
        }
    }
}
impl From<SeqZero> for u16 {
    fn from(s: SeqZero) -> Self {
        s.0
    }
}

/// Largest `SegO`/`SegN` (5 bits). A message has at most 32 segments.
pub const SEG_MAX: u8 = 0x1F;

/// 5 bit SegO (Segment Offset number)
#[derive(Copy, Clone, Hash, Debug, Ord, PartialOrd, Eq, PartialEq)]
pub struct SegO(u8);
impl SegO {
    /// # Panics
    /// Panics if `v > SEG_MAX`.
    #[must_use]
    pub fn new(v: u8) -> Self {
        assert!(v <= SEG_MAX);
        Self(v)
    }
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}
impl From<SegO> for u8 {
    fn from(s: SegO) -> Self {
        s.0
    }
}
/// 5 bit SegN (Last Segment number)
#[derive(Copy, Clone, Hash, Debug, Ord, PartialOrd, Eq, PartialEq)]
pub struct SegN(u8);
impl SegN {
    /// # Panics
    /// Panics if `v > SEG_MAX`.
    #[must_use]
    pub fn new(v: u8) -> Self {
        assert!(v <= SEG_MAX);
        Self(v)
    }
    /// `SegN` needed to carry `len` bytes in segments of `seg_len` bytes. `None` if it needs more
    /// than 32 segments (or `len == 0`).
    #[must_use]
    pub fn for_len(len: usize, seg_len: usize) -> Option<SegN> {
        if len == 0 || seg_len == 0 {
            return None;
        }
        let last = (len - 1) / seg_len;
        u8::try_from(last)
            .ok()
            .filter(|&l| l <= SEG_MAX)
            .map(SegN)
    }
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
    #[must_use]
    pub fn seg_count(self) -> usize {
        usize::from(self.0) + 1
    }
}
impl From<SegN> for u8 {
    fn from(s: SegN) -> Self {
        s.0
    }
}
/// One bit per segment. Bit `n` set means segment `SegO == n` was received.
#[derive(Copy, Clone, Hash, Debug, Ord, PartialOrd, Eq, PartialEq, Default)]
pub struct BlockAck(pub u32);
impl BlockAck {
    /// Sets the `bit` bit to 1. Does nothing if bit >= 32
    pub fn set(&mut self, bit: u8) {
        debug_assert!(bit < 32, "{} index overflow into u32", bit);
        if bit >= 32 {
            return;
        }
        (self.0) |= 1_u32 << u32::from(bit);
    }
    /// Returns the bit status (1 or 0) of the `bit` bit. Returns `False` for bit >= 32
    #[must_use]
    pub fn get(self, bit: u8) -> bool {
        if bit >= 32 {
            false
        } else {
            (self.0 & (1_u32 << u32::from(bit))) != 0
        }
    }
    /// Every segment `0..=seg_n` set.
    #[must_use]
    pub fn all_acked(self, seg_n: SegN) -> bool {
        let mask = Self::mask(seg_n);
        self.0 & mask == mask
    }
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
    /// Segments `0..=seg_n` whose bit isn't set, ascending.
    pub fn missing(self, seg_n: SegN) -> impl Iterator<Item = SegO> {
        (0..=seg_n.0).filter(move |&i| !self.get(i)).map(SegO)
    }
    #[must_use]
    pub fn count_ones(self) -> u32 {
        self.0.count_ones()
    }
    fn mask(seg_n: SegN) -> u32 {
        if seg_n.0 >= 31 {
            u32::max_value()
        } else {
            (1_u32 << (u32::from(seg_n.0) + 1)) - 1
        }
    }
    #[must_use]
    pub const fn max_len() -> usize {
        32
    }
}
#[derive(Copy, Clone, Hash, Debug, Ord, PartialOrd, Eq, PartialEq)]
pub struct SEG(bool);
impl SEG {
    #[must_use]
    pub fn new_upper_masked(v: u8) -> SEG {
        SEG(v & 0x80 != 0)
    }
}
impl From<SEG> for bool {
    fn from(s: SEG) -> Self {
        s.0
    }
}
impl From<bool> for SEG {
    fn from(b: bool) -> Self {
        SEG(b)
    }
}
/// On Behalf Of flag of a Segment Acknowledgment (set by friends acking for a low power node).
#[derive(Copy, Clone, Hash, Debug, Ord, PartialOrd, Eq, PartialEq, Default)]
pub struct OBO(pub bool);
/// 3 byte segmentation header. `flag` is `SZMIC` for access messages and RFU (0) for control.
#[derive(Copy, Clone, Hash, Debug, Ord, PartialOrd, Eq, PartialEq)]
pub struct SegmentHeader {
    flag: bool,
    seq_zero: SeqZero,
    seg_o: SegO,
    seg_n: SegN,
}
impl SegmentHeader {
    /// # Panics
    /// Panics if `seg_o > seg_n`.
    #[must_use]
    pub fn new(flag: bool, seq_zero: SeqZero, seg_o: SegO, seg_n: SegN) -> Self {
        assert!(seg_o.0 <= seg_n.0, "seg_o past seg_n");
        Self {
            flag,
            seq_zero,
            seg_o,
            seg_n,
        }
    }
    #[must_use]
    pub fn flag(&self) -> bool {
        self.flag
    }
    #[must_use]
    pub fn seq_zero(&self) -> SeqZero {
        self.seq_zero
    }
    #[must_use]
    pub fn seg_o(&self) -> SegO {
        self.seg_o
    }
    #[must_use]
    pub fn seg_n(&self) -> SegN {
        self.seg_n
    }
    #[must_use]
    pub fn pack_into_u24(self) -> U24 {
        U24::new(
            u32::from(self.flag) << 23
                | u32::from(self.seq_zero.0) << 10
                | u32::from(self.seg_o.0) << 5
                | u32::from(self.seg_n.0),
        )
    }
    pub fn unpack_from_u24(v: U24) -> Result<Self, LowerError> {
        let v = v.value();
        let seg_o = ((v >> 5) as u8) & SEG_MAX;
        let seg_n = (v as u8) & SEG_MAX;
        if seg_o > seg_n {
            return Err(LowerError::BadSegment);
        }
        Ok(Self {
            flag: v & 0x80_0000 != 0,
            seq_zero: SeqZero::new_masked((v >> 10) as u16),
            seg_o: SegO(seg_o),
            seg_n: SegN(seg_n),
        })
    }
    fn pack_into(self, buf: &mut [u8]) {
        buf[..3].copy_from_slice(&self.pack_into_u24().to_bytes_be());
    }
    fn unpack_from(buf: &[u8]) -> Result<Self, LowerError> {
        Self::unpack_from_u24(U24::from_bytes_be(&buf[..3]).ok_or(LowerError::BadLength)?)
    }
}
const UNSEGMENTED_ACCESS_PDU_LEN: usize = 15;
/// Smallest upper transport access PDU: 1 byte of payload and a 32-bit TransMIC.
const MIN_ACCESS_PDU_LEN: usize = 5;
#[derive(Ord, PartialOrd, Eq, PartialEq, Copy, Clone, Hash, Debug)]
pub struct UnsegmentedAccessPDU {
    akf: AKF,
    aid: AID,
    access_pdu_buf: [u8; UNSEGMENTED_ACCESS_PDU_LEN],
    access_pdu_len: u8,
}
impl UnsegmentedAccessPDU {
    /// # Panics
    /// Panics if `data.len() > UNSEGMENTED_ACCESS_PDU_LEN` (15)
    #[must_use]
    pub fn new(akf: AKF, aid: AID, data: &[u8]) -> UnsegmentedAccessPDU {
        assert!(data.len() <= UNSEGMENTED_ACCESS_PDU_LEN);
        let mut buf = [0_u8; UNSEGMENTED_ACCESS_PDU_LEN];
        buf[..data.len()].copy_from_slice(data);
        UnsegmentedAccessPDU {
            akf,
            aid,
            access_pdu_buf: buf,
            access_pdu_len: data.len() as u8,
        }
    }
    #[must_use]
    pub fn akf(&self) -> AKF {
        self.akf
    }
    #[must_use]
    pub fn aid(&self) -> AID {
        self.aid
    }
    /// Upper transport PDU (encrypted access payload and 32-bit TransMIC).
    #[must_use]
    pub fn upper_pdu(&self) -> &[u8] {
        &self.access_pdu_buf[..usize::from(self.access_pdu_len)]
    }
    #[must_use]
    pub const fn max_len() -> usize {
        UNSEGMENTED_ACCESS_PDU_LEN
    }
    #[must_use]
    pub fn to_bytes(&self) -> PDUBytes {
        let mut buf = [0_u8; PDU::max_len()];
        buf[0] = (u8::from(self.akf.0) << 6) | self.aid.value();
        let len = self.upper_pdu().len();
        buf[1..=len].copy_from_slice(self.upper_pdu());
        PDUBytes::from_parts(buf, len + 1)
    }
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LowerError> {
        if bytes.len() < 1 + MIN_ACCESS_PDU_LEN || bytes.len() > 1 + UNSEGMENTED_ACCESS_PDU_LEN {
            return Err(LowerError::BadLength);
        }
        if SEG::new_upper_masked(bytes[0]).0 {
            return Err(LowerError::BadSegment);
        }
        Ok(Self::new(
            AKF(bytes[0] & 0x40 != 0),
            AID::new_masked(bytes[0]),
            &bytes[1..],
        ))
    }
}
const SEGMENTED_ACCESS_SEG_LEN: usize = 12;
#[derive(Ord, PartialOrd, Eq, PartialEq, Copy, Clone, Hash, Debug)]
pub struct SegmentedAccessPDU {
    akf: AKF,
    aid: AID,
    segment_header: SegmentHeader,
    segment_buf: [u8; SEGMENTED_ACCESS_SEG_LEN],
    len: u8,
}

impl SegmentedAccessPDU {
    /// # Panics
    /// Panics if `data` is empty or longer than 12 bytes.
    #[must_use]
    pub fn new(akf: AKF, aid: AID, segment_header: SegmentHeader, data: &[u8]) -> Self {
        assert!(!data.is_empty() && data.len() <= Self::max_seg_len());
        let mut buf = [0_u8; SEGMENTED_ACCESS_SEG_LEN];
        buf[..data.len()].copy_from_slice(data);
        Self {
            akf,
            aid,
            segment_header,
            segment_buf: buf,
            len: data.len() as u8,
        }
    }
    #[must_use]
    pub fn akf(&self) -> AKF {
        self.akf
    }
    #[must_use]
    pub fn aid(&self) -> AID {
        self.aid
    }
    #[must_use]
    pub fn szmic(&self) -> SZMIC {
        SZMIC(self.segment_header.flag)
    }
    #[must_use]
    pub const fn header(&self) -> &SegmentHeader {
        &self.segment_header
    }
    #[must_use]
    pub fn segment_data(&self) -> &[u8] {
        &self.segment_buf[..usize::from(self.len)]
    }
    #[must_use]
    pub fn to_bytes(&self) -> PDUBytes {
        let mut buf = [0_u8; PDU::max_len()];
        buf[0] = 0x80 | (u8::from(self.akf.0) << 6) | self.aid.value();
        self.segment_header.pack_into(&mut buf[1..4]);
        let len = usize::from(self.len);
        buf[4..4 + len].copy_from_slice(self.segment_data());
        PDUBytes::from_parts(buf, len + 4)
    }
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LowerError> {
        if bytes.len() < 5 || bytes.len() > 4 + Self::max_seg_len() {
            return Err(LowerError::BadLength);
        }
        if !SEG::new_upper_masked(bytes[0]).0 {
            return Err(LowerError::BadSegment);
        }
        Ok(Self::new(
            AKF(bytes[0] & 0x40 != 0),
            AID::new_masked(bytes[0]),
            SegmentHeader::unpack_from(&bytes[1..4])?,
            &bytes[4..],
        ))
    }
    #[must_use]
    pub const fn max_seg_len() -> usize {
        SEGMENTED_ACCESS_SEG_LEN
    }
}

const UNSEGMENTED_CONTROL_PDU_LEN: usize = 11;
#[derive(Ord, PartialOrd, Eq, PartialEq, Copy, Clone, Hash, Debug)]
pub struct UnsegmentedControlPDU {
    parameters_buf: [u8; UNSEGMENTED_CONTROL_PDU_LEN],
    parameters_len: u8,
    opcode: ControlOpcode,
}
impl UnsegmentedControlPDU {
    /// # Panics
    /// Panics if `parameters.len() > UNSEGMENTED_CONTROL_PDU_LEN` (11)
    #[must_use]
    pub fn new(opcode: ControlOpcode, parameters: &[u8]) -> UnsegmentedControlPDU {
        assert!(
            parameters.len() <= UNSEGMENTED_CONTROL_PDU_LEN,
            "parameter overflow ({} > {})",
            parameters.len(),
            UNSEGMENTED_CONTROL_PDU_LEN
        );
        let mut buf = [0_u8; UNSEGMENTED_CONTROL_PDU_LEN];
        buf[..parameters.len()].copy_from_slice(parameters);
        UnsegmentedControlPDU {
            parameters_buf: buf,
            parameters_len: parameters.len() as u8,
            opcode,
        }
    }
    #[must_use]
    pub const fn parameters_len(&self) -> usize {
        self.parameters_len as usize
    }
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.parameters_buf[..self.parameters_len()]
    }
    #[must_use]
    pub const fn opcode(&self) -> ControlOpcode {
        self.opcode
    }
    #[must_use]
    pub const fn max_parameters_size() -> usize {
        UNSEGMENTED_CONTROL_PDU_LEN // 0-88 Bits
    }
    #[must_use]
    pub fn to_bytes(&self) -> PDUBytes {
        let mut buf = [0_u8; PDU::max_len()];
        buf[0] = u8::from(self.opcode);
        let len = self.parameters_len();
        buf[1..=len].copy_from_slice(self.data());
        PDUBytes::from_parts(buf, len + 1)
    }
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LowerError> {
        if bytes.is_empty() || bytes.len() > 1 + UNSEGMENTED_CONTROL_PDU_LEN {
            return Err(LowerError::BadLength);
        }
        if SEG::new_upper_masked(bytes[0]).0 {
            return Err(LowerError::BadSegment);
        }
        let opcode = ControlOpcode::new(bytes[0] & 0x7F).ok_or(LowerError::BadOpcode)?;
        Ok(Self::new(opcode, &bytes[1..]))
    }
}
/// Segmented Control PDU Lengths
/// | # Packets  | PDU Size |
/// |      1     |     8    |
/// |      2     |    16    |
/// |      3     |    24    |
/// |      n     |    n*8   |
/// |     32     |    256   |
const MAX_SEGMENTED_CONTROL_PDU_LEN: usize = 8;
#[derive(Ord, PartialOrd, Eq, PartialEq, Copy, Clone, Hash, Debug)]
pub struct SegmentedControlPDU {
    opcode: ControlOpcode,
    segment_header: SegmentHeader,
    segment_buf: [u8; MAX_SEGMENTED_CONTROL_PDU_LEN],
    segment_buf_len: u8,
}
impl SegmentedControlPDU {
    /// # Panics
    /// Panics if `data` is empty or `data.len() > MAX_SEGMENTED_CONTROL_PDU_LEN` (8)
    #[must_use]
    pub fn new(opcode: ControlOpcode, header: SegmentHeader, data: &[u8]) -> SegmentedControlPDU {
        assert!(
            !data.is_empty() && data.len() <= MAX_SEGMENTED_CONTROL_PDU_LEN,
            "segment overflow ({} > {})",
            data.len(),
            MAX_SEGMENTED_CONTROL_PDU_LEN
        );
        let mut buf = [0_u8; MAX_SEGMENTED_CONTROL_PDU_LEN];
        buf[..data.len()].copy_from_slice(data);
        SegmentedControlPDU {
            opcode,
            segment_header: header,
            segment_buf: buf,
            segment_buf_len: data.len() as u8,
        }
    }
    #[must_use]
    pub fn len(&self) -> usize {
        usize::from(self.segment_buf_len)
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    #[must_use]
    pub fn segment_data(&self) -> &[u8] {
        &self.segment_buf[..self.len()]
    }
    #[must_use]
    pub const fn opcode(&self) -> ControlOpcode {
        self.opcode
    }
    #[must_use]
    pub const fn header(&self) -> &SegmentHeader {
        &self.segment_header
    }
    #[must_use]
    pub const fn max_seg_len() -> usize {
        MAX_SEGMENTED_CONTROL_PDU_LEN
    }
    #[must_use]
    pub fn to_bytes(&self) -> PDUBytes {
        let mut buf = [0_u8; PDU::max_len()];
        buf[0] = 0x80 | u8::from(self.opcode);
        self.segment_header.pack_into(&mut buf[1..4]);
        let len = self.len();
        buf[4..4 + len].copy_from_slice(self.segment_data());
        PDUBytes::from_parts(buf, len + 4)
    }
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LowerError> {
        if bytes.len() < 5 || bytes.len() > 4 + MAX_SEGMENTED_CONTROL_PDU_LEN {
            return Err(LowerError::BadLength);
        }
        if !SEG::new_upper_masked(bytes[0]).0 {
            return Err(LowerError::BadSegment);
        }
        let opcode = ControlOpcode::new(bytes[0] & 0x7F).ok_or(LowerError::BadOpcode)?;
        Ok(Self::new(
            opcode,
            SegmentHeader::unpack_from(&bytes[1..4])?,
            &bytes[4..],
        ))
    }
}

#[derive(Ord, PartialOrd, Eq, PartialEq, Copy, Clone, Hash, Debug)]
pub enum PDU {
    UnsegmentedAccess(UnsegmentedAccessPDU),
    SegmentedAccess(SegmentedAccessPDU),
    UnsegmentedControl(UnsegmentedControlPDU),
    SegmentedControl(SegmentedControlPDU),
}
impl PDU {
    #[must_use]
    pub fn is_seg(&self) -> bool {
        match self {
            PDU::UnsegmentedAccess(_) | PDU::UnsegmentedControl(_) => false,
            PDU::SegmentedAccess(_) | PDU::SegmentedControl(_) => true,
        }
    }
    #[must_use]
    pub fn is_control(&self) -> bool {
        match self {
            PDU::UnsegmentedAccess(_) | PDU::SegmentedAccess(_) => false,
            PDU::UnsegmentedControl(_) | PDU::SegmentedControl(_) => true,
        }
    }
    #[must_use]
    pub fn segment_header(&self) -> Option<&SegmentHeader> {
        match self {
            PDU::SegmentedAccess(p) => Some(p.header()),
            PDU::SegmentedControl(p) => Some(p.header()),
            _ => None,
        }
    }
    /// Number of bytes required to hold any serialized `lower::PDU` in a byte buffer.
    #[must_use]
    pub const fn max_len() -> usize {
        16
    }
    #[must_use]
    pub fn to_bytes(&self) -> PDUBytes {
        match self {
            PDU::UnsegmentedAccess(p) => p.to_bytes(),
            PDU::SegmentedAccess(p) => p.to_bytes(),
            PDU::UnsegmentedControl(p) => p.to_bytes(),
            PDU::SegmentedControl(p) => p.to_bytes(),
        }
    }
    pub fn from_bytes(bytes: &[u8], ctl: CTL) -> Result<Self, LowerError> {
        let first = *bytes.first().ok_or(LowerError::BadLength)?;
        Ok(match (bool::from(ctl), SEG::new_upper_masked(first).0) {
            (true, true) => PDU::SegmentedControl(SegmentedControlPDU::from_bytes(bytes)?),
            (true, false) => PDU::UnsegmentedControl(UnsegmentedControlPDU::from_bytes(bytes)?),
            (false, false) => PDU::UnsegmentedAccess(UnsegmentedAccessPDU::from_bytes(bytes)?),
            (false, true) => PDU::SegmentedAccess(SegmentedAccessPDU::from_bytes(bytes)?),
        })
    }
}
/// Serialized lower transport PDU. Fits in one network PDU.
#[derive(Ord, PartialOrd, Eq, PartialEq, Copy, Clone, Hash, Debug)]
pub struct PDUBytes {
    buf: [u8; PDU::max_len()],
    buf_len: usize,
}
impl PDUBytes {
    fn from_parts(buf: [u8; PDU::max_len()], buf_len: usize) -> PDUBytes {
        PDUBytes { buf, buf_len }
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf_len
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf_len == 0
    }
    #[must_use]
    pub fn seg(&self) -> SEG {
        debug_assert!(!self.is_empty());
        SEG(self.buf[0] & 0x80 != 0)
    }
}
impl AsRef<[u8]> for PDUBytes {
    fn as_ref(&self) -> &[u8] {
        &self.buf[..self.buf_len]
    }
}
#[derive(Ord, PartialOrd, Eq, PartialEq, Copy, Clone, Hash, Debug)]
pub struct PDUBytesError;
impl TryFrom<&[u8]> for PDUBytes {
    type Error = PDUBytesError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let l = value.len();
        if l == 0 || l > PDU::max_len() {
            Err(PDUBytesError)
        } else {
            let mut buf = [0_u8; PDU::max_len()];
            buf[..l].copy_from_slice(value);
            Ok(Self { buf, buf_len: l })
        }
    }
}
