//! Primitive Mesh types shared by every layer (flags, TTL, NID, sequence numbers, IV index, key
//! indexes).
use crate::bytes::ToFromBytesEndian;
use core::convert::TryFrom;
use core::fmt::{Display, Error, Formatter};

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct IVI(pub bool);
impl From<IVI> for bool {
    #[must_use]
    fn from(i: IVI) -> Self {
        i.0
    }
}
impl From<bool> for IVI {
    #[must_use]
    fn from(b: bool) -> Self {
        IVI(b)
    }
}
/// Network control flag. `CTL(true)` marks a transport control message (64-bit NetMIC).
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct CTL(pub bool);
impl From<CTL> for bool {
    #[must_use]
    fn from(c: CTL) -> Self {
        c.0
    }
}
impl From<bool> for CTL {
    #[must_use]
    fn from(b: bool) -> Self {
        CTL(b)
    }
}
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct IVUpdateFlag(pub bool);
impl From<IVUpdateFlag> for bool {
    #[must_use]
    fn from(c: IVUpdateFlag) -> Self {
        c.0
    }
}
impl From<bool> for IVUpdateFlag {
    #[must_use]
    fn from(b: bool) -> Self {
        IVUpdateFlag(b)
    }
}
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct TTL(u8);

const TTL_MASK: u8 = 127;

/// Returned when a TTL is out of range (`>127`) or is the prohibited value `1`.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct InvalidTTL(pub u8);

impl TTL {
    /// # Panics
    /// Panics if `v > 127`.
    #[must_use]
    pub fn new(v: u8) -> TTL {
        assert!(
            v <= TTL_MASK,
            "TTL {} is bigger than max TTL {}",
            v,
            TTL_MASK
        );
        TTL(v)
    }
    /// Returns u8 with 7 lower bits being TTL and the 1 highest bit being a flag
    #[must_use]
    pub const fn with_flag(self, flag: bool) -> u8 {
        self.0 | ((flag as u8) << 7)
    }
    /// returns 7 bit TTL + 1 bit bool flag from 8bit uint.
    #[must_use]
    pub const fn new_with_flag(v: u8) -> (TTL, bool) {
        (TTL(v & TTL_MASK), v & !TTL_MASK != 0)
    }
    #[must_use]
    pub fn should_relay(self) -> bool {
        match self.0 {
            2..=127 => true,
            _ => false,
        }
    }
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
    /// TTL values a local sender may use: 0 or 2..=127.
    pub fn for_sending(v: u8) -> Result<TTL, InvalidTTL> {
        match v {
            0 | 2..=TTL_MASK => Ok(TTL(v)),
            _ => Err(InvalidTTL(v)),
        }
    }
}
impl Display for TTL {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "TTL({})", self.0)
    }
}
/// 7-bit `NID`. Derived from a `NetKey` with `k2`. Many keys can share the same `NID`.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct NID(u8);

impl Display for NID {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "NID({:#04x})", self.0)
    }
}
const NID_MASK: u8 = 127;

impl NID {
    /// # Panics
    /// Panics if `v > 127`.
    #[must_use]
    pub fn new(v: u8) -> NID {
        assert!(
            v <= NID_MASK,
            "NID {} is bigger than max NID {}",
            v,
            NID_MASK
        );
        NID(v)
    }
    #[must_use]
    pub const fn with_flag(self, flag: bool) -> u8 {
        self.0 | ((flag as u8) << 7)
    }
    /// Creates a 7 bit NID by masking out the 8th bit from a u8
    #[must_use]
    pub const fn from_masked_u8(v: u8) -> NID {
        NID(v & NID_MASK)
    }
    /// returns 7 bit NID + 1 bit bool flag from 8bit uint.
    #[must_use]
    pub const fn new_with_flag(v: u8) -> (NID, bool) {
        (NID(v & NID_MASK), v & !NID_MASK != 0)
    }
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

/// 24-bit Unsigned Integer.
#[derive(Default, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct U24(u32);
pub const U24_MAX: u32 = (1_u32 << 24) - 1;
impl Display for U24 {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "U24({})", self.0)
    }
}
impl U24 {
    /// # Panics
    /// Panics if `v > U24_MAX`.
    #[must_use]
    pub fn new(v: u32) -> U24 {
        if v > U24_MAX {
            panic!("number {} is bigger than max U24 {}", v, U24_MAX);
        } else {
            U24(v)
        }
    }
    /// Creates a U24 by masking the 4th byte of 'v'
    #[must_use]
    pub const fn new_masked(v: u32) -> U24 {
        U24(v & U24_MAX)
    }
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}
impl ToFromBytesEndian for U24 {
    type AsBytesType = [u8; 3];

    fn to_bytes_le(&self) -> Self::AsBytesType {
        let b = self.0.to_le_bytes();
        [b[0], b[1], b[2]]
    }

    fn to_bytes_be(&self) -> Self::AsBytesType {
        let b = self.0.to_be_bytes();
        [b[1], b[2], b[3]]
    }

    fn from_bytes_le(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [a, b, c] => Some(U24(u32::from_le_bytes([*a, *b, *c, 0]))),
            _ => None,
        }
    }

    fn from_bytes_be(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [a, b, c] => Some(U24(u32::from_be_bytes([0, *a, *b, *c]))),
            _ => None,
        }
    }
}
#[derive(Copy, Clone, Eq, Ord, PartialOrd, PartialEq, Debug, Default, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct IVIndex(pub u32);
impl IVIndex {
    #[must_use]
    pub fn ivi(self) -> IVI {
        IVI(self.0 & 1 == 1)
    }
    /// The IV index one lower than `self`. `None` for IV index 0.
    #[must_use]
    pub fn prev(self) -> Option<IVIndex> {
        self.0.checked_sub(1).map(IVIndex)
    }
}

impl Display for IVIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "IVIndex({:#010x})", self.0)
    }
}
impl ToFromBytesEndian for IVIndex {
    type AsBytesType = [u8; 4];

    fn to_bytes_le(&self) -> Self::AsBytesType {
        (self.0).to_bytes_le()
    }

    fn to_bytes_be(&self) -> Self::AsBytesType {
        (self.0).to_bytes_be()
    }

    fn from_bytes_le(bytes: &[u8]) -> Option<Self> {
        Some(Self(u32::from_bytes_le(bytes)?))
    }

    fn from_bytes_be(bytes: &[u8]) -> Option<Self> {
        Some(Self(u32::from_bytes_be(bytes)?))
    }
}
/// Accepted IV index plus the IV update flag.
///
/// While an IV update is in progress the node transmits with `index - 1` and receives with both
/// `index - 1` and `index`. Outside of an update it transmits with `index`.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct IVIndexState {
    pub index: IVIndex,
    pub update: IVUpdateFlag,
}
impl IVIndexState {
    #[must_use]
    pub fn new(index: IVIndex, update: IVUpdateFlag) -> Self {
        Self { index, update }
    }
    #[must_use]
    pub fn tx_index(&self) -> IVIndex {
        if self.update.0 {
            self.index.prev().unwrap_or(self.index)
        } else {
            self.index
        }
    }
    /// IV index candidates tried, in order, when authenticating a received PDU. Always at most two:
    /// `index - 1` (skipped for index 0) and then `index`.
    #[must_use]
    pub fn rx_candidates(&self) -> IVCandidates {
        IVCandidates {
            previous: self.index.prev(),
            accepted: Some(self.index),
        }
    }
}
/// Iterator over the (at most two) receive IV index candidates.
#[derive(Copy, Clone, Debug)]
pub struct IVCandidates {
    previous: Option<IVIndex>,
    accepted: Option<IVIndex>,
}
impl Iterator for IVCandidates {
    type Item = IVIndex;

    fn next(&mut self) -> Option<Self::Item> {
        self.previous.take().or_else(|| self.accepted.take())
    }
}
/// 24bit Sequence number
#[derive(Copy, Clone, Eq, Ord, PartialOrd, PartialEq, Debug, Default, Hash)]
pub struct SequenceNumber(pub U24);
impl SequenceNumber {
    #[must_use]
    pub fn new(seq: u32) -> Self {
        SequenceNumber(U24::new(seq))
    }
    #[must_use]
    pub const fn value(self) -> u32 {
        (self.0).value()
    }
    /// Returns `self + amount` or `None` if it wouldn't fit in 24 bits.
    #[must_use]
    pub fn checked_add(self, amount: u32) -> Option<SequenceNumber> {
        let next = self.value().checked_add(amount)?;
        if next > U24_MAX {
            None
        } else {
            Some(SequenceNumber(U24(next)))
        }
    }
}

impl Display for SequenceNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "SequenceNumber({})", self.value())
    }
}
impl ToFromBytesEndian for SequenceNumber {
    type AsBytesType = [u8; 3];

    fn to_bytes_le(&self) -> Self::AsBytesType {
        (self.0).to_bytes_le()
    }

    fn to_bytes_be(&self) -> Self::AsBytesType {
        (self.0).to_bytes_be()
    }

    fn from_bytes_le(bytes: &[u8]) -> Option<Self> {
        Some(SequenceNumber(U24::from_bytes_le(bytes)?))
    }

    fn from_bytes_be(bytes: &[u8]) -> Option<Self> {
        Some(SequenceNumber(U24::from_bytes_be(bytes)?))
    }
}

/// Bluetooth SIG assigned company identifier (little endian on the wire).
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub struct CompanyID(pub u16);
impl ToFromBytesEndian for CompanyID {
    type AsBytesType = [u8; 2];

    fn to_bytes_le(&self) -> Self::AsBytesType {
        (self.0).to_bytes_le()
    }

    fn to_bytes_be(&self) -> Self::AsBytesType {
        (self.0).to_bytes_be()
    }

    fn from_bytes_le(bytes: &[u8]) -> Option<Self> {
        Some(CompanyID(u16::from_bytes_le(bytes)?))
    }

    fn from_bytes_be(bytes: &[u8]) -> Option<Self> {
        Some(CompanyID(u16::from_bytes_be(bytes)?))
    }
}
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub struct ModelID(pub u16);
impl ToFromBytesEndian for ModelID {
    type AsBytesType = [u8; 2];

    fn to_bytes_le(&self) -> Self::AsBytesType {
        (self.0).to_bytes_le()
    }

    fn to_bytes_be(&self) -> Self::AsBytesType {
        (self.0).to_bytes_be()
    }

    fn from_bytes_le(bytes: &[u8]) -> Option<Self> {
        Some(ModelID(u16::from_bytes_le(bytes)?))
    }

    fn from_bytes_be(bytes: &[u8]) -> Option<Self> {
        Some(ModelID(u16::from_bytes_be(bytes)?))
    }
}
const KEY_INDEX_MAX: u16 = (1 << 12) - 1;
/// Returned when a key index doesn't fit in 12 bits.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub struct KeyIndexError(pub u16);
/// 12-bit global network key index.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Default)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct NetKeyIndex(u16);
/// 12-bit global application key index.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Default)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct AppKeyIndex(u16);
macro_rules! key_index {
    ( $( $t:ident ), *) => {
        $(
            impl $t {
                /// # Panics
                /// Panics if `index` doesn't fit in 12 bits.
                #[must_use]
                pub fn new(index: u16) -> Self {
                    assert!(index <= KEY_INDEX_MAX, "key index {} out of range", index);
                    Self(index)
                }
            }
            impl TryFrom<u16> for $t {
                type Error = KeyIndexError;

                fn try_from(index: u16) -> Result<Self, Self::Error> {
                    if index > KEY_INDEX_MAX {
                        Err(KeyIndexError(index))
                    } else {
                        Ok(Self(index))
                    }
                }
            }
            impl From<$t> for u16 {
                fn from(index: $t) -> u16 {
                    index.0
                }
            }
            impl Display for $t {
                fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
                    write!(f, "{}({})", stringify!($t), self.0)
                }
            }
        )*
    };
}
key_index!(NetKeyIndex, AppKeyIndex);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl() {
        assert!(!TTL::new(0).should_relay());
        assert!(!TTL::new(1).should_relay());
        assert!(TTL::new(2).should_relay());
        assert!(TTL::new(65).should_relay());
        assert!(TTL::new(127).should_relay());
        assert_eq!(TTL::for_sending(1), Err(InvalidTTL(1)));
        assert_eq!(TTL::for_sending(128), Err(InvalidTTL(128)));
        assert_eq!(TTL::for_sending(0), Ok(TTL::new(0)));
    }
    #[test]
    #[should_panic]
    fn test_ttl_out_of_range() {
        let _ = TTL::new(128);
    }
    #[test]
    fn test_u24_bytes() {
        let seq = SequenceNumber::new(0x3129ab);
        assert_eq!(seq.to_bytes_be(), [0x31, 0x29, 0xab]);
        assert_eq!(SequenceNumber::from_bytes_be(&[0x31, 0x29, 0xab]), Some(seq));
        assert_eq!(SequenceNumber::new(U24_MAX).checked_add(1), None);
    }
    #[test]
    fn test_iv_candidates() {
        let state = IVIndexState::new(IVIndex(0x1234_5678), IVUpdateFlag(false));
        let candidates: Vec<IVIndex> = state.rx_candidates().collect();
        assert_eq!(candidates, vec![IVIndex(0x1234_5677), IVIndex(0x1234_5678)]);
        let zero = IVIndexState::new(IVIndex(0), IVUpdateFlag(false));
        assert_eq!(zero.rx_candidates().collect::<Vec<_>>(), vec![IVIndex(0)]);
        let updating = IVIndexState::new(IVIndex(5), IVUpdateFlag(true));
        assert_eq!(updating.tx_index(), IVIndex(4));
    }
    #[test]
    fn test_key_index() {
        assert!(AppKeyIndex::try_from(0x0FFF).is_ok());
        assert_eq!(NetKeyIndex::try_from(0x1000), Err(KeyIndexError(0x1000)));
    }
}
