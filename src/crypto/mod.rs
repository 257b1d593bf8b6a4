//! Crypto functions (AES-CMAC, AES-CCM and the `k` derivation functions) that the Mesh uses.
//! AES is primarily used in the `crypto::k_funcs` and in network/upper transport layer encryption.
use crate::bytes::ToFromBytesEndian;
use crate::crypto::key::Key;
use core::convert::TryFrom;
use core::fmt::{Display, Error, Formatter};

/// Helper function to convert a 16 byte (32 character) hex string to 16 byte array.
/// Returns `None` if `hex.len() != 32` or if `hex` contains non-hex characters.
#[must_use]
pub fn hex_16_to_array(hex: &str) -> Option<[u8; 16]> {
    if hex.len() != 32 {
        None
    } else {
        let mut out = [0_u8; 16];
        for (pos, c) in hex.chars().enumerate() {
            let value = u8::try_from(c.to_digit(16)?).ok()?;
            let byte_pos = pos / 2;
            if pos % 2 == 1 {
                out[byte_pos] |= value;
            } else {
                out[byte_pos] |= value << 4;
            }
        }
        Some(out)
    }
}

pub mod aes;
mod aes_ccm;
mod aes_cmac;
pub mod k_funcs;
pub mod key;
pub mod materials;
pub mod nonce;

/// Message Integrity Check. `Small` (32-bit) for access network PDUs and the default TransMIC,
/// `Big` (64-bit) for control network PDUs and segmented messages with `SZMIC` set.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum MIC {
    Big(u64),
    Small(u32),
}
const BIG_MIC_SIZE: usize = 8;
const SMALL_MIC_SIZE: usize = 4;
impl MIC {
    #[must_use]
    pub fn try_from_bytes_be(bytes: &[u8]) -> Option<MIC> {
        match bytes.len() {
            SMALL_MIC_SIZE => Some(MIC::Small(u32::from_bytes_be(bytes)?)),
            BIG_MIC_SIZE => Some(MIC::Big(u64::from_bytes_be(bytes)?)),
            _ => None,
        }
    }
    #[must_use]
    pub fn mic(&self) -> u64 {
        match self {
            MIC::Big(b) => *b,
            MIC::Small(s) => u64::from(*s),
        }
    }
    #[must_use]
    pub fn is_big(&self) -> bool {
        match self {
            MIC::Big(_) => true,
            MIC::Small(_) => false,
        }
    }
    /// Return the size in bytes (4 or 8) needed to represent the MIC.
    /// ```
    /// use mesh_transport::crypto::MIC;
    /// assert_eq!(MIC::Big(0u64).byte_size(), 8);
    /// assert_eq!(MIC::Small(0u32).byte_size(), 4);
    /// ```
    #[must_use]
    pub fn byte_size(&self) -> usize {
        if self.is_big() {
            BIG_MIC_SIZE
        } else {
            SMALL_MIC_SIZE
        }
    }
    #[must_use]
    pub const fn max_len() -> usize {
        BIG_MIC_SIZE
    }
    #[must_use]
    pub const fn small_size() -> usize {
        SMALL_MIC_SIZE
    }
    #[must_use]
    pub const fn big_size() -> usize {
        BIG_MIC_SIZE
    }
    /// Writes the MIC big endian into the first `self.byte_size()` bytes of `buf`.
    /// # Panics
    /// Panics if `buf.len() < self.byte_size()`.
    pub fn pack_into(&self, buf: &mut [u8]) {
        match self {
            MIC::Big(b) => buf[..BIG_MIC_SIZE].copy_from_slice(&b.to_bytes_be()),
            MIC::Small(s) => buf[..SMALL_MIC_SIZE].copy_from_slice(&s.to_bytes_be()),
        }
    }
}
impl TryFrom<&[u8]> for MIC {
    type Error = ();

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        Self::try_from_bytes_be(value).ok_or(())
    }
}
impl Display for MIC {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        match self {
            MIC::Big(b) => write!(f, "Big({:016x})", b),
            MIC::Small(s) => write!(f, "Small({:08x})", s),
        }
    }
}

/// 6 bit Application Key ID
#[derive(Clone, Copy, Debug, Hash, Eq, PartialOrd, PartialEq, Ord)]
pub struct AID(u8);
const AID_MAX: u8 = (1 << 6) - 1;

impl AID {
    /// Creates a new 6 bit `AID`
    /// # Panics
    /// Panics if `aid > AID_MAX` (63)
    #[must_use]
    pub fn new(aid: u8) -> AID {
        assert!(aid <= AID_MAX, "AID {} is bigger than max AID", aid);
        AID(aid)
    }
    /// Creates a AID by masking `aid` to just 6 (lower) bits
    #[must_use]
    pub const fn new_masked(aid: u8) -> AID {
        AID(aid & AID_MAX)
    }
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}
/// Application Key Flag. `AKF(true)` means an application key, `AKF(false)` the device key.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialOrd, PartialEq, Ord)]
pub struct AKF(pub bool);
impl From<bool> for AKF {
    fn from(b: bool) -> Self {
        AKF(b)
    }
}
impl From<AKF> for bool {
    fn from(a: AKF) -> Self {
        a.0
    }
}
#[derive(Debug, Copy, Clone)]
pub struct TryFromBlockError(());
const SALT_LEN: usize = 16;
#[derive(Clone, Copy, Debug, Hash, Eq, PartialOrd, PartialEq, Ord)]
pub struct Salt([u8; SALT_LEN]);

impl Salt {
    #[must_use]
    pub fn new(salt: [u8; SALT_LEN]) -> Salt {
        Salt(salt)
    }
    #[must_use]
    pub fn from_hex(hex: &str) -> Option<Salt> {
        Some(Salt::new(hex_16_to_array(hex)?))
    }
    #[must_use]
    pub fn as_key(&self) -> Key {
        Key::new(self.0)
    }
}

impl TryFrom<&[u8]> for Salt {
    type Error = TryFromBlockError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        if value.len() != SALT_LEN {
            Err(TryFromBlockError(()))
        } else {
            let mut buf = Salt([0_u8; SALT_LEN]);
            buf.0.copy_from_slice(value);
            Ok(buf)
        }
    }
}
impl AsRef<[u8]> for Salt {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
#[repr(u8)]
pub enum KeyRefreshPhases {
    Normal,
    First,
    Second,
}
pub use k_funcs::{k1, k2, k4, s1};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mic_bytes() {
        let mic = MIC::try_from_bytes_be(&[0x5e, 0x3b, 0x7c, 0x2f]).unwrap();
        assert_eq!(mic, MIC::Small(0x5e3b_7c2f));
        let mut buf = [0_u8; 8];
        mic.pack_into(&mut buf);
        assert_eq!(&buf[..4], &[0x5e, 0x3b, 0x7c, 0x2f]);
        assert_eq!(MIC::try_from_bytes_be(&[0; 5]), None);
    }
    #[test]
    fn test_aid() {
        assert_eq!(AID::new(0x3F).value(), 0x3F);
        assert_eq!(AID::new_masked(0xFF), AID::new(0x3F));
    }
    #[test]
    #[should_panic]
    fn test_aid_out_of_range() {
        let _ = AID::new(0x40);
    }
}
