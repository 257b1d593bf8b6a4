//! 13 byte AES-CCM nonces. Every nonce is `type || ... || SEQ || SRC || (DST or 0x0000) || IVIndex`
//! with all multi-byte fields big endian.
use crate::address::{Address, UnicastAddress};
use crate::bytes::ToFromBytesEndian;
use crate::mesh::{IVIndex, SequenceNumber, CTL, TTL};

pub const NONCE_LEN: usize = 13;
#[derive(Clone, Copy, Debug, Hash, Eq, PartialOrd, PartialEq, Ord)]
pub struct Nonce([u8; NONCE_LEN]);
impl Nonce {
    #[must_use]
    pub const fn new(bytes: [u8; NONCE_LEN]) -> Nonce {
        Nonce(bytes)
    }
    fn build(
        nonce_type: NonceType,
        second: u8,
        seq: SequenceNumber,
        src: UnicastAddress,
        dst: Address,
        iv_index: IVIndex,
    ) -> Nonce {
        let mut out = [0_u8; NONCE_LEN];
        out[0] = nonce_type.as_u8();
        out[1] = second;
        out[2..5].copy_from_slice(&seq.to_bytes_be());
        out[5..7].copy_from_slice(&src.to_bytes_be());
        out[7..9].copy_from_slice(&dst.to_bytes_be());
        out[9..13].copy_from_slice(&iv_index.to_bytes_be());
        Nonce(out)
    }
}
impl AsRef<[u8]> for Nonce {
    fn as_ref(&self) -> &[u8] {
        &self.0[..]
    }
}
macro_rules! nonce_newtype {
    ( $( $name:ident ),* ) => {
        $(
            #[derive(Clone, Copy, Debug, Hash, Eq, PartialOrd, PartialEq, Ord)]
            pub struct $name(Nonce);
            impl $name {
                #[must_use]
                pub const fn new(nonce: Nonce) -> Self {
                    Self(nonce)
                }
            }
            impl AsRef<Nonce> for $name {
                fn as_ref(&self) -> &Nonce {
                    &self.0
                }
            }
        )*
    };
}
nonce_newtype!(NetworkNonce, AppNonce, DeviceNonce, ProxyNonce);

/// Nonce Types
/// 0x04--0xFF RFU
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
#[repr(u8)]
pub enum NonceType {
    Network = 0x00,
    Application = 0x01,
    Device = 0x02,
    Proxy = 0x03,
}
impl NonceType {
    #[must_use]
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct NetworkNonceParts {
    pub ctl: CTL,
    pub ttl: TTL,
    pub src: UnicastAddress,
    pub seq: SequenceNumber,
    pub iv_index: IVIndex,
}

impl NetworkNonceParts {
    #[must_use]
    pub fn to_nonce(&self) -> NetworkNonce {
        NetworkNonce(Nonce::build(
            NonceType::Network,
            self.ttl.with_flag(self.ctl.0),
            self.seq,
            self.src,
            Address::Unassigned,
            self.iv_index,
        ))
    }
}

/// Parts of the application and device nonces. They only differ in the nonce type octet.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct UpperNonceParts {
    pub aszmic: bool,
    pub seq: SequenceNumber,
    pub src: UnicastAddress,
    pub dst: Address,
    pub iv_index: IVIndex,
}

impl UpperNonceParts {
    fn build(&self, nonce_type: NonceType) -> Nonce {
        Nonce::build(
            nonce_type,
            u8::from(self.aszmic) << 7,
            self.seq,
            self.src,
            self.dst,
            self.iv_index,
        )
    }
    #[must_use]
    pub fn app_nonce(&self) -> AppNonce {
        AppNonce(self.build(NonceType::Application))
    }
    #[must_use]
    pub fn device_nonce(&self) -> DeviceNonce {
        DeviceNonce(self.build(NonceType::Device))
    }
}

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct ProxyNonceParts {
    pub seq: SequenceNumber,
    pub src: UnicastAddress,
    pub iv_index: IVIndex,
}

impl ProxyNonceParts {
    #[must_use]
    pub fn to_nonce(&self) -> ProxyNonce {
        ProxyNonce(Nonce::build(
            NonceType::Proxy,
            0x00,
            self.seq,
            self.src,
            Address::Unassigned,
            self.iv_index,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytes::hex_to_bytes;

    #[test]
    fn test_network_nonce() {
        // Mesh Profile sample data, message #1.
        let nonce = NetworkNonceParts {
            ctl: CTL(true),
            ttl: TTL::new(0),
            src: UnicastAddress::new(0x1201),
            seq: SequenceNumber::new(1),
            iv_index: IVIndex(0x1234_5678),
        }
        .to_nonce();
        assert_eq!(
            nonce.as_ref().as_ref(),
            &hex_to_bytes("00800000011201000012345678").unwrap()[..]
        );
    }
    #[test]
    fn test_device_nonce() {
        // Mesh Profile sample data, message #6.
        let nonce = UpperNonceParts {
            aszmic: false,
            seq: SequenceNumber::new(0x3129ab),
            src: UnicastAddress::new(0x0003),
            dst: Address::from(0x1201_u16),
            iv_index: IVIndex(0x1234_5678),
        }
        .device_nonce();
        assert_eq!(
            nonce.as_ref().as_ref(),
            &hex_to_bytes("02003129ab0003120112345678").unwrap()[..]
        );
    }
    #[test]
    fn test_proxy_nonce() {
        let nonce = ProxyNonceParts {
            seq: SequenceNumber::new(1),
            src: UnicastAddress::new(0x0001),
            iv_index: IVIndex(0x1234_5678),
        }
        .to_nonce();
        assert_eq!(
            nonce.as_ref().as_ref(),
            &hex_to_bytes("03000000010001000012345678").unwrap()[..]
        );
    }
}
