//! Bluetooth Mesh Network Layer. Network Layer is BIG Endian.
//!
//! Encryption happens in two steps. `DST || TransportPDU` is AES-CCM encrypted with the
//! `EncryptionKey` (the NetMIC is appended) and then `CTL|TTL, SEQ, SRC` is obfuscated with a
//! keystream from the `PrivacyKey`, the IV index and the first 7 encrypted bytes.
use crate::address::{Address, UnicastAddress};
use crate::bytes::ToFromBytesEndian;
use crate::crypto::aes::{AESCipher, Error, MicSize};
use crate::crypto::key::PrivacyKey;
use crate::crypto::materials::NetworkKeys;
use crate::crypto::nonce::{NetworkNonceParts, Nonce, ProxyNonceParts};
use crate::crypto::MIC;
use crate::lower;
use crate::mesh::{IVIndex, SequenceNumber, CTL, IVI, NID, TTL};
use core::convert::TryFrom;
use core::fmt::{Display, Formatter};

/// Mesh Network PDU Header
/// Network layer is Big Endian.
/// From Mesh Core v1.0
/// | Field Name    | Bits  | Notes                                                     |
/// |---------------|-------|-----------------------------------------------------------|
/// | IVI           | 1     | Least significant bit of IV Index                         |
/// | NID           | 7     | Value derived from the NetKey used to encrypt this PDU    |
/// | CTL           | 1     | Network Control                                           |
/// | TTL           | 7     | Time To Live                                              |
/// | SEQ           | 24    | Sequence Number                                           |
/// | SRC           | 16    | Source Unicast Address                                    |
/// | DST           | 16    | Destination Address (Unicast, Group or Virtual            |
/// | Transport PDU | 8-128 | Transport PDU (1-16 Bytes)                                |
/// | NetMIC        | 32,64 | Message Integrity check for Payload (4 or 8 bytes)        |
///
/// NetMIC is 32 bit when CTL == 0
/// NetMIC is 64 bit when CTL == 1
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Header {
    pub ivi: IVI,
    pub nid: NID,
    pub ctl: CTL,
    pub ttl: TTL,
    pub seq: SequenceNumber,
    pub src: UnicastAddress,
    pub dst: Address,
}

const PDU_HEADER_SIZE: usize = 1 + 1 + 3 + 2 + 2;
/// Largest network PDU (9 byte header + 16 byte transport PDU + 4 byte NetMIC).
pub const MAX_ENCRYPTED_PDU_LEN: usize = 29;
/// Smallest network PDU (9 byte header + 1 byte transport PDU + 4 byte NetMIC).
pub const MIN_ENCRYPTED_PDU_LEN: usize = 14;

impl Header {
    #[must_use]
    pub const fn size() -> usize {
        PDU_HEADER_SIZE
    }
    #[must_use]
    pub fn big_mic(&self) -> bool {
        self.ctl.into()
    }
    #[must_use]
    pub fn mic_size(&self) -> MicSize {
        if self.big_mic() {
            MicSize::Big
        } else {
            MicSize::Small
        }
    }
    fn pack_into(&self, buf: &mut [u8]) {
        buf[0] = self.nid.with_flag(self.ivi.into());
        buf[1] = self.ttl.with_flag(self.ctl.into());
        buf[2..5].copy_from_slice(&self.seq.to_bytes_be());
        buf[5..7].copy_from_slice(&self.src.to_bytes_be());
        buf[7..9].copy_from_slice(&self.dst.to_bytes_be());
    }
}
/// Which nonce protects the network PDU. GATT proxy configuration messages use the proxy nonce.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum NetworkNonceKind {
    Network,
    Proxy,
}
impl NetworkNonceKind {
    fn nonce(self, ctl: CTL, ttl: TTL, seq: SequenceNumber, src: UnicastAddress, iv_index: IVIndex) -> Nonce {
        match self {
            NetworkNonceKind::Network => *NetworkNonceParts {
                ctl,
                ttl,
                src,
                seq,
                iv_index,
            }
            .to_nonce()
            .as_ref(),
            NetworkNonceKind::Proxy => *ProxyNonceParts { seq, src, iv_index }
                .to_nonce()
                .as_ref(),
        }
    }
}
/// Mesh Network PDU Structure (plaintext).
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct PDU {
    pub header: Header,
    pub payload: lower::PDUBytes,
}
impl PDU {
    #[must_use]
    pub fn new(header: Header, payload: lower::PDUBytes) -> Self {
        Self { header, payload }
    }
    /// Encrypts and obfuscates the PDU. `header.nid` and `header.ivi` are replaced by the ones of
    /// `keys` and `iv_index`.
    pub fn encrypt(
        &self,
        keys: &NetworkKeys,
        iv_index: IVIndex,
        nonce_kind: NetworkNonceKind,
    ) -> Result<EncryptedPDU, Error> {
        let header = Header {
            ivi: iv_index.ivi(),
            nid: keys.nid(),
            ..self.header
        };
        let transport_len = self.payload.len();
        let mic_size = header.mic_size();
        let total_len = PDU_HEADER_SIZE + transport_len + mic_size.byte_size();
        if transport_len == 0 || total_len > MAX_ENCRYPTED_PDU_LEN {
            return Err(Error);
        }
        let mut buf = [0_u8; MAX_ENCRYPTED_PDU_LEN];
        header.pack_into(&mut buf[..PDU_HEADER_SIZE]);
        buf[PDU_HEADER_SIZE..PDU_HEADER_SIZE + transport_len].copy_from_slice(self.payload.as_ref());
        let nonce = nonce_kind.nonce(header.ctl, header.ttl, header.seq, header.src, iv_index);
        let mic = AESCipher::new(*keys.encryption_key().key()).ccm_encrypt(
            &nonce,
            b"",
            &mut buf[7..PDU_HEADER_SIZE + transport_len],
            mic_size,
        )?;
        mic.pack_into(&mut buf[PDU_HEADER_SIZE + transport_len..total_len]);
        let mut out = EncryptedPDU { buf, len: total_len };
        out.xor_obfuscation(keys.privacy_key(), iv_index);
        Ok(out)
    }
}
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum NetDecryptError {
    /// Source address after deobfuscation isn't a unicast address.
    BadSource,
    BadLength,
    /// NetMIC didn't authenticate.
    MicMismatch,
}
impl Display for NetDecryptError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), core::fmt::Error> {
        let s = match self {
            NetDecryptError::BadSource => "source isn't unicast",
            NetDecryptError::BadLength => "bad network pdu length",
            NetDecryptError::MicMismatch => "network mic mismatch",
        };
        f.write_str(s)
    }
}
/// Header fields recovered by deobfuscation. Only trustworthy once the NetMIC is checked.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct PrivateHeader {
    pub ctl: CTL,
    pub ttl: TTL,
    pub seq: SequenceNumber,
    pub src: u16,
}
impl PrivateHeader {
    #[must_use]
    pub fn src_unicast(&self) -> Option<UnicastAddress> {
        UnicastAddress::try_from(self.src).ok()
    }
}
/// Encrypted and obfuscated network PDU as sent over the air.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct EncryptedPDU {
    buf: [u8; MAX_ENCRYPTED_PDU_LEN],
    len: usize,
}
impl EncryptedPDU {
    /// Returns `None` if `bytes` can't be a network PDU.
    #[must_use]
    pub fn new(bytes: &[u8]) -> Option<EncryptedPDU> {
        if bytes.len() < MIN_ENCRYPTED_PDU_LEN || bytes.len() > MAX_ENCRYPTED_PDU_LEN {
            None
        } else {
            let mut buf = [0_u8; MAX_ENCRYPTED_PDU_LEN];
            buf[..bytes.len()].copy_from_slice(bytes);
            Some(EncryptedPDU {
                buf,
                len: bytes.len(),
            })
        }
    }
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.buf[..self.len]
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
    #[must_use]
    pub fn ivi(&self) -> IVI {
        IVI(self.buf[0] & 0x80 != 0)
    }
    #[must_use]
    pub fn nid(&self) -> NID {
        NID::from_masked_u8(self.buf[0])
    }
    fn pecb(&self, privacy_key: &PrivacyKey, iv_index: IVIndex) -> [u8; 16] {
        let mut block = [0_u8; 16];
        block[5..9].copy_from_slice(&iv_index.to_bytes_be());
        block[9..16].copy_from_slice(&self.buf[7..14]);
        AESCipher::new(*privacy_key.key()).encrypt_block(block)
    }
    fn xor_obfuscation(&mut self, privacy_key: &PrivacyKey, iv_index: IVIndex) {
        let pecb = self.pecb(privacy_key, iv_index);
        for (b, p) in self.buf[1..7].iter_mut().zip(pecb.iter()) {
            *b ^= *p;
        }
    }
    /// Reverses the header obfuscation with a candidate `PrivacyKey` and IV index.
    #[must_use]
    pub fn deobfuscate(&self, privacy_key: &PrivacyKey, iv_index: IVIndex) -> PrivateHeader {
        let pecb = self.pecb(privacy_key, iv_index);
        let mut header = [0_u8; 6];
        for (i, b) in header.iter_mut().enumerate() {
            *b = self.buf[1 + i] ^ pecb[i];
        }
        let (ttl, ctl) = TTL::new_with_flag(header[0]);
        PrivateHeader {
            ctl: CTL(ctl),
            ttl,
            seq: SequenceNumber::new(u32::from_be_bytes([0, header[1], header[2], header[3]])),
            src: u16::from_be_bytes([header[4], header[5]]),
        }
    }
    /// Authenticates and decrypts the PDU with a deobfuscated header.
    pub fn decrypt_with(
        &self,
        private_header: &PrivateHeader,
        keys: &NetworkKeys,
        iv_index: IVIndex,
        nonce_kind: NetworkNonceKind,
    ) -> Result<PDU, NetDecryptError> {
        let src = private_header
            .src_unicast()
            .ok_or(NetDecryptError::BadSource)?;
        let mic_size = if private_header.ctl.0 || nonce_kind == NetworkNonceKind::Proxy {
            MicSize::Big
        } else {
            MicSize::Small
        };
        let mic_len = mic_size.byte_size();
        if self.len < PDU_HEADER_SIZE + 1 + mic_len {
            return Err(NetDecryptError::BadLength);
        }
        let mic_start = self.len - mic_len;
        let mic = MIC::try_from_bytes_be(&self.buf[mic_start..self.len])
            .ok_or(NetDecryptError::BadLength)?;
        let nonce = nonce_kind.nonce(
            private_header.ctl,
            private_header.ttl,
            private_header.seq,
            src,
            iv_index,
        );
        let mut plain = [0_u8; MAX_ENCRYPTED_PDU_LEN];
        plain[..mic_start - 7].copy_from_slice(&self.buf[7..mic_start]);
        AESCipher::new(*keys.encryption_key().key())
            .ccm_decrypt(&nonce, b"", &mut plain[..mic_start - 7], mic)
            .map_err(|_| NetDecryptError::MicMismatch)?;
        let header = Header {
            ivi: self.ivi(),
            nid: self.nid(),
            ctl: private_header.ctl,
            ttl: private_header.ttl,
            seq: private_header.seq,
            src,
            dst: Address::from(u16::from_be_bytes([plain[0], plain[1]])),
        };
        let payload = lower::PDUBytes::try_from(&plain[2..mic_start - 7])
            .map_err(|_| NetDecryptError::BadLength)?;
        Ok(PDU::new(header, payload))
    }
    /// Deobfuscates and decrypts in one step.
    pub fn try_decrypt(
        &self,
        keys: &NetworkKeys,
        iv_index: IVIndex,
        nonce_kind: NetworkNonceKind,
    ) -> Result<PDU, NetDecryptError> {
        let private_header = self.deobfuscate(keys.privacy_key(), iv_index);
        self.decrypt_with(&private_header, keys, iv_index, nonce_kind)
    }
}
impl AsRef<[u8]> for EncryptedPDU {
    fn as_ref(&self) -> &[u8] {
        self.data()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytes::hex_to_bytes;
    use crate::crypto::key::NetKey;

    fn sample_keys() -> NetworkKeys {
        NetworkKeys::from(&NetKey::from_hex("7dd7364cd842ad18c17c2b820c84c3d6").unwrap())
    }
    /// Message #1 from Mesh Core v1.0 Sample Data
    fn message_1() -> PDU {
        let transport = hex_to_bytes("034b50057e400000010000").unwrap();
        PDU::new(
            Header {
                ivi: IVI(false),
                nid: NID::new(0x68),
                ctl: CTL(true),
                ttl: TTL::new(0),
                seq: SequenceNumber::new(1),
                src: UnicastAddress::new(0x1201),
                dst: Address::from(0xfffd_u16),
            },
            lower::PDUBytes::try_from(&transport[..]).unwrap(),
        )
    }
    const MESSAGE_1: &str = "68eca487516765b5e5bfdacbaf6cb7fb6bff871f035444ce83a670df";

    #[test]
    fn test_message_1_encrypt() {
        let encrypted = message_1()
            .encrypt(&sample_keys(), IVIndex(0x1234_5678), NetworkNonceKind::Network)
            .unwrap();
        assert_eq!(encrypted.data(), &hex_to_bytes(MESSAGE_1).unwrap()[..]);
    }
    #[test]
    fn test_message_1_decrypt() {
        let encrypted = EncryptedPDU::new(&hex_to_bytes(MESSAGE_1).unwrap()).unwrap();
        assert_eq!(encrypted.nid(), NID::new(0x68));
        assert_eq!(encrypted.ivi(), IVI(false));
        let private = encrypted.deobfuscate(sample_keys().privacy_key(), IVIndex(0x1234_5678));
        assert_eq!(private.src, 0x1201);
        assert_eq!(private.seq, SequenceNumber::new(1));
        let pdu = encrypted
            .try_decrypt(&sample_keys(), IVIndex(0x1234_5678), NetworkNonceKind::Network)
            .unwrap();
        assert_eq!(pdu, message_1());
    }
    #[test]
    fn test_wrong_iv_index_fails() {
        let encrypted = EncryptedPDU::new(&hex_to_bytes(MESSAGE_1).unwrap()).unwrap();
        assert!(encrypted
            .try_decrypt(&sample_keys(), IVIndex(0x1234_5677), NetworkNonceKind::Network)
            .is_err());
        assert!(encrypted
            .try_decrypt(&sample_keys(), IVIndex(0x1234_5678), NetworkNonceKind::Proxy)
            .is_err());
    }
    #[test]
    fn test_proxy_round_trip() {
        let pdu = PDU::new(
            Header {
                ivi: IVI(false),
                nid: NID::new(0),
                ctl: CTL(true),
                ttl: TTL::new(0),
                seq: SequenceNumber::new(0x10),
                src: UnicastAddress::new(0x0001),
                dst: Address::Unassigned,
            },
            lower::PDUBytes::try_from(&[0x00_u8, 0x01][..]).unwrap(),
        );
        let encrypted = pdu
            .encrypt(&sample_keys(), IVIndex(0x1234_5678), NetworkNonceKind::Proxy)
            .unwrap();
        assert_eq!(encrypted.len(), 9 + 2 + 8);
        let decrypted = encrypted
            .try_decrypt(&sample_keys(), IVIndex(0x1234_5678), NetworkNonceKind::Proxy)
            .unwrap();
        assert_eq!(decrypted.header.dst, Address::Unassigned);
        assert_eq!(decrypted.payload.as_ref(), &[0x00, 0x01]);
    }
}
