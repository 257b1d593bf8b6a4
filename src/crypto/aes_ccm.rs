//! AES-CCM (RFC 3610) with the parameters the Mesh uses: 13 byte nonce, 2 byte length field and a
//! 4 or 8 byte tag. Implements `aead::Aead` so callers can stay generic over the tag size.
use aes::block_cipher_trait::BlockCipher;
use aes::Aes128;

use aead::generic_array::typenum::{U0, U13, U16, U4, U8};
use aead::generic_array::{ArrayLength, GenericArray};
use aead::{Aead, Error, NewAead};
use subtle::ConstantTimeEq;

use core::marker::PhantomData;

const BLOCK_LEN: usize = 16;
const NONCE_LEN: usize = 13;
type Block = [u8; BLOCK_LEN];
/// Additional data must fit before the 0xFF00 length escape.
const MAX_AAD_LEN: usize = 0xFF00;
/// With a 2 byte length field the payload length must fit in a `u16`.
const MAX_PAYLOAD_LEN: usize = 0xFFFF;

/// Tag sizes used by the Mesh (TransMIC/NetMIC).
pub trait CcmTagSize: ArrayLength<u8> {}
impl CcmTagSize for U4 {}
impl CcmTagSize for U8 {}

pub struct AesCcm<TagSize: CcmTagSize> {
    cipher: Aes128,
    tag_size: PhantomData<TagSize>,
}
impl<TagSize: CcmTagSize> From<&Aes128> for AesCcm<TagSize> {
    fn from(cipher: &Aes128) -> Self {
        AesCcm {
            cipher: cipher.clone(),
            tag_size: PhantomData,
        }
    }
}
impl<TagSize: CcmTagSize> NewAead for AesCcm<TagSize> {
    type KeySize = U16;

    fn new(key: GenericArray<u8, U16>) -> Self {
        AesCcm {
            cipher: Aes128::new(&key),
            tag_size: PhantomData,
        }
    }
}

impl<TagSize: CcmTagSize> AesCcm<TagSize> {
    fn encrypt(&self, mut block: Block) -> Block {
        self.cipher
            .encrypt_block(GenericArray::from_mut_slice(&mut block));
        block
    }
    /// `A_i` counter block. Flags only carry `L - 1`.
    fn counter_block(nonce: &[u8], counter: u16) -> Block {
        let mut block = [0_u8; BLOCK_LEN];
        block[0] = 0x01;
        block[1..=NONCE_LEN].copy_from_slice(nonce);
        block[14..].copy_from_slice(&counter.to_be_bytes());
        block
    }
    /// XORs the CTR keystream (starting at counter 1) over `payload`.
    fn apply_keystream(&self, nonce: &[u8], payload: &mut [u8]) {
        for (i, chunk) in payload.chunks_mut(BLOCK_LEN).enumerate() {
            let stream = self.encrypt(Self::counter_block(nonce, i as u16 + 1));
            chunk
                .iter_mut()
                .zip(stream.iter())
                .for_each(|(p, s)| *p ^= *s);
        }
    }
    /// CBC-MAC over `B_0`, the length prefixed additional data and the plaintext.
    fn cbc_mac(&self, nonce: &[u8], associated_data: &[u8], plaintext: &[u8]) -> Block {
        let tag_len = TagSize::to_usize() as u8;
        let mut b0 = [0_u8; BLOCK_LEN];
        b0[0] = (u8::from(!associated_data.is_empty()) << 6) | (((tag_len - 2) / 2) << 3) | 0x01;
        b0[1..=NONCE_LEN].copy_from_slice(nonce);
        b0[14..].copy_from_slice(&(plaintext.len() as u16).to_be_bytes());
        let mut mac = self.encrypt(b0);

        if !associated_data.is_empty() {
            let length = (associated_data.len() as u16).to_be_bytes();
            let mut stream = length.iter().chain(associated_data.iter()).peekable();
            while stream.peek().is_some() {
                for (m, a) in mac.iter_mut().zip(&mut stream) {
                    *m ^= *a;
                }
                mac = self.encrypt(mac);
            }
        }
        for chunk in plaintext.chunks(BLOCK_LEN) {
            mac.iter_mut().zip(chunk.iter()).for_each(|(m, p)| *m ^= *p);
            mac = self.encrypt(mac);
        }
        mac
    }
    fn tag(&self, nonce: &[u8], mac: &Block) -> GenericArray<u8, TagSize> {
        let s0 = self.encrypt(Self::counter_block(nonce, 0));
        let mut tag = GenericArray::default();
        for (i, t) in tag.iter_mut().enumerate() {
            *t = mac[i] ^ s0[i];
        }
        tag
    }
    fn check_lengths(associated_data: &[u8], payload: &[u8]) -> Result<(), Error> {
        if associated_data.len() >= MAX_AAD_LEN || payload.len() > MAX_PAYLOAD_LEN {
            Err(Error)
        } else {
            Ok(())
        }
    }
}

impl<TagSize: CcmTagSize> Aead for AesCcm<TagSize> {
    type NonceSize = U13;
    type TagSize = TagSize;
    type CiphertextOverhead = U0;

    fn encrypt_in_place_detached(
        &self,
        nonce: &GenericArray<u8, Self::NonceSize>,
        associated_data: &[u8],
        payload: &mut [u8],
    ) -> Result<GenericArray<u8, TagSize>, Error> {
        Self::check_lengths(associated_data, payload)?;
        let mac = self.cbc_mac(nonce, associated_data, payload);
        self.apply_keystream(nonce, payload);
        Ok(self.tag(nonce, &mac))
    }

    fn decrypt_in_place_detached(
        &self,
        nonce: &GenericArray<u8, Self::NonceSize>,
        associated_data: &[u8],
        payload: &mut [u8],
        tag: &GenericArray<u8, TagSize>,
    ) -> Result<(), Error> {
        Self::check_lengths(associated_data, payload)?;
        self.apply_keystream(nonce, payload);
        let mac = self.cbc_mac(nonce, associated_data, payload);
        let expected = self.tag(nonce, &mac);
        if expected.as_slice().ct_eq(tag.as_slice()).unwrap_u8() == 1 {
            Ok(())
        } else {
            // Don't hand out unauthenticated plaintext.
            payload.iter_mut().for_each(|b| *b = 0);
            Err(Error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytes::hex_to_bytes;

    // RFC 3610 packet vector #1 reduced to the Mesh parameters isn't available, so these check the
    // round trip and the tamper detection. The Mesh sample data fixtures live in `net` and `upper`.
    #[test]
    fn test_round_trip_and_tamper() {
        let key = GenericArray::clone_from_slice(
            &hex_to_bytes("63964771734fbd76e3b40519d1d94a48").unwrap(),
        );
        let ccm = AesCcm::<U4>::new(key);
        let nonce = GenericArray::clone_from_slice(
            &hex_to_bytes("010007080d1234973612345677").unwrap(),
        );
        let plaintext = hex_to_bytes("ea0a00576f726c64").unwrap();
        let mut buf = plaintext.clone();
        let tag = ccm.encrypt_in_place_detached(&nonce, b"", &mut buf).unwrap();
        assert_ne!(buf, plaintext);
        let mut decrypted = buf.clone();
        ccm.decrypt_in_place_detached(&nonce, b"", &mut decrypted, &tag)
            .unwrap();
        assert_eq!(decrypted, plaintext);

        let mut tampered = buf.clone();
        tampered[0] ^= 1;
        assert!(ccm
            .decrypt_in_place_detached(&nonce, b"", &mut tampered, &tag)
            .is_err());
        assert!(tampered.iter().all(|b| *b == 0));
    }
    #[test]
    fn test_tag_size_is_authenticated() {
        let key = GenericArray::clone_from_slice(&[0x42_u8; 16]);
        let nonce = GenericArray::clone_from_slice(&[0x07_u8; 13]);
        let mut small = [1_u8, 2, 3, 4, 5];
        let small_tag = AesCcm::<U4>::new(key.clone())
            .encrypt_in_place_detached(&nonce, b"", &mut small)
            .unwrap();
        let mut big = [1_u8, 2, 3, 4, 5];
        let big_tag = AesCcm::<U8>::new(key)
            .encrypt_in_place_detached(&nonce, b"", &mut big)
            .unwrap();
        // Same keystream, different B_0 flags.
        assert_eq!(small, big);
        assert_ne!(&small_tag[..], &big_tag[..4]);
    }
}
