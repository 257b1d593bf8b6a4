//! A module for crypto AES functions. Essentially a wrapper around a 3rd party AES crypto lib
//! (aes_soft in this case). This lets the rest of the library code to not have a hard dependence
//! on any 3rd party libs. Bluetooth Mesh uses 128-bit exclusively as its Key bit size.

use crate::crypto::aes_ccm::AesCcm;
use crate::crypto::aes_cmac::Cmac;
use crate::crypto::key::Key;
use crate::crypto::{nonce::Nonce, Salt, MIC};
use aead::generic_array::typenum::{U4, U8};
use aead::generic_array::GenericArray;
use aead::Aead;
use aes::block_cipher_trait::BlockCipher;
use aes::Aes128;
use core::fmt::{Display, Formatter};

/// Returned when a key can't be used to decrypt. (Wrong Key? Wrong IV Index? Wrong MIC size?)
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Error;
impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), core::fmt::Error> {
        f.write_str("authentication failed")
    }
}
type AesCcmBigMic = AesCcm<U8>;
type AesCcmSmallMic = AesCcm<U4>;
#[derive(Ord, PartialOrd, Eq, PartialEq, Copy, Clone, Debug, Hash)]
pub enum MicSize {
    Big,
    Small,
}
impl MicSize {
    #[must_use]
    pub fn byte_size(self) -> usize {
        match self {
            MicSize::Big => MIC::big_size(),
            MicSize::Small => MIC::small_size(),
        }
    }
    #[must_use]
    pub fn is_big(self) -> bool {
        match self {
            MicSize::Big => true,
            MicSize::Small => false,
        }
    }
}
pub struct AESCipher(Aes128);
impl AESCipher {
    #[must_use]
    pub fn new(key: Key) -> AESCipher {
        AESCipher(Aes128::new(GenericArray::from_slice(key.as_ref())))
    }
    #[must_use]
    fn cmac_cipher(&self) -> Cmac {
        Cmac::from_cipher(self.0.clone())
    }
    /// Single block AES-ECB encryption (the `e` function in the Mesh Profile).
    #[must_use]
    pub fn encrypt_block(&self, mut block: [u8; 16]) -> [u8; 16] {
        self.0.encrypt_block(GenericArray::from_mut_slice(&mut block));
        block
    }
    #[must_use]
    pub fn cmac(&self, m: &[u8]) -> Key {
        self.cmac_slice(&[m])
    }
    /// CMAC over the concatenation of `ms`.
    #[must_use]
    pub fn cmac_slice(&self, ms: &[&[u8]]) -> Key {
        let mut cmac_context = self.cmac_cipher();
        for m in ms {
            cmac_context.input(m);
        }
        Key::new(cmac_context.result())
    }
    /// AES-CCM encrypts `payload` in place and returns the detached MIC.
    /// Only fails if `payload` or `associated_data` are longer than CCM allows.
    pub fn ccm_encrypt(
        &self,
        nonce: &Nonce,
        associated_data: &[u8],
        payload: &mut [u8],
        mic_size: MicSize,
    ) -> Result<MIC, Error> {
        let nonce = GenericArray::from_slice(nonce.as_ref());
        match mic_size {
            MicSize::Big => {
                let tag = AesCcmBigMic::from(&self.0)
                    .encrypt_in_place_detached(nonce, associated_data, payload)
                    .map_err(|_| Error)?;
                let mut mic = [0_u8; 8];
                mic.copy_from_slice(&tag);
                Ok(MIC::Big(u64::from_be_bytes(mic)))
            }
            MicSize::Small => {
                let tag = AesCcmSmallMic::from(&self.0)
                    .encrypt_in_place_detached(nonce, associated_data, payload)
                    .map_err(|_| Error)?;
                let mut mic = [0_u8; 4];
                mic.copy_from_slice(&tag);
                Ok(MIC::Small(u32::from_be_bytes(mic)))
            }
        }
    }
    /// AES CCM decryption of the payload. To supply no associated data, pass it an empty slice
    /// (such as `b""`). The MIC variant selects the tag length.
    pub fn ccm_decrypt(
        &self,
        nonce: &Nonce,
        associated_data: &[u8],
        payload: &mut [u8],
        mic: MIC,
    ) -> Result<(), Error> {
        let nonce = GenericArray::from_slice(nonce.as_ref());
        match mic {
            MIC::Big(b) => AesCcmBigMic::from(&self.0)
                .decrypt_in_place_detached(
                    nonce,
                    associated_data,
                    payload,
                    GenericArray::from_slice(&b.to_be_bytes()),
                )
                .map_err(|_| Error),
            MIC::Small(s) => AesCcmSmallMic::from(&self.0)
                .decrypt_in_place_detached(
                    nonce,
                    associated_data,
                    payload,
                    GenericArray::from_slice(&s.to_be_bytes()),
                )
                .map_err(|_| Error),
        }
    }
}

impl From<Key> for AESCipher {
    fn from(k: Key) -> Self {
        Self::new(k)
    }
}
impl From<Salt> for AESCipher {
    fn from(s: Salt) -> Self {
        s.as_key().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_big_mic_round_trip() {
        let cipher = AESCipher::new(Key::from_hex("0953fa93e7caac9638f58820220a398e").unwrap());
        let nonce = Nonce::new([0x00, 0x80, 0, 0, 1, 0x12, 0x01, 0, 0, 0x12, 0x34, 0x56, 0x78]);
        let mut payload = [0xff, 0xfd, 0x03, 0x4b, 0x50];
        let mic = cipher
            .ccm_encrypt(&nonce, b"", &mut payload, MicSize::Big)
            .unwrap();
        assert!(mic.is_big());
        cipher.ccm_decrypt(&nonce, b"", &mut payload, mic).unwrap();
        assert_eq!(payload, [0xff, 0xfd, 0x03, 0x4b, 0x50]);
    }
    #[test]
    fn test_ecb() {
        // FIPS-197 appendix C.1
        let cipher = AESCipher::new(Key::from_hex("000102030405060708090a0b0c0d0e0f").unwrap());
        let block = crate::crypto::hex_16_to_array("00112233445566778899aabbccddeeff").unwrap();
        assert_eq!(
            cipher.encrypt_block(block),
            crate::crypto::hex_16_to_array("69c4e0d86a7b0430d8cdb78070b4c55a").unwrap()
        );
    }
}
