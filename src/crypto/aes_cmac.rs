//! AES-128 CMAC (RFC 4493). Only the AES-128 instance is needed by the Mesh key derivation
//! functions so the cipher isn't generic.
use aes::block_cipher_trait::generic_array::{typenum::U16, GenericArray};
use aes::block_cipher_trait::BlockCipher;
use aes::Aes128;
use dbl::Dbl;

const BLOCK_LEN: usize = 16;
type Block = [u8; BLOCK_LEN];

/// Incremental CMAC context. Feed data with [`Cmac::input`] and finish with [`Cmac::result`].
#[derive(Clone)]
pub struct Cmac {
    cipher: Aes128,
    k1: Block,
    k2: Block,
    state: Block,
    pending: Block,
    pending_len: usize,
}

fn xor_block(into: &mut Block, other: &Block) {
    into.iter_mut().zip(other.iter()).for_each(|(a, b)| *a ^= *b);
}

impl Cmac {
    pub fn from_cipher(cipher: Aes128) -> Self {
        let mut l: GenericArray<u8, U16> = GenericArray::default();
        cipher.encrypt_block(&mut l);
        let k1_ga = l.dbl();
        let k2_ga = k1_ga.clone().dbl();
        let mut k1 = [0_u8; BLOCK_LEN];
        let mut k2 = [0_u8; BLOCK_LEN];
        k1.copy_from_slice(&k1_ga);
        k2.copy_from_slice(&k2_ga);
        Cmac {
            cipher,
            k1,
            k2,
            state: [0_u8; BLOCK_LEN],
            pending: [0_u8; BLOCK_LEN],
            pending_len: 0,
        }
    }
    fn encrypt_state(&mut self) {
        self.cipher
            .encrypt_block(GenericArray::from_mut_slice(&mut self.state));
    }
    /// Absorbs `data`. A full block is only chained once more data arrives because the final
    /// block is tweaked with a subkey.
    pub fn input(&mut self, data: &[u8]) {
        for &byte in data {
            if self.pending_len == BLOCK_LEN {
                let pending = self.pending;
                xor_block(&mut self.state, &pending);
                self.encrypt_state();
                self.pending_len = 0;
            }
            self.pending[self.pending_len] = byte;
            self.pending_len += 1;
        }
    }
    #[must_use]
    pub fn result(mut self) -> Block {
        let mut last = [0_u8; BLOCK_LEN];
        last[..self.pending_len].copy_from_slice(&self.pending[..self.pending_len]);
        if self.pending_len == BLOCK_LEN {
            xor_block(&mut last, &self.k1);
        } else {
            last[self.pending_len] = 0x80;
            xor_block(&mut last, &self.k2);
        }
        xor_block(&mut self.state, &last);
        self.encrypt_state();
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hex_16_to_array;

    fn cmac(key: &str, message: &[u8]) -> Block {
        let key = hex_16_to_array(key).unwrap();
        let mut cmac = Cmac::from_cipher(Aes128::new(GenericArray::from_slice(&key)));
        cmac.input(message);
        cmac.result()
    }

    // RFC 4493 section 4 examples.
    #[test]
    fn test_rfc4493_empty() {
        assert_eq!(
            cmac("2b7e151628aed2a6abf7158809cf4f3c", b""),
            hex_16_to_array("bb1d6929e95937287fa37d129b756746").unwrap()
        );
    }
    #[test]
    fn test_rfc4493_one_block() {
        let m = hex_16_to_array("6bc1bee22e409f96e93d7e117393172a").unwrap();
        assert_eq!(
            cmac("2b7e151628aed2a6abf7158809cf4f3c", &m),
            hex_16_to_array("070a16b46b4d4144f79bdd9dd04a287c").unwrap()
        );
    }
    #[test]
    fn test_split_input() {
        let key = hex_16_to_array("2b7e151628aed2a6abf7158809cf4f3c").unwrap();
        let m = hex_16_to_array("6bc1bee22e409f96e93d7e117393172a").unwrap();
        let mut split = Cmac::from_cipher(Aes128::new(GenericArray::from_slice(&key)));
        split.input(&m[..5]);
        split.input(&m[5..]);
        assert_eq!(split.result(), cmac("2b7e151628aed2a6abf7158809cf4f3c", &m));
    }
}
