use crate::crypto::aes::AESCipher;
use crate::crypto::key::{AppKey, EncryptionKey, Key, PrivacyKey, ZERO_KEY};
use crate::crypto::{Salt, AID};
use crate::mesh::NID;

/// k1 function from Mesh Core v1.0. N==`key` and P==`extra`.
#[must_use]
pub fn k1(key: &Key, salt: Salt, extra: &[u8]) -> Key {
    let t = AESCipher::from(salt).cmac(key.as_ref());
    AESCipher::from(t).cmac(extra)
}
/// k2 network key material derivation. `p` is `0x00` for the managed flooding keys.
/// # Panics
/// Panics if `p` is empty.
#[must_use]
pub fn k2(key: &Key, p: impl AsRef<[u8]>) -> (NID, EncryptionKey, PrivacyKey) {
    let p = p.as_ref();
    assert!(!p.is_empty(), "p must have at least one byte");
    let t = AESCipher::from(s1("smk2")).cmac(key.as_ref());
    let cipher = AESCipher::from(t);
    let t_1 = cipher.cmac_slice(&[p, &[0x01]]);
    let t_2 = cipher.cmac_slice(&[t_1.as_ref(), p, &[0x02]]);
    let t_3 = cipher.cmac_slice(&[t_2.as_ref(), p, &[0x03]]);

    (
        NID::from_masked_u8(t_1.as_ref()[15]),
        EncryptionKey::new(t_2),
        PrivacyKey::new(t_3),
    )
}
/// k4 derives the 6-bit `AID` of an application key.
#[must_use]
pub fn k4(key: &AppKey) -> AID {
    let t = AESCipher::from(s1("smk4")).cmac(key.key().as_ref());
    AID::new_masked(AESCipher::from(t).cmac(b"id6\x01").as_ref()[15])
}
#[must_use]
pub fn s1(m: impl AsRef<[u8]>) -> Salt {
    AESCipher::new(ZERO_KEY).cmac(m.as_ref()).as_salt()
}
