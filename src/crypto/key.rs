//! Crypto Keys uses for Mesh Security.
use crate::bytes::hex_string;
use crate::crypto::{hex_16_to_array, Salt, AID, AKF};
use crate::random::Randomizable;
use core::convert::{TryFrom, TryInto};
use core::fmt::{Display, Error, Formatter};
use core::str::FromStr;

pub const KEY_LEN: usize = 16;

/// 128-bit AES Key.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialOrd, PartialEq, Ord)]
pub struct Key([u8; KEY_LEN]);
pub const ZERO_KEY: Key = Key([0_u8; KEY_LEN]);

impl Key {
    #[must_use]
    pub const fn new(key_bytes: [u8; KEY_LEN]) -> Key {
        Key(key_bytes)
    }
    #[must_use]
    pub fn from_hex(hex: &str) -> Option<Key> {
        Some(Key::new(hex_16_to_array(hex)?))
    }
    #[must_use]
    pub fn as_salt(&self) -> Salt {
        Salt::new(self.0)
    }
}
impl Randomizable for Key {
    fn random_secure() -> Self {
        Self::new(crate::random::rand_16_bytes())
    }
}
impl TryFrom<&[u8]> for Key {
    type Error = core::array::TryFromSliceError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        Ok(Key::new(value.try_into()?))
    }
}

impl AsRef<[u8]> for Key {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        f.write_str(&hex_string(&self.0))
    }
}
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub struct KeyError(());
impl FromStr for Key {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Key::from_hex(s).ok_or(KeyError(()))
    }
}
#[cfg(feature = "serde-1")]
impl serde::Serialize for Key {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex_string(&self.0))
    }
}
#[cfg(feature = "serde-1")]
impl<'de> serde::Deserialize<'de> for Key {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = <String as serde::Deserialize>::deserialize(deserializer)?;
        Key::from_hex(&hex).ok_or_else(|| serde::de::Error::custom("expected 32 hex characters"))
    }
}

/// Declares a newtype around `Key` with the shared constructors.
macro_rules! key_newtype {
    ( $( $(#[$meta:meta])* $name:ident ),* ) => {
        $(
            $(#[$meta])*
            #[derive(Clone, Copy, Debug, Hash, Eq, PartialOrd, PartialEq, Ord)]
            #[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
            pub struct $name(Key);

            impl $name {
                #[must_use]
                pub const fn new(key: Key) -> Self {
                    Self(key)
                }
                #[must_use]
                pub const fn new_bytes(key_bytes: [u8; KEY_LEN]) -> Self {
                    Self(Key::new(key_bytes))
                }
                #[must_use]
                pub fn from_hex(hex: &str) -> Option<Self> {
                    Some(Self::new_bytes(hex_16_to_array(hex)?))
                }
                #[must_use]
                pub const fn key(&self) -> &Key {
                    &self.0
                }
            }
            impl From<Key> for $name {
                fn from(k: Key) -> Self {
                    Self(k)
                }
            }
            impl From<$name> for Key {
                fn from(k: $name) -> Self {
                    k.0
                }
            }
            impl AsRef<Key> for $name {
                fn as_ref(&self) -> &Key {
                    &self.0
                }
            }
            impl Randomizable for $name {
                fn random_secure() -> Self {
                    Self(Key::random_secure())
                }
            }
            impl Display for $name {
                fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
                    write!(f, "{}({})", stringify!($name), self.0)
                }
            }
        )*
    };
}
key_newtype!(
    /// Network key. Everything used at the network layer (`NID`, `EncryptionKey`, `PrivacyKey`)
    /// is derived from it with `k2`.
    NetKey,
    /// Network layer AES-CCM key.
    EncryptionKey,
    /// Key for the header obfuscation PECB.
    PrivacyKey,
    /// Per node device key. Only used for configuration messages (`AKF == 0`).
    DevKey,
    /// Application key (`AKF == 1`).
    AppKey
);

impl DevKey {
    #[must_use]
    pub const fn akf() -> AKF {
        AKF(false)
    }
}
impl AppKey {
    #[must_use]
    pub fn aid(&self) -> AID {
        super::k4(self)
    }
    #[must_use]
    pub const fn akf() -> AKF {
        AKF(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_display() {
        let key: Key = "7dd7364cd842ad18c17c2b820c84c3d6".parse().unwrap();
        assert_eq!(key.to_string(), "7dd7364cd842ad18c17c2b820c84c3d6");
        assert!("7dd7364cd842ad18".parse::<Key>().is_err());
        assert_eq!(NetKey::new(key).key(), &key);
    }
    #[test]
    fn test_random_keys_differ() {
        let a = AppKey::random_secure();
        let b = AppKey::random_secure();
        assert_ne!(a, b);
        assert_eq!(AppKey::from_hex(&a.key().to_string()), Some(a));
    }
}
