//! Endian aware conversion between fixed size integers (and integer newtypes) and bytes.
//! Network, lower and upper transport fields are big endian. Access layer parameters are little
//! endian.

/// Conversion to and from a fixed size byte array in either endianness.
pub trait ToFromBytesEndian: Sized {
    type AsBytesType: AsRef<[u8]>;

    #[must_use]
    fn byte_size() -> usize {
        core::mem::size_of::<Self::AsBytesType>()
    }

    #[must_use]
    fn to_bytes_le(&self) -> Self::AsBytesType;

    #[must_use]
    fn to_bytes_be(&self) -> Self::AsBytesType;

    /// Returns `None` if `bytes.len() != Self::byte_size()`.
    #[must_use]
    fn from_bytes_le(bytes: &[u8]) -> Option<Self>;

    /// Returns `None` if `bytes.len() != Self::byte_size()`.
    #[must_use]
    fn from_bytes_be(bytes: &[u8]) -> Option<Self>;
}

macro_rules! implement_to_from_bytes {
    ( $( $t:ty ), *) => {
        $(
            impl ToFromBytesEndian for $t {
                type AsBytesType = [u8; core::mem::size_of::<$t>()];

                fn to_bytes_le(&self) -> Self::AsBytesType {
                    self.to_le_bytes()
                }

                fn to_bytes_be(&self) -> Self::AsBytesType {
                    self.to_be_bytes()
                }

                fn from_bytes_le(bytes: &[u8]) -> Option<Self> {
                    use core::convert::TryInto;
                    Some(<$t>::from_le_bytes(bytes.try_into().ok()?))
                }

                fn from_bytes_be(bytes: &[u8]) -> Option<Self> {
                    use core::convert::TryInto;
                    Some(<$t>::from_be_bytes(bytes.try_into().ok()?))
                }
            }
        )*
    };
}
implement_to_from_bytes!(u8, u16, u32, u64);

/// Writes `bytes` as lowercase hex. Used by `Display` impls and the cli.
pub fn hex_string(bytes: &[u8]) -> String {
    use core::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        // Writing to a `String` can't fail.
        let _ = write!(out, "{:02x}", b);
    }
    out
}

/// Parses an even length hex string into bytes. Returns `None` on odd length or non-hex characters.
pub fn hex_to_bytes(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    hex.as_bytes()
        .chunks(2)
        .map(|pair| {
            let high = char::from(pair[0]).to_digit(16)?;
            let low = char::from(pair[1]).to_digit(16)?;
            Some(((high << 4) | low) as u8)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endian() {
        assert_eq!(0x1201_u16.to_bytes_be(), [0x12, 0x01]);
        assert_eq!(0x1201_u16.to_bytes_le(), [0x01, 0x12]);
        assert_eq!(u32::from_bytes_be(&[0x12, 0x34, 0x56, 0x78]), Some(0x1234_5678));
        assert_eq!(u32::from_bytes_be(&[0x12, 0x34, 0x56]), None);
    }
    #[test]
    fn test_hex() {
        let bytes = hex_to_bytes("034b50057e400000010000").unwrap();
        assert_eq!(bytes.len(), 11);
        assert_eq!(hex_string(&bytes), "034b50057e400000010000");
        assert_eq!(hex_to_bytes("0"), None);
        assert_eq!(hex_to_bytes("zz"), None);
    }
}
