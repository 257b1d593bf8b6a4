//! Finds the network key and IV index that authenticate a received network PDU.
//!
//! `NID` only narrows the candidates. Many keys can share a `NID` so a key is only accepted once
//! its `NetMIC` checks out.
use crate::address::UnicastAddress;
use crate::crypto::materials::NetKeyMap;
use crate::mesh::{IVIndex, IVIndexState, NetKeyIndex};
use crate::net::{EncryptedPDU, NetDecryptError, NetworkNonceKind, PDU};
use core::fmt::{Display, Formatter};

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct ResolvedPDU {
    pub pdu: PDU,
    pub net_key_index: NetKeyIndex,
    pub iv_index: IVIndex,
}
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum ResolveError {
    /// No known network key has the PDU's `NID`.
    NoMatchingNID,
    /// Every matching key deobfuscated to a source that isn't a known node.
    UnknownSource,
    /// Last error from the last candidate tried.
    Decrypt(NetDecryptError),
}
impl Display for ResolveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), core::fmt::Error> {
        match self {
            ResolveError::NoMatchingNID => f.write_str("no network key with matching NID"),
            ResolveError::UnknownSource => f.write_str("source isn't a known node"),
            ResolveError::Decrypt(e) => write!(f, "network decryption failed: {}", e),
        }
    }
}
/// Tries every `(IV index, network key)` candidate. IV index candidates are `accepted - 1` then
/// `accepted` (outer loop), keys are tried in ascending index order (inner loop). Candidates whose
/// deobfuscated source isn't accepted by `is_known_node` are skipped without decrypting.
pub fn resolve(
    encrypted: &EncryptedPDU,
    net_keys: &NetKeyMap,
    iv_state: IVIndexState,
    nonce_kind: NetworkNonceKind,
    mut is_known_node: impl FnMut(UnicastAddress) -> bool,
    logger: &slog::Logger,
) -> Result<ResolvedPDU, ResolveError> {
    let nid = encrypted.nid();
    let mut last_error = ResolveError::NoMatchingNID;
    for iv_index in iv_state.rx_candidates() {
        for (net_key_index, keys) in net_keys.matching_nid(nid) {
            let private_header = encrypted.deobfuscate(keys.privacy_key(), iv_index);
            match private_header.src_unicast() {
                Some(src) if is_known_node(src) => (),
                _ => {
                    slog::trace!(logger, "skip_unknown_src"; "src" => private_header.src, "net_key_index" => u16::from(net_key_index), "iv_index" => iv_index.0);
                    if last_error == ResolveError::NoMatchingNID {
                        last_error = ResolveError::UnknownSource;
                    }
                    continue;
                }
            }
            match encrypted.decrypt_with(&private_header, keys, iv_index, nonce_kind) {
                Ok(pdu) => {
                    slog::trace!(logger, "resolved"; "net_key_index" => u16::from(net_key_index), "iv_index" => iv_index.0);
                    return Ok(ResolvedPDU {
                        pdu,
                        net_key_index,
                        iv_index,
                    });
                }
                Err(e) => last_error = ResolveError::Decrypt(e),
            }
        }
    }
    Err(last_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::bytes::hex_to_bytes;
    use crate::crypto::key::NetKey;
    use crate::crypto::materials::NetworkKeys;
    use crate::lower::PDUBytes;
    use crate::mesh::{IVUpdateFlag, SequenceNumber, CTL, IVI, NID, TTL};
    use crate::net::Header;
    use core::convert::TryFrom;
    use slog::o;

    const MESSAGE_1: &str = "68eca487516765b5e5bfdacbaf6cb7fb6bff871f035444ce83a670df";

    fn logger() -> slog::Logger {
        slog::Logger::root(slog::Discard, o!())
    }
    fn sample_net_key() -> NetKey {
        NetKey::from_hex("7dd7364cd842ad18c17c2b820c84c3d6").unwrap()
    }
    /// A different key that happens to share the sample key's NID (0x68).
    fn colliding_net_key() -> NetKey {
        (0_u16..)
            .map(|i| {
                let mut bytes = [0x55_u8; 16];
                bytes[..2].copy_from_slice(&i.to_be_bytes());
                NetKey::new_bytes(bytes)
            })
            .find(|k| NetworkKeys::from(k).nid() == NID::new(0x68) && *k != sample_net_key())
            .unwrap()
    }
    fn message_1() -> EncryptedPDU {
        EncryptedPDU::new(&hex_to_bytes(MESSAGE_1).unwrap()).unwrap()
    }
    fn accepted(index: u32) -> IVIndexState {
        IVIndexState::new(IVIndex(index), IVUpdateFlag(false))
    }

    #[test]
    fn test_resolves_regardless_of_position() {
        for sample_index in 0..3_u16 {
            let mut keys = NetKeyMap::new();
            let mut other = 0;
            for index in 0..3_u16 {
                if index == sample_index {
                    keys.insert(NetKeyIndex::new(index), &sample_net_key());
                } else {
                    let key = if other == 0 {
                        colliding_net_key()
                    } else {
                        NetKey::new_bytes([index as u8; 16])
                    };
                    other += 1;
                    keys.insert(NetKeyIndex::new(index), &key);
                }
            }
            let resolved = resolve(
                &message_1(),
                &keys,
                accepted(0x1234_5678),
                NetworkNonceKind::Network,
                |_| true,
                &logger(),
            )
            .unwrap();
            assert_eq!(resolved.net_key_index, NetKeyIndex::new(sample_index));
            assert_eq!(resolved.iv_index, IVIndex(0x1234_5678));
            assert_eq!(resolved.pdu.header.src, UnicastAddress::new(0x1201));
        }
    }
    #[test]
    fn test_matching_nid_wrong_key_fails() {
        let mut keys = NetKeyMap::new();
        keys.insert(NetKeyIndex::new(0), &colliding_net_key());
        let result = resolve(
            &message_1(),
            &keys,
            accepted(0x1234_5678),
            NetworkNonceKind::Network,
            |_| true,
            &logger(),
        );
        match result {
            Err(ResolveError::Decrypt(_)) | Err(ResolveError::UnknownSource) => (),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            resolve(
                &message_1(),
                &NetKeyMap::new(),
                accepted(0x1234_5678),
                NetworkNonceKind::Network,
                |_| true,
                &logger(),
            ),
            Err(ResolveError::NoMatchingNID)
        );
    }
    #[test]
    fn test_previous_iv_index_accepted() {
        let mut keys = NetKeyMap::new();
        keys.insert(NetKeyIndex::new(0), &sample_net_key());
        let resolved = resolve(
            &message_1(),
            &keys,
            accepted(0x1234_5679),
            NetworkNonceKind::Network,
            |_| true,
            &logger(),
        )
        .unwrap();
        assert_eq!(resolved.iv_index, IVIndex(0x1234_5678));
        assert!(resolve(
            &message_1(),
            &keys,
            accepted(0x1234_567A),
            NetworkNonceKind::Network,
            |_| true,
            &logger(),
        )
        .is_err());
    }
    #[test]
    fn test_unknown_source_skipped() {
        let mut keys = NetKeyMap::new();
        keys.insert(NetKeyIndex::new(0), &sample_net_key());
        let mut checked = 0;
        assert_eq!(
            resolve(
                &message_1(),
                &keys,
                accepted(0x1234_5678),
                NetworkNonceKind::Network,
                |_| {
                    checked += 1;
                    false
                },
                &logger(),
            ),
            Err(ResolveError::UnknownSource)
        );
        assert!(checked <= 2);
    }
    #[test]
    fn test_known_source_wrong_iv_index_fails_mic() {
        let mut keys = NetKeyMap::new();
        keys.insert(NetKeyIndex::new(0), &sample_net_key());
        // Deobfuscating with `accepted - 1` yields some other unicast source.
        let stale_src = message_1()
            .deobfuscate(
                NetworkKeys::from(&sample_net_key()).privacy_key(),
                IVIndex(0x1234_5677),
            )
            .src_unicast();
        assert!(stale_src.is_some());
        assert_ne!(stale_src, Some(UnicastAddress::new(0x1201)));
        // That candidate is decrypted and fails, the real source under `accepted` is skipped.
        match resolve(
            &message_1(),
            &keys,
            accepted(0x1234_5678),
            NetworkNonceKind::Network,
            |src| src != UnicastAddress::new(0x1201),
            &logger(),
        ) {
            Err(ResolveError::Decrypt(_)) => (),
            other => panic!("unexpected {:?}", other),
        }
    }
    #[test]
    fn test_proxy_nonce() {
        let mut keys = NetKeyMap::new();
        keys.insert(NetKeyIndex::new(7), &sample_net_key());
        let pdu = PDU::new(
            Header {
                ivi: IVI(false),
                nid: NID::new(0),
                ctl: CTL(true),
                ttl: TTL::new(0),
                seq: SequenceNumber::new(5),
                src: UnicastAddress::new(0x0002),
                dst: Address::Unassigned,
            },
            PDUBytes::try_from(&[0x03_u8, 0x00, 0x00, 0x01][..]).unwrap(),
        );
        let iv = IVIndex(3);
        let encrypted = pdu
            .encrypt(&NetworkKeys::from(&sample_net_key()), iv, NetworkNonceKind::Proxy)
            .unwrap();
        let resolved = resolve(
            &encrypted,
            &keys,
            accepted(3),
            NetworkNonceKind::Proxy,
            |_| true,
            &logger(),
        )
        .unwrap();
        assert_eq!(resolved.net_key_index, NetKeyIndex::new(7));
        assert_eq!(resolved.pdu.payload.as_ref(), &[0x03, 0x00, 0x00, 0x01]);
        assert!(resolve(
            &encrypted,
            &keys,
            accepted(3),
            NetworkNonceKind::Network,
            |_| true,
            &logger(),
        )
        .is_err());
    }
}
