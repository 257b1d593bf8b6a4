//! Collection of security materials (Keys, NID, AID, etc) used for encryption and decryption.
use crate::crypto::key::{AppKey, EncryptionKey, NetKey, PrivacyKey};
use crate::crypto::{k2, KeyRefreshPhases, AID};
use crate::mesh::{AppKeyIndex, NetKeyIndex, NID};
use std::collections::btree_map;

/// Network layer keys derived from a `NetKey` with `k2(key, 0x00)`.
#[derive(Ord, PartialOrd, Eq, PartialEq, Copy, Clone, Hash, Debug)]
pub struct NetworkKeys {
    nid: NID,
    encryption: EncryptionKey,
    privacy: PrivacyKey,
}

impl NetworkKeys {
    #[must_use]
    pub fn new(nid: NID, encryption: EncryptionKey, privacy: PrivacyKey) -> Self {
        Self {
            nid,
            encryption,
            privacy,
        }
    }
    #[must_use]
    pub fn nid(&self) -> NID {
        self.nid
    }
    #[must_use]
    pub fn encryption_key(&self) -> &EncryptionKey {
        &self.encryption
    }
    #[must_use]
    pub fn privacy_key(&self) -> &PrivacyKey {
        &self.privacy
    }
}
impl From<&NetKey> for NetworkKeys {
    fn from(k: &NetKey) -> Self {
        let (nid, encryption, privacy) = k2(k.key(), b"\x00");
        Self::new(nid, encryption, privacy)
    }
}
#[derive(Ord, PartialOrd, Eq, PartialEq, Copy, Clone, Hash, Debug)]
pub struct NetworkSecurityMaterials {
    net_key: NetKey,
    network_keys: NetworkKeys,
}
impl NetworkSecurityMaterials {
    #[must_use]
    pub fn net_key(&self) -> &NetKey {
        &self.net_key
    }
    #[must_use]
    pub fn network_keys(&self) -> &NetworkKeys {
        &self.network_keys
    }
}
impl From<&NetKey> for NetworkSecurityMaterials {
    fn from(k: &NetKey) -> Self {
        Self {
            net_key: *k,
            network_keys: k.into(),
        }
    }
}
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct KeyPair<K: Clone + Copy + Eq + PartialEq> {
    pub new: K,
    pub old: K,
}
/// Key refresh procedure state of one key index.
///
/// | Phase  | Transmit | Receive     |
/// | ------ | -------- | ----------- |
/// | Normal | key      | key         |
/// | Phase1 | old      | new and old |
/// | Phase2 | new      | new and old |
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum KeyPhase<K: Clone + Copy + Eq + PartialEq> {
    Normal(K),
    Phase1(KeyPair<K>),
    Phase2(KeyPair<K>),
}
impl<K: Clone + Copy + Eq> KeyPhase<K> {
    #[must_use]
    pub fn phase(&self) -> KeyRefreshPhases {
        match self {
            KeyPhase::Normal(_) => KeyRefreshPhases::Normal,
            KeyPhase::Phase1(_) => KeyRefreshPhases::First,
            KeyPhase::Phase2(_) => KeyRefreshPhases::Second,
        }
    }
    #[must_use]
    pub fn tx_key(&self) -> &K {
        match self {
            KeyPhase::Normal(k) => k,
            KeyPhase::Phase1(p) => &p.old,
            KeyPhase::Phase2(p) => &p.new,
        }
    }
    /// The newest key of the index.
    #[must_use]
    pub fn current(&self) -> &K {
        match self {
            KeyPhase::Normal(k) => k,
            KeyPhase::Phase1(p) | KeyPhase::Phase2(p) => &p.new,
        }
    }
    /// The key being replaced. Only present while a key refresh is in progress.
    #[must_use]
    pub fn old(&self) -> Option<&K> {
        match self {
            KeyPhase::Normal(_) => None,
            KeyPhase::Phase1(p) | KeyPhase::Phase2(p) => Some(&p.old),
        }
    }
    /// Starts a key refresh with `new`. Already refreshing keys keep their old key.
    #[must_use]
    pub fn refresh(&self, new: K) -> KeyPhase<K> {
        let old = match self {
            KeyPhase::Normal(k) => *k,
            KeyPhase::Phase1(p) | KeyPhase::Phase2(p) => p.old,
        };
        KeyPhase::Phase1(KeyPair { new, old })
    }
    /// Advances Phase1 → Phase2 → Normal(new).
    #[must_use]
    pub fn advance(&self) -> KeyPhase<K> {
        match self {
            KeyPhase::Normal(k) => KeyPhase::Normal(*k),
            KeyPhase::Phase1(p) => KeyPhase::Phase2(*p),
            KeyPhase::Phase2(p) => KeyPhase::Normal(p.new),
        }
    }
}

/// Network keys by index. Cloned wholesale when modified (copy-on-write in the directory).
#[derive(Clone, Debug, Default)]
pub struct NetKeyMap {
    map: btree_map::BTreeMap<NetKeyIndex, KeyPhase<NetworkSecurityMaterials>>,
}
impl NetKeyMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    pub fn insert(&mut self, index: NetKeyIndex, key: &NetKey) {
        self.map
            .insert(index, KeyPhase::Normal(NetworkSecurityMaterials::from(key)));
    }
    /// Yields, in ascending key index order, the derivative of every key whose `NID` matches.
    /// The current derivative wins over the old one. Because `NID` is a 7-bit value, one `NID` can
    /// match multiple different networks. Only attempting to decrypt the Network PDU will tell you
    /// if the `NID` and `NetworkKeys` match.
    pub fn matching_nid(
        &self,
        nid_to_match: NID,
    ) -> impl Iterator<Item = (NetKeyIndex, &'_ NetworkKeys)> {
        self.map.iter().filter_map(move |(&index, phase)| {
            let current = phase.current().network_keys();
            if current.nid() == nid_to_match {
                Some((index, current))
            } else {
                phase
                    .old()
                    .map(NetworkSecurityMaterials::network_keys)
                    .filter(|old| old.nid() == nid_to_match)
                    .map(|old| (index, old))
            }
        })
    }
    #[must_use]
    pub fn get_keys(&self, index: NetKeyIndex) -> Option<&KeyPhase<NetworkSecurityMaterials>> {
        self.map.get(&index)
    }
    pub fn get_keys_mut(
        &mut self,
        index: NetKeyIndex,
    ) -> Option<&mut KeyPhase<NetworkSecurityMaterials>> {
        self.map.get_mut(&index)
    }
    pub fn remove_keys(
        &mut self,
        index: NetKeyIndex,
    ) -> Option<KeyPhase<NetworkSecurityMaterials>> {
        self.map.remove(&index)
    }
    pub fn iter(&self) -> impl Iterator<Item = (NetKeyIndex, &'_ KeyPhase<NetworkSecurityMaterials>)> {
        self.map.iter().map(|(&index, phase)| (index, phase))
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct ApplicationSecurityMaterials {
    pub app_key: AppKey,
    pub aid: AID,
    pub net_key_index: NetKeyIndex,
}
impl ApplicationSecurityMaterials {
    #[must_use]
    pub fn new(app_key: AppKey, net_key_index: NetKeyIndex) -> Self {
        Self {
            app_key,
            aid: app_key.aid(),
            net_key_index,
        }
    }
}
#[derive(Clone, Debug, Default)]
pub struct AppKeyMap {
    map: btree_map::BTreeMap<AppKeyIndex, ApplicationSecurityMaterials>,
}
impl AppKeyMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    pub fn insert(&mut self, index: AppKeyIndex, materials: ApplicationSecurityMaterials) {
        self.map.insert(index, materials);
    }
    #[must_use]
    pub fn get_key(&self, index: AppKeyIndex) -> Option<&ApplicationSecurityMaterials> {
        self.map.get(&index)
    }
    pub fn remove_key(&mut self, index: AppKeyIndex) -> Option<ApplicationSecurityMaterials> {
        self.map.remove(&index)
    }
    /// Application keys bound to `net_key_index` with a matching `AID`, ascending by index.
    pub fn matching_aid(
        &self,
        net_key_index: NetKeyIndex,
        aid: AID,
    ) -> impl Iterator<Item = (AppKeyIndex, &'_ ApplicationSecurityMaterials)> {
        self.bound_to(net_key_index)
            .filter(move |(_, materials)| materials.aid == aid)
    }
    pub fn iter(&self) -> impl Iterator<Item = (AppKeyIndex, &'_ ApplicationSecurityMaterials)> {
        self.map.iter().map(|(&index, materials)| (index, materials))
    }
    pub fn bound_to(
        &self,
        net_key_index: NetKeyIndex,
    ) -> impl Iterator<Item = (AppKeyIndex, &'_ ApplicationSecurityMaterials)> {
        self.map
            .iter()
            .filter(move |(_, materials)| materials.net_key_index == net_key_index)
            .map(|(&index, materials)| (index, materials))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_net_key() -> NetKey {
        NetKey::from_hex("7dd7364cd842ad18c17c2b820c84c3d6").unwrap()
    }

    #[test]
    fn test_sample_network_keys() {
        let keys = NetworkKeys::from(&sample_net_key());
        assert_eq!(keys.nid(), NID::new(0x68));
        assert_eq!(
            keys.encryption_key(),
            &EncryptionKey::from_hex("0953fa93e7caac9638f58820220a398e").unwrap()
        );
        assert_eq!(
            keys.privacy_key(),
            &PrivacyKey::from_hex("8b84eedec100067d670971dd2aa700cf").unwrap()
        );
    }
    #[test]
    fn test_matching_nid_prefers_current() {
        let old = sample_net_key();
        let new = NetKey::from_hex("f7a2a44f8e8a8029064f173ddc1e2b00").unwrap();
        let mut map = NetKeyMap::new();
        map.insert(NetKeyIndex::new(1), &old);
        let refreshed = map
            .get_keys(NetKeyIndex::new(1))
            .unwrap()
            .refresh(NetworkSecurityMaterials::from(&new));
        *map.get_keys_mut(NetKeyIndex::new(1)).unwrap() = refreshed;

        let old_nid = NetworkKeys::from(&old).nid();
        let new_nid = NetworkKeys::from(&new).nid();
        let by_old: Vec<_> = map.matching_nid(old_nid).collect();
        assert_eq!(by_old.len(), 1);
        assert_eq!(by_old[0].1, &NetworkKeys::from(&old));
        let by_new: Vec<_> = map.matching_nid(new_nid).collect();
        assert_eq!(by_new[0].1, &NetworkKeys::from(&new));
        assert_eq!(refreshed.tx_key().net_key(), &old);
        assert_eq!(refreshed.advance().tx_key().net_key(), &new);
        assert_eq!(refreshed.advance().advance(), KeyPhase::Normal(NetworkSecurityMaterials::from(&new)));
    }
    #[test]
    fn test_matching_aid() {
        let app_key = AppKey::from_hex("63964771734fbd76e3b40519d1d94a48").unwrap();
        let mut map = AppKeyMap::new();
        map.insert(
            AppKeyIndex::new(0x456),
            ApplicationSecurityMaterials::new(app_key, NetKeyIndex::new(0)),
        );
        assert_eq!(map.matching_aid(NetKeyIndex::new(0), AID::new(0x26)).count(), 1);
        assert_eq!(map.matching_aid(NetKeyIndex::new(1), AID::new(0x26)).count(), 0);
        assert_eq!(map.matching_aid(NetKeyIndex::new(0), AID::new(0x25)).count(), 0);
    }
}
