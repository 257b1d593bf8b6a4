//! Node and key directory the stack consults for every PDU.
//!
//! Tables are read far more often than they change, so `MeshNetwork` keeps them behind a
//! `RwLock<Arc<_>>` and clones on write. A decrypt in progress keeps using the snapshot it
//! started with.
use crate::access::Opcode;
use crate::address::UnicastAddress;
use crate::crypto::key::{AppKey, DevKey, NetKey};
use crate::crypto::materials::{
    AppKeyMap, ApplicationSecurityMaterials, NetKeyMap, NetworkSecurityMaterials,
};
use crate::crypto::KeyRefreshPhases;
use crate::mesh::{AppKeyIndex, IVIndex, IVIndexState, IVUpdateFlag, NetKeyIndex};
use crate::stack::messages::AccessMessage;
use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt::{Display, Formatter};
use std::sync::{PoisonError, RwLock};

/// A provisioned node: its primary address, how many elements (consecutive addresses) it has
/// and its device key.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeInfo {
    pub address: UnicastAddress,
    pub element_count: u8,
    pub dev_key: DevKey,
}
impl NodeInfo {
    #[must_use]
    pub fn new(address: UnicastAddress, element_count: u8, dev_key: DevKey) -> Self {
        Self {
            address,
            element_count,
            dev_key,
        }
    }
    /// Whether `address` is one of the node's element addresses.
    #[must_use]
    pub fn contains(&self, address: UnicastAddress) -> bool {
        let first = u32::from(self.address.value());
        let value = u32::from(address.value());
        value >= first && value < first + u32::from(self.element_count.max(1))
    }
}
/// What the stack needs to know about the network.
pub trait NodeDirectory {
    /// Node owning the element `address`.
    fn node(&self, address: UnicastAddress) -> Option<NodeInfo>;
    fn net_keys(&self) -> Arc<NetKeyMap>;
    fn iv_index(&self) -> IVIndexState;
    /// Application keys bound to `net_key_index`, ascending by index.
    fn app_keys(&self, net_key_index: NetKeyIndex)
        -> Vec<(AppKeyIndex, ApplicationSecurityMaterials)>;
    fn app_key(&self, index: AppKeyIndex) -> Option<ApplicationSecurityMaterials>;
    /// Called with every access message received from a source the proxy filter lets through.
    fn update_node_cache(&self, _node: UnicastAddress, _message: &AccessMessage) {}
}
impl<D: NodeDirectory + ?Sized> NodeDirectory for Arc<D> {
    fn node(&self, address: UnicastAddress) -> Option<NodeInfo> {
        (**self).node(address)
    }

    fn net_keys(&self) -> Arc<NetKeyMap> {
        (**self).net_keys()
    }

    fn iv_index(&self) -> IVIndexState {
        (**self).iv_index()
    }

    fn app_keys(
        &self,
        net_key_index: NetKeyIndex,
    ) -> Vec<(AppKeyIndex, ApplicationSecurityMaterials)> {
        (**self).app_keys(net_key_index)
    }

    fn app_key(&self, index: AppKeyIndex) -> Option<ApplicationSecurityMaterials> {
        (**self).app_key(index)
    }

    fn update_node_cache(&self, node: UnicastAddress, message: &AccessMessage) {
        (**self).update_node_cache(node, message)
    }
}
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub enum DirectoryError {
    UnknownNetKeyIndex(NetKeyIndex),
    UnknownAppKeyIndex(AppKeyIndex),
    /// Key refresh step requested for a key that isn't being refreshed.
    NotRefreshing(NetKeyIndex),
    IVUpdateInProgress,
    NoIVUpdate,
    IVIndexExhausted,
    /// Stored key refresh phase isn't 0, 1 or 2.
    BadKeyPhase(u8),
}
impl Display for DirectoryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), core::fmt::Error> {
        match self {
            DirectoryError::UnknownNetKeyIndex(i) => write!(f, "unknown {}", i),
            DirectoryError::UnknownAppKeyIndex(i) => write!(f, "unknown {}", i),
            DirectoryError::NotRefreshing(i) => write!(f, "{} isn't being refreshed", i),
            DirectoryError::IVUpdateInProgress => f.write_str("IV update already in progress"),
            DirectoryError::NoIVUpdate => f.write_str("no IV update in progress"),
            DirectoryError::IVIndexExhausted => f.write_str("IV index exhausted"),
            DirectoryError::BadKeyPhase(p) => write!(f, "bad key refresh phase {}", p),
        }
    }
}
/// Snapshot of every table. Cloned when written to.
#[derive(Clone, Debug, Default)]
pub struct NetworkTables {
    pub net_keys: Arc<NetKeyMap>,
    pub app_keys: AppKeyMap,
    pub nodes: BTreeMap<UnicastAddress, NodeInfo>,
    pub iv_index: IVIndexState,
}
impl NetworkTables {
    #[must_use]
    pub fn node(&self, address: UnicastAddress) -> Option<NodeInfo> {
        self.nodes
            .range(..=address)
            .next_back()
            .map(|(_, node)| *node)
            .filter(|node| node.contains(address))
    }
}
/// In-memory `NodeDirectory` with key refresh, IV update and the per-node status cache.
#[derive(Debug, Default)]
pub struct MeshNetwork {
    tables: RwLock<Arc<NetworkTables>>,
    node_cache: RwLock<BTreeMap<UnicastAddress, Opcode>>,
}
impl MeshNetwork {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    /// Current snapshot of the tables.
    #[must_use]
    pub fn tables(&self) -> Arc<NetworkTables> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
    fn modify<R>(&self, f: impl FnOnce(&mut NetworkTables) -> R) -> R {
        let mut guard = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        f(Arc::make_mut(&mut *guard))
    }
    pub fn add_net_key(&self, index: NetKeyIndex, key: &NetKey) {
        self.modify(|t| Arc::make_mut(&mut t.net_keys).insert(index, key))
    }
    pub fn remove_net_key(&self, index: NetKeyIndex) -> Result<(), DirectoryError> {
        self.modify(|t| {
            Arc::make_mut(&mut t.net_keys)
                .remove_keys(index)
                .map(|_| ())
                .ok_or(DirectoryError::UnknownNetKeyIndex(index))
        })
    }
    /// Starts a key refresh (Phase 1): `new_key` is accepted on receive, the old key is still used
    /// to transmit.
    pub fn refresh_net_key(
        &self,
        index: NetKeyIndex,
        new_key: &NetKey,
    ) -> Result<(), DirectoryError> {
        self.modify(|t| {
            let phase = Arc::make_mut(&mut t.net_keys)
                .get_keys_mut(index)
                .ok_or(DirectoryError::UnknownNetKeyIndex(index))?;
            *phase = phase.refresh(NetworkSecurityMaterials::from(new_key));
            Ok(())
        })
    }
    /// Phase 1 → Phase 2 → Normal. Returns the new phase.
    pub fn advance_key_refresh(
        &self,
        index: NetKeyIndex,
    ) -> Result<KeyRefreshPhases, DirectoryError> {
        self.modify(|t| {
            let phase = Arc::make_mut(&mut t.net_keys)
                .get_keys_mut(index)
                .ok_or(DirectoryError::UnknownNetKeyIndex(index))?;
            if phase.phase() == KeyRefreshPhases::Normal {
                return Err(DirectoryError::NotRefreshing(index));
            }
            *phase = phase.advance();
            Ok(phase.phase())
        })
    }
    /// Binds `key` to `net_key_index`. The network key has to exist.
    pub fn add_app_key(
        &self,
        index: AppKeyIndex,
        key: AppKey,
        net_key_index: NetKeyIndex,
    ) -> Result<(), DirectoryError> {
        self.modify(|t| {
            if t.net_keys.get_keys(net_key_index).is_none() {
                return Err(DirectoryError::UnknownNetKeyIndex(net_key_index));
            }
            t.app_keys
                .insert(index, ApplicationSecurityMaterials::new(key, net_key_index));
            Ok(())
        })
    }
    pub fn remove_app_key(&self, index: AppKeyIndex) -> Result<(), DirectoryError> {
        self.modify(|t| {
            t.app_keys
                .remove_key(index)
                .map(|_| ())
                .ok_or(DirectoryError::UnknownAppKeyIndex(index))
        })
    }
    pub fn add_node(&self, node: NodeInfo) {
        self.modify(|t| t.nodes.insert(node.address, node));
    }
    pub fn remove_node(&self, address: UnicastAddress) -> Option<NodeInfo> {
        let removed = self.modify(|t| t.nodes.remove(&address));
        self.node_cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&address);
        removed
    }
    pub fn set_iv_index(&self, state: IVIndexState) {
        self.modify(|t| t.iv_index = state);
    }
    /// Moves to `index + 1` in the "update in progress" state. Transmission keeps using the old
    /// index until `finish_iv_update`.
    pub fn begin_iv_update(&self) -> Result<IVIndexState, DirectoryError> {
        self.modify(|t| {
            if t.iv_index.update.0 {
                return Err(DirectoryError::IVUpdateInProgress);
            }
            let next = t
                .iv_index
                .index
                .0
                .checked_add(1)
                .ok_or(DirectoryError::IVIndexExhausted)?;
            t.iv_index = IVIndexState::new(IVIndex(next), IVUpdateFlag(true));
            Ok(t.iv_index)
        })
    }
    pub fn finish_iv_update(&self) -> Result<IVIndexState, DirectoryError> {
        self.modify(|t| {
            if !t.iv_index.update.0 {
                return Err(DirectoryError::NoIVUpdate);
            }
            t.iv_index.update = IVUpdateFlag(false);
            Ok(t.iv_index)
        })
    }
    /// Opcode of the last trusted status message received from `node`.
    #[must_use]
    pub fn cached_status(&self, node: UnicastAddress) -> Option<Opcode> {
        self.node_cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&node)
            .copied()
    }
    pub fn from_state(state: &NetworkState) -> Result<Self, DirectoryError> {
        let network = Self::new();
        network.set_iv_index(state.iv_index);
        for entry in &state.net_keys {
            match (entry.phase, entry.old_key) {
                (0, _) => network.add_net_key(entry.index, &entry.key),
                (1, Some(old)) | (2, Some(old)) => {
                    network.add_net_key(entry.index, &old);
                    network.refresh_net_key(entry.index, &entry.key)?;
                    if entry.phase == 2 {
                        network.advance_key_refresh(entry.index)?;
                    }
                }
                (p, _) => return Err(DirectoryError::BadKeyPhase(p)),
            }
        }
        for entry in &state.app_keys {
            network.add_app_key(entry.index, entry.key, entry.net_key_index)?;
        }
        for node in &state.nodes {
            network.add_node(*node);
        }
        Ok(network)
    }
    /// Serializable description of the tables. `seq` is the next sequence number to use.
    #[must_use]
    pub fn to_state(&self, seq: u32) -> NetworkState {
        let tables = self.tables();
        NetworkState {
            iv_index: tables.iv_index,
            seq,
            net_keys: tables
                .net_keys
                .iter()
                .map(|(index, phase)| NetKeyEntry {
                    index,
                    key: *phase.current().net_key(),
                    old_key: phase.old().map(|old| *old.net_key()),
                    phase: phase.phase() as u8,
                })
                .collect(),
            app_keys: tables
                .app_keys
                .iter()
                .map(|(index, materials)| AppKeyEntry {
                    index,
                    net_key_index: materials.net_key_index,
                    key: materials.app_key,
                })
                .collect(),
            nodes: tables.nodes.values().copied().collect(),
        }
    }
}
impl NodeDirectory for MeshNetwork {
    fn node(&self, address: UnicastAddress) -> Option<NodeInfo> {
        self.tables().node(address)
    }

    fn net_keys(&self) -> Arc<NetKeyMap> {
        self.tables().net_keys.clone()
    }

    fn iv_index(&self) -> IVIndexState {
        self.tables().iv_index
    }

    fn app_keys(
        &self,
        net_key_index: NetKeyIndex,
    ) -> Vec<(AppKeyIndex, ApplicationSecurityMaterials)> {
        self.tables()
            .app_keys
            .bound_to(net_key_index)
            .map(|(index, materials)| (index, *materials))
            .collect()
    }

    fn app_key(&self, index: AppKeyIndex) -> Option<ApplicationSecurityMaterials> {
        self.tables().app_keys.get_key(index).copied()
    }

    fn update_node_cache(&self, node: UnicastAddress, message: &AccessMessage) {
        self.node_cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(node, message.opcode());
    }
}
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct NetKeyEntry {
    pub index: NetKeyIndex,
    /// Newest key.
    pub key: NetKey,
    /// Key being replaced while `phase` is 1 or 2.
    #[cfg_attr(feature = "serde-1", serde(default))]
    pub old_key: Option<NetKey>,
    #[cfg_attr(feature = "serde-1", serde(default))]
    pub phase: u8,
}
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct AppKeyEntry {
    pub index: AppKeyIndex,
    pub net_key_index: NetKeyIndex,
    pub key: AppKey,
}
/// Everything needed to rebuild a `MeshNetwork` and resume sending.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct NetworkState {
    #[cfg_attr(feature = "serde-1", serde(default))]
    pub iv_index: IVIndexState,
    /// Next sequence number.
    #[cfg_attr(feature = "serde-1", serde(default))]
    pub seq: u32,
    #[cfg_attr(feature = "serde-1", serde(default))]
    pub net_keys: Vec<NetKeyEntry>,
    #[cfg_attr(feature = "serde-1", serde(default))]
    pub app_keys: Vec<AppKeyEntry>,
    #[cfg_attr(feature = "serde-1", serde(default))]
    pub nodes: Vec<NodeInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net_key(b: u8) -> NetKey {
        NetKey::new_bytes([b; 16])
    }
    fn node(address: u16, count: u8) -> NodeInfo {
        NodeInfo::new(UnicastAddress::new(address), count, DevKey::new_bytes([address as u8; 16]))
    }

    #[test]
    fn test_node_lookup_by_element() {
        let network = MeshNetwork::new();
        network.add_node(node(0x0010, 3));
        network.add_node(node(0x0020, 1));
        assert_eq!(
            network.node(UnicastAddress::new(0x0012)).map(|n| n.address),
            Some(UnicastAddress::new(0x0010))
        );
        assert!(network.node(UnicastAddress::new(0x0013)).is_none());
        assert!(network.node(UnicastAddress::new(0x000F)).is_none());
        assert_eq!(
            network.node(UnicastAddress::new(0x0020)).map(|n| n.address),
            Some(UnicastAddress::new(0x0020))
        );
    }
    #[test]
    fn test_snapshot_unaffected_by_writes() {
        let network = MeshNetwork::new();
        network.add_net_key(NetKeyIndex::new(0), &net_key(1));
        let snapshot = network.net_keys();
        network.add_net_key(NetKeyIndex::new(1), &net_key(2));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(network.net_keys().len(), 2);
    }
    #[test]
    fn test_key_refresh() {
        let network = MeshNetwork::new();
        let index = NetKeyIndex::new(0);
        network.add_net_key(index, &net_key(1));
        assert_eq!(
            network.advance_key_refresh(index),
            Err(DirectoryError::NotRefreshing(index))
        );
        network.refresh_net_key(index, &net_key(2)).unwrap();
        let keys = network.net_keys();
        let phase = keys.get_keys(index).unwrap();
        assert_eq!(phase.tx_key().net_key(), &net_key(1));
        assert_eq!(network.advance_key_refresh(index), Ok(KeyRefreshPhases::Second));
        assert_eq!(
            network.net_keys().get_keys(index).unwrap().tx_key().net_key(),
            &net_key(2)
        );
        assert_eq!(network.advance_key_refresh(index), Ok(KeyRefreshPhases::Normal));
        assert!(network.net_keys().get_keys(index).unwrap().old().is_none());
    }
    #[test]
    fn test_iv_update() {
        let network = MeshNetwork::new();
        network.set_iv_index(IVIndexState::new(IVIndex(7), IVUpdateFlag(false)));
        let state = network.begin_iv_update().unwrap();
        assert_eq!(state.tx_index(), IVIndex(7));
        assert_eq!(network.begin_iv_update(), Err(DirectoryError::IVUpdateInProgress));
        assert_eq!(network.finish_iv_update().unwrap().tx_index(), IVIndex(8));
        assert_eq!(network.finish_iv_update(), Err(DirectoryError::NoIVUpdate));
    }
    #[test]
    fn test_app_key_binding() {
        let network = MeshNetwork::new();
        let app_key = AppKey::new_bytes([9; 16]);
        assert_eq!(
            network.add_app_key(AppKeyIndex::new(0), app_key, NetKeyIndex::new(3)),
            Err(DirectoryError::UnknownNetKeyIndex(NetKeyIndex::new(3)))
        );
        network.add_net_key(NetKeyIndex::new(3), &net_key(1));
        network
            .add_app_key(AppKeyIndex::new(0), app_key, NetKeyIndex::new(3))
            .unwrap();
        assert_eq!(network.app_keys(NetKeyIndex::new(3)).len(), 1);
        assert!(network.app_keys(NetKeyIndex::new(0)).is_empty());
        assert_eq!(
            network.app_key(AppKeyIndex::new(0)).map(|m| m.aid),
            Some(app_key.aid())
        );
    }
    #[test]
    fn test_state_round_trip() {
        let network = MeshNetwork::new();
        network.add_net_key(NetKeyIndex::new(0), &net_key(1));
        network.add_net_key(NetKeyIndex::new(1), &net_key(2));
        network
            .refresh_net_key(NetKeyIndex::new(1), &net_key(3))
            .unwrap();
        network
            .add_app_key(AppKeyIndex::new(4), AppKey::new_bytes([5; 16]), NetKeyIndex::new(0))
            .unwrap();
        network.add_node(node(0x0100, 2));
        let state = network.to_state(42);
        let restored = MeshNetwork::from_state(&state).unwrap();
        assert_eq!(restored.to_state(42), state);
        assert_eq!(state.net_keys[1].phase, 1);
        assert_eq!(state.net_keys[1].old_key, Some(net_key(2)));
    }
}
