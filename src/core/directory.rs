//! Node directory
//!
//! Durable registry of the network key, the single application key and all
//! admitted nodes. Every mutation is written through to the storage backend
//! before the call returns. The in-memory state stays authoritative for the
//! lifetime of the process even when a write fails, so a node is never
//! configured twice by the same process.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    core::{
        error::{DirectoryError, DirectoryResult},
        types::{Address, ApplicationKeyRecord, Key128, NetworkRecord, NodeRecord, is_unicast},
    },
    storage::DirectoryStorage,
};

/// Persisted form of the directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectorySnapshot {
    pub network: Option<NetworkRecord>,
    pub app_key: Option<ApplicationKeyRecord>,
    #[serde(default)]
    pub nodes: BTreeMap<Address, NodeRecord>,
}

/// Result of attaching to the directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attach {
    Created,
    Attached,
}

/// Node directory backed by durable storage
pub struct NodeDirectory<S: DirectoryStorage> {
    storage: S,
    state: DirectorySnapshot,
}

impl<S: DirectoryStorage> NodeDirectory<S> {
    /// Load the persisted directory state, or start empty
    pub async fn open(storage: S) -> DirectoryResult<Self> {
        let state = storage.load().await?.unwrap_or_default();
        debug!(
            nodes = state.nodes.len(),
            has_network = state.network.is_some(),
            "Directory loaded"
        );

        Ok(Self { storage, state })
    }

    /// Create the directory for `key`, or attach to the one already stored
    pub async fn create_or_attach(&mut self, net_idx: u16, key: Key128) -> DirectoryResult<Attach> {
        match self.state.network {
            Some(network) if network.key == key && network.net_idx == net_idx => {
                Ok(Attach::Attached)
            }
            Some(_) => Err(DirectoryError::NetworkKeyMismatch),
            None => {
                self.state.network = Some(NetworkRecord { net_idx, key });
                self.persist().await?;
                info!(net_idx, key = %key, "Directory created");
                Ok(Attach::Created)
            }
        }
    }

    /// The application key, if one has been allocated
    pub fn app_key(&self) -> Option<&ApplicationKeyRecord> {
        self.state.app_key.as_ref()
    }

    /// Allocate and store the application key unless one exists
    ///
    /// At most one application key ever exists; an existing key is returned
    /// unchanged.
    pub async fn ensure_app_key(
        &mut self,
        app_idx: u16,
        key: Key128,
    ) -> DirectoryResult<ApplicationKeyRecord> {
        if let Some(existing) = self.state.app_key {
            return Ok(existing);
        }

        let net_idx = self
            .state
            .network
            .map(|n| n.net_idx)
            .ok_or(DirectoryError::NoNetwork)?;

        let record = ApplicationKeyRecord {
            app_idx,
            net_idx,
            key,
        };
        self.state.app_key = Some(record);
        self.persist().await?;
        info!(app_idx, net_idx, key = %key, "Application key stored");

        Ok(record)
    }

    pub fn node(&self, address: Address) -> Option<&NodeRecord> {
        self.state.nodes.get(&address)
    }

    /// All nodes in ascending address order
    pub fn nodes(&self) -> impl Iterator<Item = &NodeRecord> {
        self.state.nodes.values()
    }

    /// Addresses of nodes not configured yet, ascending
    pub fn unconfigured(&self) -> Vec<Address> {
        self.state
            .nodes
            .values()
            .filter(|node| !node.configured)
            .map(|node| node.address)
            .collect()
    }

    /// Record a newly admitted node
    ///
    /// The record always starts unconfigured. Its element range must not
    /// overlap any existing node.
    pub async fn add_node(&mut self, mut record: NodeRecord) -> DirectoryResult<()> {
        if !is_unicast(record.address) || !is_unicast(record.last_address()) {
            return Err(DirectoryError::InvalidAddress(record.address));
        }
        if self.state.nodes.values().any(|node| node.overlaps(&record)) {
            return Err(DirectoryError::AddressInUse(record.address));
        }

        record.configured = false;
        let address = record.address;
        self.state.nodes.insert(address, record);
        self.persist().await?;
        debug!(address = format_args!("{:#06x}", address), "Node stored");

        Ok(())
    }

    /// Mark a node configured
    ///
    /// Returns whether the flag changed. The flag is never cleared again.
    pub async fn mark_configured(&mut self, address: Address) -> DirectoryResult<bool> {
        if self.state.app_key.is_none() {
            return Err(DirectoryError::NoApplicationKey);
        }

        let node = self
            .state
            .nodes
            .get_mut(&address)
            .ok_or(DirectoryError::UnknownNode(address))?;
        if node.configured {
            return Ok(false);
        }

        node.configured = true;
        self.persist().await?;

        Ok(true)
    }

    /// Snapshot of the current state
    pub fn snapshot(&self) -> &DirectorySnapshot {
        &self.state
    }

    async fn persist(&self) -> DirectoryResult<()> {
        self.storage.save(&self.state).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    const NET_KEY: Key128 = Key128::new([0x12; 16]);
    const APP_KEY: Key128 = Key128::new([0xfe; 16]);

    fn node(address: Address, element_count: u8) -> NodeRecord {
        NodeRecord {
            uuid: Uuid::from_u128(u128::from(address)),
            address,
            net_idx: 0,
            device_key: Key128::new([0xaa; 16]),
            element_count,
            configured: false,
        }
    }

    async fn directory_with_key(storage: MemoryStorage) -> NodeDirectory<MemoryStorage> {
        let mut dir = NodeDirectory::open(storage).await.unwrap();
        dir.create_or_attach(0, NET_KEY).await.unwrap();
        dir.ensure_app_key(0, APP_KEY).await.unwrap();
        dir
    }

    #[tokio::test]
    async fn test_create_then_attach() {
        let storage = MemoryStorage::new();
        let mut dir = NodeDirectory::open(storage.clone()).await.unwrap();

        assert_eq!(dir.create_or_attach(0, NET_KEY).await.unwrap(), Attach::Created);
        assert_eq!(dir.create_or_attach(0, NET_KEY).await.unwrap(), Attach::Attached);
        assert!(matches!(
            dir.create_or_attach(0, APP_KEY).await,
            Err(DirectoryError::NetworkKeyMismatch)
        ));

        let mut reopened = NodeDirectory::open(storage).await.unwrap();
        assert_eq!(
            reopened.create_or_attach(0, NET_KEY).await.unwrap(),
            Attach::Attached
        );
    }

    #[tokio::test]
    async fn test_single_app_key() {
        let storage = MemoryStorage::new();
        let mut dir = NodeDirectory::open(storage).await.unwrap();

        assert!(matches!(
            dir.ensure_app_key(0, APP_KEY).await,
            Err(DirectoryError::NoNetwork)
        ));

        dir.create_or_attach(0, NET_KEY).await.unwrap();
        let first = dir.ensure_app_key(0, APP_KEY).await.unwrap();
        let second = dir.ensure_app_key(1, Key128::new([0x01; 16])).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(dir.app_key().unwrap().key, APP_KEY);
    }

    #[tokio::test]
    async fn test_add_node_rejects_overlap() {
        let mut dir = directory_with_key(MemoryStorage::new()).await;

        dir.add_node(node(0x0002, 3)).await.unwrap();
        assert!(matches!(
            dir.add_node(node(0x0004, 1)).await,
            Err(DirectoryError::AddressInUse(0x0004))
        ));
        assert!(matches!(
            dir.add_node(node(0x0002, 1)).await,
            Err(DirectoryError::AddressInUse(0x0002))
        ));
        dir.add_node(node(0x0005, 1)).await.unwrap();

        assert!(matches!(
            dir.add_node(node(0x0000, 1)).await,
            Err(DirectoryError::InvalidAddress(0x0000))
        ));
        assert!(matches!(
            dir.add_node(node(0x7fff, 2)).await,
            Err(DirectoryError::InvalidAddress(0x7fff))
        ));
    }

    #[tokio::test]
    async fn test_added_node_starts_unconfigured() {
        let mut dir = directory_with_key(MemoryStorage::new()).await;
        let mut record = node(0x0002, 1);
        record.configured = true;

        dir.add_node(record).await.unwrap();
        assert_eq!(dir.unconfigured(), vec![0x0002]);
    }

    #[tokio::test]
    async fn test_configured_is_monotonic() {
        let mut dir = directory_with_key(MemoryStorage::new()).await;
        dir.add_node(node(0x0003, 1)).await.unwrap();
        dir.add_node(node(0x0002, 1)).await.unwrap();
        assert_eq!(dir.unconfigured(), vec![0x0002, 0x0003]);

        assert!(dir.mark_configured(0x0002).await.unwrap());
        assert!(!dir.mark_configured(0x0002).await.unwrap());
        assert!(dir.node(0x0002).unwrap().configured);
        assert_eq!(dir.unconfigured(), vec![0x0003]);

        assert!(matches!(
            dir.mark_configured(0x0009).await,
            Err(DirectoryError::UnknownNode(0x0009))
        ));
    }

    #[tokio::test]
    async fn test_never_configured_without_app_key() {
        let mut dir = NodeDirectory::open(MemoryStorage::new()).await.unwrap();
        dir.create_or_attach(0, NET_KEY).await.unwrap();
        dir.add_node(node(0x0001, 1)).await.unwrap();

        assert!(matches!(
            dir.mark_configured(0x0001).await,
            Err(DirectoryError::NoApplicationKey)
        ));
        assert!(!dir.node(0x0001).unwrap().configured);
    }

    #[tokio::test]
    async fn test_every_mutation_is_persisted() {
        let storage = MemoryStorage::new();
        let mut dir = directory_with_key(storage.clone()).await;
        dir.add_node(node(0x0002, 2)).await.unwrap();
        dir.mark_configured(0x0002).await.unwrap();

        assert_eq!(storage.save_count().await, 4);

        let reopened = NodeDirectory::open(storage).await.unwrap();
        assert_eq!(reopened.snapshot(), dir.snapshot());
        assert!(reopened.node(0x0002).unwrap().configured);
    }

    #[tokio::test]
    async fn test_failed_write_keeps_memory_state() {
        let storage = MemoryStorage::new();
        let mut dir = directory_with_key(storage.clone()).await;
        dir.add_node(node(0x0002, 1)).await.unwrap();

        storage.set_save_failure(true).await;
        assert!(matches!(
            dir.mark_configured(0x0002).await,
            Err(DirectoryError::Storage(_))
        ));
        assert!(dir.unconfigured().is_empty());
    }
}
