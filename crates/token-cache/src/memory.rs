// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! In-memory store and lock backends
//!
//! Process-local implementations of the store and lock seams, used by the
//! test suites and by single-node runs that have no Redis available. Values
//! go through the same JSON encoding as the Redis backend so serialization
//! bugs surface here too.

use std::{
    collections::HashSet,
    time::Instant,
};

use async_trait::async_trait;
use dashmap::{DashMap, mapref::entry::Entry};
use fetch_client::TokenRecord;
use shared_types::{CollectionKey, NetworkId, TokenKey};
use uuid::Uuid;

use crate::{
    error::StoreError,
    lock::{LockConfig, LockError, LockHandle, LockManager},
    store::{TokenStore, collection_from_registry, keyspace, parse_members},
};

/// In-memory [`TokenStore`] backed by concurrent maps
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    records: DashMap<String, String>,
    indexes: DashMap<String, HashSet<String>>,
    registries: DashMap<String, HashSet<String>>,
}

impl MemoryTokenStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn record(&self, key: &TokenKey) -> Result<Option<TokenRecord>, StoreError> {
        let store_key = keyspace::record_key(key);
        match self.records.get(&store_key) {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| StoreError::Corrupt {
                    key: store_key.clone(),
                    message: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    async fn write_record(&self, key: &TokenKey, record: &TokenRecord) -> Result<(), StoreError> {
        let json = serde_json::to_string(record).map_err(|e| StoreError::Corrupt {
            key: keyspace::record_key(key),
            message: e.to_string(),
        })?;
        self.records.insert(keyspace::record_key(key), json);
        Ok(())
    }

    async fn add_to_index(&self, key: &TokenKey) -> Result<(), StoreError> {
        self.indexes
            .entry(keyspace::index_key(&key.network, &key.address))
            .or_default()
            .insert(key.to_string());
        self.registries
            .entry(keyspace::collection_registry_key(&key.network))
            .or_default()
            .insert(key.address.clone());
        Ok(())
    }

    async fn index_members(
        &self,
        network: &NetworkId,
        address: &str,
    ) -> Result<Vec<TokenKey>, StoreError> {
        let members = match self.indexes.get(&keyspace::index_key(network, address)) {
            Some(set) => set.iter().cloned().collect::<Vec<_>>(),
            None => Vec::new(),
        };
        Ok(parse_members(network, address, members))
    }

    async fn collections(&self, network: &NetworkId) -> Result<Vec<CollectionKey>, StoreError> {
        let addresses = match self
            .registries
            .get(&keyspace::collection_registry_key(network))
        {
            Some(set) => set.iter().cloned().collect::<Vec<_>>(),
            None => Vec::new(),
        };
        Ok(addresses
            .into_iter()
            .filter_map(|address| collection_from_registry(network, address))
            .collect())
    }
}

#[derive(Debug)]
struct MemoryLease {
    token: Uuid,
    expires_at: Instant,
}

/// In-memory [`LockManager`] with real lease expiry
///
/// Leases are scoped to one process, which is exactly the mutual exclusion a
/// single-node deployment needs. Expiry semantics match the distributed
/// backend: an expired lease is claimable by the next acquirer without any
/// cleanup by the previous holder.
#[derive(Debug)]
pub struct MemoryLockManager {
    leases: DashMap<String, MemoryLease>,
    config: LockConfig,
}

impl MemoryLockManager {
    /// Create a lock manager with the given tuning
    pub fn new(config: LockConfig) -> Self {
        Self {
            leases: DashMap::new(),
            config,
        }
    }
}

impl Default for MemoryLockManager {
    fn default() -> Self {
        Self::new(LockConfig::default())
    }
}

#[async_trait]
impl LockManager for MemoryLockManager {
    async fn try_acquire(&self, resource: &str) -> Result<LockHandle, LockError> {
        let token = Uuid::new_v4();
        let now = Instant::now();
        let lease = MemoryLease {
            token,
            expires_at: now + self.config.lease,
        };

        match self.leases.entry(resource.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().expires_at <= now {
                    // Previous holder's lease lapsed; reclaim it.
                    occupied.insert(lease);
                } else {
                    return Err(LockError::Contended {
                        resource: resource.to_string(),
                    });
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(lease);
            }
        }

        Ok(LockHandle::granted(
            resource.to_string(),
            token,
            self.config.effective_validity(),
        ))
    }

    async fn extend(&self, handle: &mut LockHandle) -> Result<(), LockError> {
        let now = Instant::now();
        match self.leases.get_mut(handle.resource()) {
            Some(mut lease) if lease.token == handle.token() && lease.expires_at > now => {
                lease.expires_at = now + self.config.lease;
                drop(lease);
                handle.extended(self.config.effective_validity());
                Ok(())
            }
            _ => Err(LockError::LeaseLost {
                resource: handle.resource().to_string(),
            }),
        }
    }

    async fn release(&self, handle: LockHandle) {
        self.leases
            .remove_if(handle.resource(), |_, lease| lease.token == handle.token());
    }

    fn lock_config(&self) -> &LockConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn token(network: &str, address: &str, id: &str) -> TokenKey {
        TokenKey::new(
            NetworkId::new(network).expect("valid network id"),
            address,
            id,
        )
        .expect("valid token key")
    }

    fn quick_config(lease_ms: u64) -> LockConfig {
        LockConfig {
            lease: Duration::from_millis(lease_ms),
            retry_count: 0,
            retry_delay: Duration::from_millis(1),
            retry_jitter: Duration::from_millis(1),
            ..LockConfig::default()
        }
    }

    #[tokio::test]
    async fn exclusive_while_lease_is_live() {
        let locks = MemoryLockManager::new(quick_config(10_000));
        let held = locks.try_acquire("lease:nft:eth:0xabc:1").await.expect("first acquire");

        assert!(matches!(
            locks.try_acquire("lease:nft:eth:0xabc:1").await,
            Err(LockError::Contended { .. })
        ));

        // Distinct resources never contend.
        let other = locks.try_acquire("lease:nft:eth:0xabc:2").await;
        assert!(other.is_ok());

        locks.release(held).await;
        assert!(locks.try_acquire("lease:nft:eth:0xabc:1").await.is_ok());
    }

    #[tokio::test]
    async fn expired_lease_is_reclaimable() {
        let locks = MemoryLockManager::new(quick_config(20));
        let _abandoned = locks.try_acquire("lease:nft:eth:0xdead:1").await.expect("acquire");

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(locks.try_acquire("lease:nft:eth:0xdead:1").await.is_ok());
    }

    #[tokio::test]
    async fn extend_keeps_the_lease() {
        let locks = MemoryLockManager::new(quick_config(50));
        let mut handle = locks.try_acquire("lease:nft:eth:0xabc:1").await.expect("acquire");

        tokio::time::sleep(Duration::from_millis(20)).await;
        locks.extend(&mut handle).await.expect("extend held lease");
        tokio::time::sleep(Duration::from_millis(40)).await;

        // Without the extension the lease would have lapsed by now.
        assert!(matches!(
            locks.try_acquire("lease:nft:eth:0xabc:1").await,
            Err(LockError::Contended { .. })
        ));
    }

    #[tokio::test]
    async fn extend_after_expiry_reports_lost_lease() {
        let locks = MemoryLockManager::new(quick_config(10));
        let mut handle = locks.try_acquire("lease:nft:eth:0xabc:1").await.expect("acquire");

        tokio::time::sleep(Duration::from_millis(20)).await;
        // Another process reclaims the lapsed lease.
        let _stolen = locks.try_acquire("lease:nft:eth:0xabc:1").await.expect("reclaim");

        assert!(matches!(
            locks.extend(&mut handle).await,
            Err(LockError::LeaseLost { .. })
        ));
    }

    #[tokio::test]
    async fn release_with_stale_token_is_a_noop() {
        let locks = MemoryLockManager::new(quick_config(10));
        let stale = locks.try_acquire("lease:nft:eth:0xabc:1").await.expect("acquire");

        tokio::time::sleep(Duration::from_millis(20)).await;
        let current = locks.try_acquire("lease:nft:eth:0xabc:1").await.expect("reclaim");

        // The lapsed holder's release must not drop the new holder's lease.
        locks.release(stale).await;
        assert!(matches!(
            locks.try_acquire("lease:nft:eth:0xabc:1").await,
            Err(LockError::Contended { .. })
        ));
        locks.release(current).await;
    }

    #[tokio::test]
    async fn store_round_trip_and_index() {
        use fetch_client::{FetchedToken, TokenAccess, TokenMetadata};

        let store = MemoryTokenStore::new();
        let key = token("terra-2", "terra1abc", "42");
        assert_eq!(store.record(&key).await.expect("read"), None);

        let record = TokenRecord::from_fetched(
            FetchedToken {
                info: TokenMetadata::default(),
                access: TokenAccess {
                    owner: "alice".to_string(),
                    approved: None,
                },
            },
            chrono::Utc::now(),
        );
        store.write_record(&key, &record).await.expect("write");
        store.add_to_index(&key).await.expect("index");
        // Idempotent re-add.
        store.add_to_index(&key).await.expect("index again");

        let read = store.record(&key).await.expect("read").expect("present");
        assert_eq!(read, record);

        let network = NetworkId::new("terra-2").expect("valid network id");
        let members = store.index_members(&network, "terra1abc").await.expect("members");
        assert_eq!(members, vec![key.clone()]);

        let collections = store.collections(&network).await.expect("collections");
        assert_eq!(collections.len(), 1);
        assert_eq!(collections[0].address.as_deref(), Some("terra1abc"));
    }
}
