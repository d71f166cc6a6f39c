// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Redis store and lock backends
//!
//! One Redis instance (or cluster endpoint) carries both the data keyspaces
//! and the lock leases, under disjoint prefixes. Locks follow the
//! single-instance Redlock recipe: `SET resource token NX PX lease`, with
//! release and extension gated on the fencing token via small Lua scripts so
//! a lapsed holder can never clobber the next holder's lease.

use std::{fmt, sync::LazyLock, time::Duration};

use ::redis::{AsyncCommands, Client, Script, aio::ConnectionManager};
use async_trait::async_trait;
use fetch_client::TokenRecord;
use shared_types::{CollectionKey, NetworkId, TokenKey};
use tracing::debug;
use uuid::Uuid;

use crate::{
    error::StoreError,
    lock::{LockConfig, LockError, LockHandle, LockManager},
    store::{TokenStore, collection_from_registry, keyspace, parse_members},
};

/// Delete the lease iff the caller still holds it
const RELEASE_LUA: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

/// Re-arm the lease expiry iff the caller still holds it
const EXTEND_LUA: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("pexpire", KEYS[1], ARGV[2])
else
    return 0
end
"#;

static RELEASE_SCRIPT: LazyLock<Script> = LazyLock::new(|| Script::new(RELEASE_LUA));
static EXTEND_SCRIPT: LazyLock<Script> = LazyLock::new(|| Script::new(EXTEND_LUA));

fn store_error(e: &::redis::RedisError) -> StoreError {
    StoreError::Unavailable {
        message: e.to_string(),
    }
}

fn lock_error(e: &::redis::RedisError) -> LockError {
    LockError::Backend {
        message: e.to_string(),
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Open one connection manager and share it between a store and a lock manager
///
/// Both halves talk to the same Redis instance; the connection manager
/// multiplexes and reconnects on its own.
pub async fn connect_shared(
    url: &str,
    lock_config: LockConfig,
) -> Result<(RedisTokenStore, RedisLockManager), StoreError> {
    let client = Client::open(url).map_err(|e| store_error(&e))?;
    let conn = ConnectionManager::new(client)
        .await
        .map_err(|e| store_error(&e))?;
    Ok((
        RedisTokenStore::with_connection(conn.clone()),
        RedisLockManager::with_connection(conn, lock_config),
    ))
}

/// [`TokenStore`] backed by a shared Redis instance
#[derive(Clone)]
pub struct RedisTokenStore {
    conn: ConnectionManager,
}

impl fmt::Debug for RedisTokenStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisTokenStore")
            .field("conn", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisTokenStore {
    /// Connect to Redis at the given URL
    ///
    /// The connection manager reconnects on its own; this handle is opened
    /// once at startup and shared by every request handler.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url).map_err(|e| store_error(&e))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| store_error(&e))?;
        Ok(Self { conn })
    }

    /// Wrap an existing connection manager (shared with the lock manager)
    pub fn with_connection(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl TokenStore for RedisTokenStore {
    async fn record(&self, key: &TokenKey) -> Result<Option<TokenRecord>, StoreError> {
        let store_key = keyspace::record_key(key);
        let json: Option<String> = self
            .conn
            .clone()
            .get(&store_key)
            .await
            .map_err(|e| store_error(&e))?;
        match json {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| StoreError::Corrupt {
                    key: store_key,
                    message: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    async fn write_record(&self, key: &TokenKey, record: &TokenRecord) -> Result<(), StoreError> {
        let store_key = keyspace::record_key(key);
        let json = serde_json::to_string(record).map_err(|e| StoreError::Corrupt {
            key: store_key.clone(),
            message: e.to_string(),
        })?;
        let () = self
            .conn
            .clone()
            .set(&store_key, json)
            .await
            .map_err(|e| store_error(&e))?;
        Ok(())
    }

    async fn add_to_index(&self, key: &TokenKey) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let added: u64 = conn
            .sadd(
                keyspace::index_key(&key.network, &key.address),
                key.to_string(),
            )
            .await
            .map_err(|e| store_error(&e))?;
        let () = conn
            .sadd(
                keyspace::collection_registry_key(&key.network),
                key.address.clone(),
            )
            .await
            .map_err(|e| store_error(&e))?;
        if added > 0 {
            debug!(key = %key, "added token to collection index");
        }
        Ok(())
    }

    async fn index_members(
        &self,
        network: &NetworkId,
        address: &str,
    ) -> Result<Vec<TokenKey>, StoreError> {
        let members: Vec<String> = self
            .conn
            .clone()
            .smembers(keyspace::index_key(network, address))
            .await
            .map_err(|e| store_error(&e))?;
        Ok(parse_members(network, address, members))
    }

    async fn collections(&self, network: &NetworkId) -> Result<Vec<CollectionKey>, StoreError> {
        let addresses: Vec<String> = self
            .conn
            .clone()
            .smembers(keyspace::collection_registry_key(network))
            .await
            .map_err(|e| store_error(&e))?;
        Ok(addresses
            .into_iter()
            .filter_map(|address| collection_from_registry(network, address))
            .collect())
    }
}

/// [`LockManager`] backed by the same Redis instance as the store
#[derive(Clone)]
pub struct RedisLockManager {
    conn: ConnectionManager,
    config: LockConfig,
}

impl fmt::Debug for RedisLockManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisLockManager")
            .field("conn", &"<ConnectionManager>")
            .field("config", &self.config)
            .finish()
    }
}

impl RedisLockManager {
    /// Connect to Redis at the given URL
    pub async fn connect(url: &str, config: LockConfig) -> Result<Self, LockError> {
        let client = Client::open(url).map_err(|e| lock_error(&e))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| lock_error(&e))?;
        Ok(Self { conn, config })
    }

    /// Wrap an existing connection manager (shared with the store)
    pub fn with_connection(conn: ConnectionManager, config: LockConfig) -> Self {
        Self { conn, config }
    }
}

#[async_trait]
impl LockManager for RedisLockManager {
    async fn try_acquire(&self, resource: &str) -> Result<LockHandle, LockError> {
        let token = Uuid::new_v4();
        let granted: Option<String> = ::redis::cmd("SET")
            .arg(resource)
            .arg(token.to_string())
            .arg("NX")
            .arg("PX")
            .arg(millis(self.config.lease))
            .query_async(&mut self.conn.clone())
            .await
            .map_err(|e| lock_error(&e))?;

        if granted.is_some() {
            Ok(LockHandle::granted(
                resource.to_string(),
                token,
                self.config.effective_validity(),
            ))
        } else {
            Err(LockError::Contended {
                resource: resource.to_string(),
            })
        }
    }

    async fn extend(&self, handle: &mut LockHandle) -> Result<(), LockError> {
        let rearmed: i64 = EXTEND_SCRIPT
            .key(handle.resource())
            .arg(handle.token().to_string())
            .arg(millis(self.config.lease))
            .invoke_async(&mut self.conn.clone())
            .await
            .map_err(|e| lock_error(&e))?;
        if rearmed == 1 {
            handle.extended(self.config.effective_validity());
            Ok(())
        } else {
            Err(LockError::LeaseLost {
                resource: handle.resource().to_string(),
            })
        }
    }

    async fn release(&self, handle: LockHandle) {
        let released: Result<i64, ::redis::RedisError> = RELEASE_SCRIPT
            .key(handle.resource())
            .arg(handle.token().to_string())
            .invoke_async(&mut self.conn.clone())
            .await;
        match released {
            Ok(1) => {}
            Ok(_) => debug!(
                resource = handle.resource(),
                "lease already lapsed before release"
            ),
            Err(error) => debug!(
                resource = handle.resource(),
                %error,
                "best-effort lease release failed; lease will expire on its own"
            ),
        }
    }

    fn lock_config(&self) -> &LockConfig {
        &self.config
    }
}
