// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Shared store seam and key namespaces
//!
//! The store is opened once at startup and the same handle is shared by every
//! concurrent request handler; both core components receive it explicitly as
//! `Arc<dyn TokenStore>`. Reads are unsynchronized. Record writes must only
//! happen while holding the record's lease (the coordinator's job; the store
//! itself does not enforce it), and index adds are idempotent so they stay
//! safe under unsynchronized concurrency.

use std::fmt;

use async_trait::async_trait;
use fetch_client::TokenRecord;
use shared_types::{CollectionKey, NetworkId, TokenKey};
use tracing::warn;

use crate::error::StoreError;

/// Key derivation for everything persisted in the shared store
///
/// Records, collection indexes, the per-network collection registry, and lock
/// resources each get their own prefix so the namespaces can never collide.
pub mod keyspace {
    use shared_types::{NetworkId, TokenKey};

    /// Store key for a token's record
    pub fn record_key(key: &TokenKey) -> String {
        format!("nft:{key}")
    }

    /// Store key for a collection's token-membership set
    pub fn index_key(network: &NetworkId, address: &str) -> String {
        format!("idx:{network}:{address}")
    }

    /// Store key for the set of collection addresses known on a network
    pub fn collection_registry_key(network: &NetworkId) -> String {
        format!("col:{network}")
    }

    /// Lock resource name guarding a token's refresh
    ///
    /// Deliberately disjoint from every data-key prefix above.
    pub fn lock_resource(key: &TokenKey) -> String {
        format!("lease:nft:{key}")
    }
}

/// Decode index members, dropping entries that no longer parse
///
/// A corrupt member is logged and skipped rather than failing the whole
/// enumeration; partial membership is acceptable, wrong values are not.
pub(crate) fn parse_members(
    network: &NetworkId,
    address: &str,
    members: Vec<String>,
) -> Vec<TokenKey> {
    members
        .into_iter()
        .filter_map(|member| match member.parse::<TokenKey>() {
            Ok(key) => Some(key),
            Err(error) => {
                warn!(
                    network = %network,
                    address,
                    member,
                    %error,
                    "dropping unparseable collection index member"
                );
                None
            }
        })
        .collect()
}

/// Turn a registry entry back into a collection key, dropping invalid ones
pub(crate) fn collection_from_registry(
    network: &NetworkId,
    address: String,
) -> Option<CollectionKey> {
    match CollectionKey::collection(network.clone(), address) {
        Ok(key) => Some(key),
        Err(error) => {
            warn!(network = %network, %error, "dropping invalid registry entry");
            None
        }
    }
}

/// The shared key-value store holding token records and collection indexes
#[async_trait]
pub trait TokenStore: Send + Sync + fmt::Debug {
    /// Read a token's record, if one has ever been written
    async fn record(&self, key: &TokenKey) -> Result<Option<TokenRecord>, StoreError>;

    /// Persist a token's record
    ///
    /// Callers must hold the token's lease; the store does not check.
    async fn write_record(&self, key: &TokenKey, record: &TokenRecord) -> Result<(), StoreError>;

    /// Add a token to its collection's index and register the collection
    ///
    /// Idempotent: adding a member that is already present is a no-op.
    async fn add_to_index(&self, key: &TokenKey) -> Result<(), StoreError>;

    /// All tokens recorded for one collection
    ///
    /// Unordered; an unknown collection yields an empty list.
    async fn index_members(
        &self,
        network: &NetworkId,
        address: &str,
    ) -> Result<Vec<TokenKey>, StoreError>;

    /// All collections with at least one recorded token on a network
    async fn collections(&self, network: &NetworkId) -> Result<Vec<CollectionKey>, StoreError>;
}
