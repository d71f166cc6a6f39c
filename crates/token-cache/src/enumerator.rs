// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Collection enumeration
//!
//! Enumerations are plain reads: membership may lag a refresh in flight, and
//! that is acceptable. A slightly short list is fine where a wrong value for
//! one token would not be. The indexes themselves are maintained by the
//! coordinator as a side effect of record refreshes and have no TTL.

use std::{collections::BTreeSet, sync::Arc};

use shared_types::{CollectionKey, TokenKey};
use tracing::trace;

use crate::{error::CacheError, store::TokenStore};

/// Lock-free enumeration of known tokens per collection
#[derive(Debug)]
pub struct CollectionEnumerator {
    store: Arc<dyn TokenStore>,
}

impl CollectionEnumerator {
    /// Wire an enumerator onto the shared store handle
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    /// Every token known for the collection, sorted and de-duplicated
    ///
    /// With no contract address, enumerates every collection on the network
    /// and concatenates the results. Unknown collections yield an empty list.
    pub async fn all_tokens(&self, key: &CollectionKey) -> Result<Vec<TokenKey>, CacheError> {
        let tokens = match &key.address {
            Some(address) => {
                let mut members = self.store.index_members(&key.network, address).await?;
                members.sort();
                members.dedup();
                members
            }
            None => {
                let mut seen = BTreeSet::new();
                for collection in self.store.collections(&key.network).await? {
                    if let Some(address) = &collection.address {
                        seen.extend(
                            self.store
                                .index_members(&collection.network, address)
                                .await?,
                        );
                    }
                }
                seen.into_iter().collect()
            }
        };
        trace!(collection = %key, count = tokens.len(), "enumerated collection");
        Ok(tokens)
    }
}
