// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Token data model shared between fetchers and the cache
//!
//! The metadata and ownership payloads are opaque to the cache: fetchers fill
//! them from whatever the upstream source returns, and the cache persists and
//! serves them verbatim. Only [`TokenRecord::fetched_at`] belongs to the
//! cache; it is stamped at write time and drives staleness decisions.

use std::{collections::HashMap, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Descriptive metadata for one token
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub struct TokenMetadata {
    /// Token name (if the upstream provides one)
    pub name: Option<String>,
    /// Token description
    pub description: Option<String>,
    /// Token image URI
    pub image: Option<String>,
    /// Additional upstream-specific metadata fields
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    #[schema(value_type = Object)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Ownership and access state for one token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TokenAccess {
    /// Current owner address
    pub owner: String,
    /// Address approved to transfer the token, if any
    pub approved: Option<String>,
}

/// What a fetcher returns for one token
///
/// Carries no timestamp: stamping the refresh time is the cache's job, not
/// the fetcher's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedToken {
    /// Descriptive metadata
    pub info: TokenMetadata,
    /// Ownership state
    pub access: TokenAccess,
}

/// A token's cached state as persisted in the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TokenRecord {
    /// Descriptive metadata
    pub info: TokenMetadata,
    /// Ownership state
    pub access: TokenAccess,
    /// When this record was last refreshed from the authoritative source
    pub fetched_at: DateTime<Utc>,
}

impl TokenRecord {
    /// Build a record from a fetch result, stamped with the given time
    pub fn from_fetched(fetched: FetchedToken, fetched_at: DateTime<Utc>) -> Self {
        Self {
            info: fetched.info,
            access: fetched.access,
            fetched_at,
        }
    }

    /// Whether this record is still fresh under the given TTL
    ///
    /// A record from the future (clock skew between writers) counts as fresh.
    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        match (now - self.fetched_at).to_std() {
            Ok(age) => age < ttl,
            Err(_) => true,
        }
    }
}
