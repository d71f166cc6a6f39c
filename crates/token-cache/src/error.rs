// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy for the cache core
//!
//! Every failure a caller can observe resolves to one of the [`CacheError`]
//! kinds; lock contention and store read failures are recovered internally
//! and never escape as errors on their own.

use fetch_client::FetchError;
use thiserror::Error;

/// Errors from the backing key-value store
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached or an operation failed
    #[error("store unavailable: {message}")]
    Unavailable {
        /// Underlying failure description
        message: String,
    },

    /// A stored value could not be decoded
    #[error("corrupt stored value under {key}: {message}")]
    Corrupt {
        /// The store key holding the bad value
        key: String,
        /// Decoding failure details
        message: String,
    },
}

/// Errors surfaced by the cache core to its callers
#[derive(Debug, Error)]
pub enum CacheError {
    /// The token is unknown to the authoritative source
    #[error("token {key} not found")]
    NotFound {
        /// Canonical form of the unknown token's key
        key: String,
    },

    /// Lock contention exhausted retries and no stored value exists to serve
    #[error("refresh of {resource} is contended and no cached value is available")]
    TemporarilyUnavailable {
        /// The contended lock resource
        resource: String,
    },

    /// The authoritative source failed while refreshing
    #[error("upstream fetch failed: {source}")]
    UpstreamFetchFailed {
        /// The fetcher's failure
        #[source]
        source: FetchError,
    },

    /// The backing store failed in a way that could not be recovered
    #[error(transparent)]
    Store(#[from] StoreError),
}
