// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Fetcher abstractions for authoritative NFT data sources
//!
//! This crate defines the seam between the cache core and whatever slow,
//! authoritative source supplies token state (a chain indexer, an LCD node,
//! a third-party API). The cache never talks to a network itself; it calls
//! [`TokenFetcher`] and persists what comes back.
//!
//! # Core Abstractions
//!
//! - **[`TokenFetcher`] Trait**: one fetch operation per token, plus a health
//!   probe. Object-safe so the coordinator can hold `Arc<dyn TokenFetcher>`.
//! - **Token Data Model**: [`TokenMetadata`], [`TokenAccess`], and the stored
//!   [`TokenRecord`] with its refresh timestamp.
//! - **Error Classification**: [`FetchError`] distinguishes "token does not
//!   exist" from transient upstream failures, which the cache treats very
//!   differently.

use std::fmt;

use async_trait::async_trait;
use shared_types::{NetworkId, TokenKey};
use thiserror::Error;

pub mod health;
pub mod types;

pub use health::*;
pub use types::*;

/// Interface to an authoritative NFT data source
///
/// Implementations are slow and fallible; they are never memoized here.
/// Deciding when to call this trait, and making sure it is called at most
/// once per key under concurrent demand, is entirely the cache core's job.
#[async_trait]
pub trait TokenFetcher: Send + Sync + fmt::Debug {
    /// Retrieve the current state of one token from the upstream source
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::NotFound`] when the upstream definitively
    /// reports the token does not exist, and other variants for transport,
    /// decoding, or availability failures.
    async fn fetch_token(&self, key: &TokenKey) -> Result<FetchedToken, FetchError>;

    /// Check the health of the upstream source
    ///
    /// # Errors
    ///
    /// Returns an error if the health probe itself could not be performed.
    async fn health_check(&self) -> Result<HealthStatus, FetchError>;

    /// Name of this fetcher for logging and health reporting
    fn name(&self) -> &'static str;
}

/// Errors produced by [`TokenFetcher`] implementations
#[derive(Debug, Error)]
pub enum FetchError {
    /// The upstream definitively reported that the token does not exist
    #[error("token {key} not found upstream")]
    NotFound {
        /// Canonical form of the missing token's key
        key: String,
    },

    /// HTTP transport failed
    #[error("HTTP request failed: {message}")]
    Http {
        /// Underlying transport error message
        message: String,
    },

    /// Upstream answered with something we could not decode
    #[error("invalid upstream response: {message}")]
    InvalidResponse {
        /// Decoding failure details
        message: String,
    },

    /// Upstream rate limit hit
    #[error("rate limit exceeded, retry after {retry_after_seconds} seconds")]
    RateLimited {
        /// Suggested back-off before retrying
        retry_after_seconds: u64,
    },

    /// Request exceeded its deadline
    #[error("request timeout after {timeout_seconds} seconds")]
    Timeout {
        /// Deadline that was exceeded, in seconds
        timeout_seconds: u64,
    },

    /// The fetcher does not serve this network
    #[error("network {network} is not served by this fetcher")]
    UnsupportedNetwork {
        /// The unserved network
        network: NetworkId,
    },

    /// Fetcher configuration was invalid
    #[error("configuration error: {message}")]
    Configuration {
        /// What was wrong with the configuration
        message: String,
    },

    /// Fetcher-specific error that fits no other variant
    #[error(transparent)]
    Custom {
        /// The wrapped error
        error: anyhow::Error,
    },
}

impl FetchError {
    /// Whether this failure definitively means the token does not exist
    ///
    /// The cache surfaces these as `NotFound` to callers and never writes a
    /// record for them; everything else is a transient upstream failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
