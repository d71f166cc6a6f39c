// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Read-through refresh coordination
//!
//! The coordinator owns the whole cache-coherence protocol for individual
//! token records: freshness check, lease acquisition with bounded jittered
//! retries, the double-check after winning the lease, the single upstream
//! fetch, and the write-back. No in-process exclusive resource is held across
//! any of its suspension points; the distributed lease is the only mutual
//! exclusion involved.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use dashmap::DashMap;
use fetch_client::{TokenFetcher, TokenRecord};
use shared_types::TokenKey;
use tracing::{debug, error, trace, warn};

use crate::{
    error::CacheError,
    lock::{LockError, LockManager},
    store::{TokenStore, keyspace},
};

/// Freshness policy for cached token records
///
/// One TTL governs every record; the collection indexes have no TTL of their
/// own and refresh opportunistically as records do.
#[derive(Debug, Clone, Copy)]
pub struct StalenessPolicy {
    ttl: Duration,
}

impl StalenessPolicy {
    /// Policy with the given record TTL
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    /// The record TTL
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

/// Counters describing coordinator behavior since startup
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CoordinatorStats {
    /// Requests answered from a fresh record without locking
    pub hits: u64,
    /// Requests that found no record at all
    pub misses: u64,
    /// Requests that found a record past its TTL
    pub stale: u64,
    /// Refreshes completed by this process
    pub refreshes: u64,
    /// Requests resolved by another holder's refresh during the double-check
    pub coalesced: u64,
    /// Stale records served because lock retries were exhausted
    pub stale_fallbacks: u64,
    /// Requests that failed with no record to fall back on
    pub unavailable: u64,
    /// Upstream fetch failures observed while holding the lease
    pub fetch_failures: u64,
    /// Store writes that failed after a successful fetch
    pub write_failures: u64,
    /// Store reads that failed and were degraded to misses
    pub read_errors: u64,
    /// Fraction of requests answered without any refresh work
    pub hit_rate: f64,
}

/// Read-through cache coordinator with single-flight refresh per key
///
/// One instance is shared by all request handlers; the store, lock manager,
/// and fetcher handles are injected once at startup.
#[derive(Debug)]
pub struct CacheCoordinator {
    store: Arc<dyn TokenStore>,
    locks: Arc<dyn LockManager>,
    fetcher: Arc<dyn TokenFetcher>,
    policy: StalenessPolicy,
    stats: DashMap<&'static str, u64>,
}

impl CacheCoordinator {
    /// Wire a coordinator from its collaborators
    pub fn new(
        store: Arc<dyn TokenStore>,
        locks: Arc<dyn LockManager>,
        fetcher: Arc<dyn TokenFetcher>,
        policy: StalenessPolicy,
    ) -> Self {
        Self {
            store,
            locks,
            fetcher,
            policy,
            stats: DashMap::new(),
        }
    }

    /// The staleness policy in effect
    pub fn policy(&self) -> StalenessPolicy {
        self.policy
    }

    /// Current state of one token, refreshed from upstream if stale
    ///
    /// Callers project whichever field they need (`info`, `access.owner`);
    /// there is exactly one fetch path regardless of the projection.
    ///
    /// # Errors
    ///
    /// - [`CacheError::NotFound`] when the upstream definitively reports the
    ///   token does not exist. Nothing is cached for it.
    /// - [`CacheError::UpstreamFetchFailed`] when the fetch fails while this
    ///   process holds the refresh lease. The stale-or-absent state is left
    ///   unchanged so the next caller retries.
    /// - [`CacheError::TemporarilyUnavailable`] when lock retries are
    ///   exhausted and there is no stored value, stale or otherwise, to fall
    ///   back on.
    pub async fn get_token_record(&self, key: &TokenKey) -> Result<TokenRecord, CacheError> {
        let cached = self.read_record(key).await;
        if let Some(record) = &cached {
            if record.is_fresh(self.policy.ttl(), Utc::now()) {
                self.bump("hits");
                trace!(key = %key, "fresh cache hit");
                return Ok(record.clone());
            }
        }
        self.bump(if cached.is_some() { "stale" } else { "misses" });

        let resource = keyspace::lock_resource(key);
        let mut handle = match self.locks.acquire(&resource).await {
            Ok(handle) => handle,
            Err(error) => return self.fall_back(key, resource, cached, &error),
        };

        // Double-check: another holder may have refreshed the record while
        // this caller was waiting on the lease.
        let previous = self.read_record(key).await;
        if let Some(record) = &previous {
            if record.is_fresh(self.policy.ttl(), Utc::now()) {
                self.bump("coalesced");
                debug!(key = %key, "record refreshed by concurrent holder");
                self.locks.release(handle).await;
                return Ok(record.clone());
            }
        }

        let fetched = match self.fetcher.fetch_token(key).await {
            Ok(fetched) => fetched,
            Err(source) => {
                // Leave the stale-or-absent state untouched so the next
                // caller retries instead of inheriting a cached failure.
                self.bump("fetch_failures");
                self.locks.release(handle).await;
                return Err(if source.is_not_found() {
                    CacheError::NotFound {
                        key: key.to_string(),
                    }
                } else {
                    warn!(key = %key, error = %source, "upstream fetch failed");
                    CacheError::UpstreamFetchFailed { source }
                });
            }
        };

        // A long fetch may have eaten most of the lease; re-arm it before
        // the write so the critical section stays covered.
        let threshold = self.locks.lock_config().extension_threshold;
        if handle.needs_extension(threshold) {
            if let Err(error) = self.locks.extend(&mut handle).await {
                warn!(key = %key, %error, "could not extend lease before write-back");
            }
        }

        let mut record = TokenRecord::from_fetched(fetched, Utc::now());
        if let Some(previous) = previous.as_ref().or(cached.as_ref()) {
            // fetched_at never regresses, even under clock skew between
            // writer processes.
            record.fetched_at = record.fetched_at.max(previous.fetched_at);
        }

        match self.store.write_record(key, &record).await {
            Ok(()) => {
                self.bump("refreshes");
                if let Err(error) = self.store.add_to_index(key).await {
                    warn!(key = %key, %error, "collection index add failed");
                }
            }
            Err(error) => {
                // The fetched value is still good; trade durability for
                // availability and let the next request refresh again.
                self.bump("write_failures");
                error!(key = %key, %error, "failed to persist refreshed record");
            }
        }

        self.locks.release(handle).await;
        Ok(record)
    }

    /// Resolve a failed lease acquisition
    ///
    /// A stale record bounds the caller's wait: serving it beats blocking
    /// behind a contended refresh. With nothing stored, the contention is
    /// surfaced as temporary unavailability.
    fn fall_back(
        &self,
        key: &TokenKey,
        resource: String,
        cached: Option<TokenRecord>,
        error: &LockError,
    ) -> Result<TokenRecord, CacheError> {
        match cached {
            Some(record) => {
                self.bump("stale_fallbacks");
                warn!(key = %key, %error, "refresh lease unavailable, serving stale record");
                Ok(record)
            }
            None => {
                self.bump("unavailable");
                warn!(key = %key, %error, "refresh lease unavailable and no record to serve");
                Err(CacheError::TemporarilyUnavailable { resource })
            }
        }
    }

    /// Read a record, degrading store failures to cache misses
    async fn read_record(&self, key: &TokenKey) -> Option<TokenRecord> {
        match self.store.record(key).await {
            Ok(record) => record,
            Err(error) => {
                self.bump("read_errors");
                warn!(key = %key, %error, "store read failed, treating as miss");
                None
            }
        }
    }

    fn bump(&self, counter: &'static str) {
        self.stats
            .entry(counter)
            .and_modify(|v| *v += 1)
            .or_insert(1);
    }

    fn stat(&self, counter: &'static str) -> u64 {
        self.stats.get(counter).map_or(0, |v| *v)
    }

    /// Snapshot of the coordinator's counters
    pub fn stats(&self) -> CoordinatorStats {
        let hits = self.stat("hits");
        let misses = self.stat("misses");
        let stale = self.stat("stale");
        let coalesced = self.stat("coalesced");
        let total = hits + misses + stale;
        #[allow(clippy::cast_precision_loss)]
        let hit_rate = if total > 0 {
            (hits + coalesced) as f64 / total as f64
        } else {
            0.0
        };

        CoordinatorStats {
            hits,
            misses,
            stale,
            refreshes: self.stat("refreshes"),
            coalesced,
            stale_fallbacks: self.stat("stale_fallbacks"),
            unavailable: self.stat("unavailable"),
            fetch_failures: self.stat("fetch_failures"),
            write_failures: self.stat("write_failures"),
            read_errors: self.stat("read_errors"),
            hit_rate,
        }
    }
}
