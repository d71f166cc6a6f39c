// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Behavioral tests for the refresh coordination core
//!
//! These run against the in-memory store and lock backends with scripted
//! fetchers, exercising the coherence properties the service promises:
//! single-flight refresh, freshness, lock liveness, contention fallback, and
//! index consistency.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use async_trait::async_trait;
use fetch_client::{
    FetchError, FetchedToken, HealthStatus, TokenAccess, TokenFetcher, TokenMetadata, TokenRecord,
};
use mockall::mock;
use shared_types::{CollectionKey, NetworkId, TokenKey};
use token_cache::{
    CacheCoordinator, CacheError, CollectionEnumerator, LockConfig, LockManager,
    MemoryLockManager, MemoryTokenStore, StalenessPolicy, StoreError, TokenStore,
    store::keyspace,
};

fn network(name: &str) -> NetworkId {
    NetworkId::new(name).expect("valid network id")
}

fn token(net: &str, address: &str, id: &str) -> TokenKey {
    TokenKey::new(network(net), address, id).expect("valid token key")
}

fn fetched(owner: &str) -> FetchedToken {
    FetchedToken {
        info: TokenMetadata {
            name: Some("Galactic Punk".to_string()),
            description: None,
            image: None,
            extra: std::collections::HashMap::new(),
        },
        access: TokenAccess {
            owner: owner.to_string(),
            approved: None,
        },
    }
}

/// Fetcher that counts calls and walks through a list of owners
#[derive(Debug)]
struct ScriptedFetcher {
    owners: Vec<&'static str>,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    fn new(owners: Vec<&'static str>, delay: Duration) -> Self {
        Self {
            owners,
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenFetcher for ScriptedFetcher {
    async fn fetch_token(&self, _key: &TokenKey) -> Result<FetchedToken, FetchError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        let owner = self
            .owners
            .get(call.min(self.owners.len().saturating_sub(1)))
            .copied()
            .unwrap_or("nobody");
        Ok(fetched(owner))
    }

    async fn health_check(&self) -> Result<HealthStatus, FetchError> {
        Ok(HealthStatus::Up)
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

mock! {
    Fetcher {}

    #[async_trait]
    impl TokenFetcher for Fetcher {
        async fn fetch_token(&self, key: &TokenKey) -> Result<FetchedToken, FetchError>;
        async fn health_check(&self) -> Result<HealthStatus, FetchError>;
        fn name(&self) -> &'static str;
    }
}

impl std::fmt::Debug for MockFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MockFetcher")
    }
}

/// Store wrapper that can be told to fail reads or writes
#[derive(Debug)]
struct FlakyStore {
    inner: MemoryTokenStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    fn new() -> Self {
        Self {
            inner: MemoryTokenStore::new(),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    fn unavailable(op: &str) -> StoreError {
        StoreError::Unavailable {
            message: format!("injected {op} failure"),
        }
    }
}

#[async_trait]
impl TokenStore for FlakyStore {
    async fn record(&self, key: &TokenKey) -> Result<Option<TokenRecord>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::unavailable("read"));
        }
        self.inner.record(key).await
    }

    async fn write_record(&self, key: &TokenKey, record: &TokenRecord) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::unavailable("write"));
        }
        self.inner.write_record(key, record).await
    }

    async fn add_to_index(&self, key: &TokenKey) -> Result<(), StoreError> {
        self.inner.add_to_index(key).await
    }

    async fn index_members(
        &self,
        network: &NetworkId,
        address: &str,
    ) -> Result<Vec<TokenKey>, StoreError> {
        self.inner.index_members(network, address).await
    }

    async fn collections(&self, network: &NetworkId) -> Result<Vec<CollectionKey>, StoreError> {
        self.inner.collections(network).await
    }
}

fn test_lock_config() -> LockConfig {
    LockConfig {
        lease: Duration::from_secs(5),
        retry_count: 5,
        retry_delay: Duration::from_millis(40),
        retry_jitter: Duration::from_millis(20),
        ..LockConfig::default()
    }
}

struct Harness {
    store: Arc<MemoryTokenStore>,
    fetcher: Arc<ScriptedFetcher>,
    coordinator: Arc<CacheCoordinator>,
}

fn harness(owners: Vec<&'static str>, fetch_delay: Duration, ttl: Duration) -> Harness {
    let store = Arc::new(MemoryTokenStore::new());
    let locks = Arc::new(MemoryLockManager::new(test_lock_config()));
    let fetcher = Arc::new(ScriptedFetcher::new(owners, fetch_delay));
    let coordinator = Arc::new(CacheCoordinator::new(
        store.clone(),
        locks,
        fetcher.clone(),
        StalenessPolicy::new(ttl),
    ));
    Harness {
        store,
        fetcher,
        coordinator,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn single_flight_under_concurrent_demand() {
    let h = harness(vec!["alice"], Duration::from_millis(50), Duration::from_secs(60));
    let key = token("terra-2", "terra1punks", "1");

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let coordinator = h.coordinator.clone();
        let key = key.clone();
        tasks.push(tokio::spawn(async move {
            coordinator.get_token_record(&key).await
        }));
    }

    for task in tasks {
        let record = task
            .await
            .expect("task completed")
            .expect("record returned");
        assert_eq!(record.access.owner, "alice");
    }

    assert_eq!(h.fetcher.calls(), 1, "concurrent demand must collapse to one fetch");
}

#[tokio::test]
async fn fresh_record_returned_without_fetch() {
    let h = harness(vec!["alice"], Duration::ZERO, Duration::from_secs(60));
    let key = token("eth", "0xabc", "7");

    h.store
        .write_record(&key, &TokenRecord::from_fetched(fetched("alice"), chrono::Utc::now()))
        .await
        .expect("seed record");

    let record = h.coordinator.get_token_record(&key).await.expect("hit");
    assert_eq!(record.access.owner, "alice");
    assert_eq!(h.fetcher.calls(), 0, "fresh hits must not fetch");

    let stats = h.coordinator.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.refreshes, 0);
}

#[tokio::test]
async fn stale_record_triggers_exactly_one_refresh() {
    let h = harness(vec!["bob"], Duration::ZERO, Duration::from_millis(100));
    let key = token("eth", "0xabc", "7");

    let old = TokenRecord::from_fetched(
        fetched("alice"),
        chrono::Utc::now() - chrono::TimeDelta::seconds(10),
    );
    h.store.write_record(&key, &old).await.expect("seed record");

    let record = h.coordinator.get_token_record(&key).await.expect("refresh");
    assert_eq!(record.access.owner, "bob");
    assert_eq!(h.fetcher.calls(), 1);

    let stored = h
        .store
        .record(&key)
        .await
        .expect("read back")
        .expect("record present");
    assert_eq!(stored.access.owner, "bob");
    assert!(stored.fetched_at > old.fetched_at, "fetched_at must advance");
}

#[tokio::test]
async fn expired_lease_is_reclaimed_within_bounded_time() {
    let store = Arc::new(MemoryTokenStore::new());
    let locks = Arc::new(MemoryLockManager::new(LockConfig {
        lease: Duration::from_millis(150),
        retry_count: 10,
        retry_delay: Duration::from_millis(50),
        retry_jitter: Duration::from_millis(20),
        ..LockConfig::default()
    }));
    let fetcher = Arc::new(ScriptedFetcher::new(vec!["alice"], Duration::ZERO));
    let coordinator = CacheCoordinator::new(
        store,
        locks.clone(),
        fetcher.clone(),
        StalenessPolicy::default(),
    );

    let key = token("eth", "0xdead", "1");
    // A holder that crashes without releasing.
    let _abandoned = locks
        .try_acquire(&keyspace::lock_resource(&key))
        .await
        .expect("simulated crashed holder");

    let started = Instant::now();
    let record = coordinator
        .get_token_record(&key)
        .await
        .expect("recovered after lease expiry");
    assert_eq!(record.access.owner, "alice");
    assert_eq!(fetcher.calls(), 1);
    // Lease duration plus a retry cycle, with generous scheduling headroom.
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn contention_falls_back_to_stale_record() {
    let store = Arc::new(MemoryTokenStore::new());
    let locks = Arc::new(MemoryLockManager::new(LockConfig {
        lease: Duration::from_secs(30),
        retry_count: 1,
        retry_delay: Duration::from_millis(10),
        retry_jitter: Duration::from_millis(5),
        ..LockConfig::default()
    }));
    let fetcher = Arc::new(ScriptedFetcher::new(vec!["bob"], Duration::ZERO));
    let coordinator = CacheCoordinator::new(
        store.clone(),
        locks.clone(),
        fetcher.clone(),
        StalenessPolicy::new(Duration::from_millis(50)),
    );

    let key = token("eth", "0xabc", "9");
    let stale = TokenRecord::from_fetched(
        fetched("alice"),
        chrono::Utc::now() - chrono::TimeDelta::seconds(10),
    );
    store.write_record(&key, &stale).await.expect("seed record");

    // Another process is mid-refresh and holds the lease.
    let held = locks
        .try_acquire(&keyspace::lock_resource(&key))
        .await
        .expect("competing holder");

    let record = coordinator
        .get_token_record(&key)
        .await
        .expect("stale fallback");
    assert_eq!(record.access.owner, "alice", "stale value served under contention");
    assert_eq!(fetcher.calls(), 0);
    assert_eq!(coordinator.stats().stale_fallbacks, 1);

    locks.release(held).await;
}

#[tokio::test]
async fn contention_with_no_record_is_temporarily_unavailable() {
    let store = Arc::new(MemoryTokenStore::new());
    let locks = Arc::new(MemoryLockManager::new(LockConfig {
        lease: Duration::from_secs(30),
        retry_count: 1,
        retry_delay: Duration::from_millis(10),
        retry_jitter: Duration::from_millis(5),
        ..LockConfig::default()
    }));
    let fetcher = Arc::new(ScriptedFetcher::new(vec!["bob"], Duration::ZERO));
    let coordinator = CacheCoordinator::new(
        store,
        locks.clone(),
        fetcher.clone(),
        StalenessPolicy::default(),
    );

    let key = token("eth", "0xabc", "9");
    let held = locks
        .try_acquire(&keyspace::lock_resource(&key))
        .await
        .expect("competing holder");

    let result = coordinator.get_token_record(&key).await;
    assert!(matches!(
        result,
        Err(CacheError::TemporarilyUnavailable { .. })
    ));
    assert_eq!(fetcher.calls(), 0);

    locks.release(held).await;
}

#[tokio::test]
async fn fetch_failure_releases_lease_and_caches_nothing() {
    let store = Arc::new(MemoryTokenStore::new());
    let locks = Arc::new(MemoryLockManager::new(test_lock_config()));

    let mut mock = MockFetcher::new();
    let mut calls = 0u32;
    mock.expect_fetch_token().times(2).returning(move |_| {
        calls += 1;
        if calls == 1 {
            Err(FetchError::Http {
                message: "upstream reset".to_string(),
            })
        } else {
            Ok(fetched("alice"))
        }
    });
    let coordinator = CacheCoordinator::new(
        store.clone(),
        locks,
        Arc::new(mock),
        StalenessPolicy::default(),
    );

    let key = token("eth", "0xabc", "3");
    let result = coordinator.get_token_record(&key).await;
    assert!(matches!(result, Err(CacheError::UpstreamFetchFailed { .. })));
    assert_eq!(
        store.record(&key).await.expect("read"),
        None,
        "failures must not be cached"
    );

    // The lease was released on failure, so the retry refreshes immediately
    // instead of waiting out a lease.
    let record = coordinator.get_token_record(&key).await.expect("retry succeeds");
    assert_eq!(record.access.owner, "alice");
}

#[tokio::test]
async fn upstream_not_found_is_surfaced_and_not_cached() {
    let store = Arc::new(MemoryTokenStore::new());
    let locks = Arc::new(MemoryLockManager::new(test_lock_config()));

    let mut mock = MockFetcher::new();
    mock.expect_fetch_token().times(1).returning(|key| {
        Err(FetchError::NotFound {
            key: key.to_string(),
        })
    });
    let coordinator = CacheCoordinator::new(
        store.clone(),
        locks,
        Arc::new(mock),
        StalenessPolicy::default(),
    );

    let key = token("eth", "0xabc", "404");
    let result = coordinator.get_token_record(&key).await;
    assert!(matches!(result, Err(CacheError::NotFound { .. })));
    assert_eq!(store.record(&key).await.expect("read"), None);
}

#[tokio::test]
async fn store_read_failure_degrades_to_refresh() {
    let store = Arc::new(FlakyStore::new());
    let locks = Arc::new(MemoryLockManager::new(test_lock_config()));
    let fetcher = Arc::new(ScriptedFetcher::new(vec!["alice"], Duration::ZERO));
    let coordinator = CacheCoordinator::new(
        store.clone(),
        locks,
        fetcher.clone(),
        StalenessPolicy::default(),
    );

    let key = token("eth", "0xabc", "1");
    store.fail_reads.store(true, Ordering::SeqCst);

    let record = coordinator.get_token_record(&key).await.expect("refresh");
    assert_eq!(record.access.owner, "alice");
    assert_eq!(fetcher.calls(), 1, "unreadable store must force a fetch");
}

#[tokio::test]
async fn store_write_failure_still_serves_fetched_value() {
    let store = Arc::new(FlakyStore::new());
    let locks = Arc::new(MemoryLockManager::new(test_lock_config()));
    let fetcher = Arc::new(ScriptedFetcher::new(vec!["alice"], Duration::ZERO));
    let coordinator = CacheCoordinator::new(
        store.clone(),
        locks,
        fetcher.clone(),
        StalenessPolicy::default(),
    );

    let key = token("eth", "0xabc", "1");
    store.fail_writes.store(true, Ordering::SeqCst);

    let record = coordinator.get_token_record(&key).await.expect("value survives write failure");
    assert_eq!(record.access.owner, "alice");
    assert_eq!(coordinator.stats().write_failures, 1);
    assert_eq!(
        store.record(&key).await.expect("read"),
        None,
        "nothing was persisted"
    );
}

#[tokio::test]
async fn index_reflects_all_refreshed_tokens() {
    let h = harness(vec!["alice"], Duration::ZERO, Duration::from_secs(60));
    let enumerator = CollectionEnumerator::new(h.store.clone());

    let mut expected = Vec::new();
    for id in ["1", "2", "3", "4", "5"] {
        let key = token("terra-2", "terra1punks", id);
        h.coordinator.get_token_record(&key).await.expect("refresh");
        expected.push(key);
    }
    // Refreshing the same token twice must not duplicate index entries.
    h.coordinator
        .get_token_record(&expected[0])
        .await
        .expect("repeat lookup");

    let collection =
        CollectionKey::collection(network("terra-2"), "terra1punks").expect("collection key");
    let mut tokens = enumerator.all_tokens(&collection).await.expect("enumerate");
    tokens.sort();
    expected.sort();
    assert_eq!(tokens, expected);
}

#[tokio::test]
async fn network_wide_enumeration_spans_collections() {
    let h = harness(vec!["alice"], Duration::ZERO, Duration::from_secs(60));
    let enumerator = CollectionEnumerator::new(h.store.clone());

    let a1 = token("terra-2", "terra1punks", "1");
    let a2 = token("terra-2", "terra1punks", "2");
    let b1 = token("terra-2", "terra1apes", "9");
    let other_network = token("eth", "0xabc", "1");
    for key in [&a1, &a2, &b1, &other_network] {
        h.coordinator.get_token_record(key).await.expect("refresh");
    }

    let everything = enumerator
        .all_tokens(&CollectionKey::network_wide(network("terra-2")))
        .await
        .expect("enumerate network");
    assert_eq!(everything, vec![b1, a1, a2]);

    let unknown = enumerator
        .all_tokens(&CollectionKey::collection(network("terra-2"), "terra1ghosts").expect("key"))
        .await
        .expect("enumerate unknown");
    assert!(unknown.is_empty());
}

#[tokio::test]
async fn owner_rotation_over_ttl_boundaries() {
    // Compressed version of the reference scenario: TTL 60s becomes 150ms.
    let h = harness(
        vec!["alice", "bob"],
        Duration::ZERO,
        Duration::from_millis(150),
    );
    let key = token("eth", "0xabc", "1");

    let first = h.coordinator.get_token_record(&key).await.expect("initial fetch");
    assert_eq!(first.access.owner, "alice");
    assert_eq!(h.fetcher.calls(), 1);

    // Within the TTL: served from the store, no fetch.
    let second = h.coordinator.get_token_record(&key).await.expect("cached");
    assert_eq!(second.access.owner, "alice");
    assert_eq!(h.fetcher.calls(), 1);

    tokio::time::sleep(Duration::from_millis(200)).await;

    // Past the TTL: exactly one refresh, owner change becomes visible.
    let third = h.coordinator.get_token_record(&key).await.expect("refreshed");
    assert_eq!(third.access.owner, "bob");
    assert_eq!(h.fetcher.calls(), 2);
    assert!(third.fetched_at > first.fetched_at);
}
