// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Read-through NFT state cache with distributed single-flight refresh
//!
//! This crate is the coordination core of the service. It decides when cached
//! token state is stale, refreshes it from the authoritative source exactly
//! once per key under concurrent demand, and writes results back to a shared
//! store consistently.
//!
//! # Components
//!
//! - [`store::TokenStore`]: the shared key-value store seam, with
//!   [`redis::RedisTokenStore`] for deployments and
//!   [`memory::MemoryTokenStore`] for tests and single-node runs.
//! - [`lock::LockManager`]: lease-based distributed mutual exclusion with
//!   bounded, jittered acquisition retries. Leases expire on their own, so a
//!   crashed holder never wedges a key.
//! - [`coordinator::CacheCoordinator`]: the read-through path: check,
//!   lock, double-check, fetch once, write back, release.
//! - [`enumerator::CollectionEnumerator`]: lock-free enumeration of the
//!   per-collection token indexes maintained by the coordinator.
//!
//! # Coherence contract
//!
//! Writes to a token's record happen only while holding that token's lease.
//! Collection-index adds are idempotent and ride inside the same critical
//! section, immediately after the record write. Reads take no locks at all.

pub mod coordinator;
pub mod enumerator;
pub mod error;
pub mod lock;
pub mod memory;
pub mod redis;
pub mod store;

pub use coordinator::{CacheCoordinator, CoordinatorStats, StalenessPolicy};
pub use enumerator::CollectionEnumerator;
pub use error::{CacheError, StoreError};
pub use lock::{LockConfig, LockError, LockHandle, LockManager};
pub use memory::{MemoryLockManager, MemoryTokenStore};
pub use self::redis::{RedisLockManager, RedisTokenStore, connect_shared};
pub use store::TokenStore;
