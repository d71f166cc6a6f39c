// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Lease-based distributed mutual exclusion
//!
//! Locks here are leases: time-bounded exclusive grants on a named resource
//! that expire on their own. A holder that crashes or is abandoned never
//! needs manual cleanup; the lease lapses and the next acquirer takes over.
//! Acquisition retries are bounded and jittered so contending processes do
//! not retry in lockstep.

use std::{
    fmt,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use rand::Rng;
use thiserror::Error;
use uuid::Uuid;

/// Tuning for lease acquisition and validity
///
/// All values are externally supplied; the coordinator hardcodes none of
/// them.
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// How long an acquired lease is valid before it expires on its own
    pub lease: Duration,
    /// How many times acquisition is retried after the initial attempt
    pub retry_count: u32,
    /// Fixed delay between acquisition attempts
    pub retry_delay: Duration,
    /// Upper bound of the random jitter added to each retry delay
    pub retry_jitter: Duration,
    /// Expected clock drift as a fraction of the lease duration
    pub drift_factor: f64,
    /// Remaining validity below which a working holder extends its lease
    pub extension_threshold: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            lease: Duration::from_secs(10),
            retry_count: 1,
            retry_delay: Duration::from_millis(200),
            retry_jitter: Duration::from_millis(200),
            drift_factor: 0.01,
            extension_threshold: Duration::from_millis(500),
        }
    }
}

impl LockConfig {
    /// Lease validity after subtracting the drift allowance
    ///
    /// Matches the Redlock validity formula: the holder must assume its
    /// lease ends `lease * drift_factor` (plus a small constant) early.
    pub fn effective_validity(&self) -> Duration {
        let drift = self.lease.mul_f64(self.drift_factor) + Duration::from_millis(2);
        self.lease.saturating_sub(drift)
    }
}

/// A held lease on a named resource
///
/// Ephemeral and never persisted; valid only for the duration of one refresh
/// operation. Dropping a handle without releasing is safe; the lease simply
/// expires.
#[derive(Debug)]
pub struct LockHandle {
    resource: String,
    token: Uuid,
    valid_until: Instant,
}

impl LockHandle {
    /// Create a handle for a freshly granted lease
    pub(crate) fn granted(resource: String, token: Uuid, validity: Duration) -> Self {
        Self {
            resource,
            token,
            valid_until: Instant::now() + validity,
        }
    }

    /// The locked resource name
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// The fencing token identifying this grant
    pub fn token(&self) -> Uuid {
        self.token
    }

    /// Remaining validity, zero once the lease may have lapsed
    pub fn remaining(&self) -> Duration {
        self.valid_until.saturating_duration_since(Instant::now())
    }

    /// Whether a working holder should extend before continuing
    pub fn needs_extension(&self, threshold: Duration) -> bool {
        self.remaining() < threshold
    }

    /// Re-arm the handle after a successful extension
    pub(crate) fn extended(&mut self, validity: Duration) {
        self.valid_until = Instant::now() + validity;
    }
}

/// Errors from lease operations
#[derive(Debug, Error)]
pub enum LockError {
    /// Another process currently holds the lease
    #[error("resource {resource} is held by another process")]
    Contended {
        /// The contended resource name
        resource: String,
    },

    /// Acquisition retries were exhausted
    #[error("could not acquire {resource} after {attempts} attempts")]
    RetriesExhausted {
        /// The contended resource name
        resource: String,
        /// Total attempts made, including the first
        attempts: u32,
    },

    /// The lease was lost before it could be extended or released
    #[error("lease on {resource} is no longer held")]
    LeaseLost {
        /// The resource whose lease lapsed
        resource: String,
    },

    /// The lock service itself failed
    #[error("lock service error: {message}")]
    Backend {
        /// Underlying failure description
        message: String,
    },
}

/// Grants exclusive, time-bounded leases on named resources
///
/// Usable by multiple independent server processes: the lease state lives
/// outside the process (or, for [`crate::MemoryLockManager`], is scoped to
/// one process by construction).
#[async_trait]
pub trait LockManager: Send + Sync + fmt::Debug {
    /// One acquisition attempt, no retries
    async fn try_acquire(&self, resource: &str) -> Result<LockHandle, LockError>;

    /// Extend a held lease to a full validity window
    ///
    /// Fails with [`LockError::LeaseLost`] if the lease already lapsed and
    /// someone else took it (or the resource was reclaimed).
    async fn extend(&self, handle: &mut LockHandle) -> Result<(), LockError>;

    /// Release a held lease, best effort
    ///
    /// A failed release is not an error worth surfacing: the lease expires
    /// on its own within its validity window.
    async fn release(&self, handle: LockHandle);

    /// The acquisition and validity tuning this manager applies
    fn lock_config(&self) -> &LockConfig;

    /// Acquire with bounded, jittered retries
    ///
    /// Makes one attempt plus `retry_count` retries, sleeping
    /// `retry_delay + jitter` between attempts with jitter drawn uniformly
    /// from `[0, retry_jitter)` per attempt.
    async fn acquire(&self, resource: &str) -> Result<LockHandle, LockError> {
        let config = self.lock_config().clone();
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match self.try_acquire(resource).await {
                Ok(handle) => return Ok(handle),
                Err(LockError::Contended { resource }) => {
                    if attempts > config.retry_count {
                        return Err(LockError::RetriesExhausted { resource, attempts });
                    }
                    let jitter = config.retry_jitter.mul_f64(rand::thread_rng().r#gen::<f64>());
                    tokio::time::sleep(config.retry_delay + jitter).await;
                }
                Err(other) => return Err(other),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_validity_subtracts_drift() {
        let config = LockConfig {
            lease: Duration::from_secs(10),
            drift_factor: 0.01,
            ..LockConfig::default()
        };
        // 10s - (100ms drift + 2ms constant)
        assert_eq!(config.effective_validity(), Duration::from_millis(9898));
    }

    #[test]
    fn effective_validity_saturates() {
        let config = LockConfig {
            lease: Duration::from_millis(1),
            drift_factor: 1.0,
            ..LockConfig::default()
        };
        assert_eq!(config.effective_validity(), Duration::ZERO);
    }

    #[test]
    fn handle_expiry_accounting() {
        let mut handle = LockHandle::granted(
            "lease:nft:eth:0xabc:1".to_string(),
            Uuid::new_v4(),
            Duration::from_millis(50),
        );
        assert!(handle.remaining() <= Duration::from_millis(50));
        assert!(handle.needs_extension(Duration::from_millis(100)));
        assert!(!handle.needs_extension(Duration::from_millis(1)));

        handle.extended(Duration::from_secs(5));
        assert!(handle.remaining() > Duration::from_secs(4));
        assert!(!handle.needs_extension(Duration::from_millis(500)));
    }
}
