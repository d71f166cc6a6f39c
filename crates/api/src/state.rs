// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Server state management module
//!
//! Shared application state for the query surface: the cache coordinator and
//! collection enumerator (both holding the process-wide store handle opened
//! at startup), the upstream fetcher for health probes, and the cancellation
//! token for coordinated shutdown.

use std::{collections::HashMap, sync::Arc};

use fetch_client::TokenFetcher;
use serde::{Deserialize, Serialize};
use token_cache::{CacheCoordinator, CollectionEnumerator, CoordinatorStats};
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;

use crate::config::{Environment, ServerConfig};

/// Shared application state with cancellation token support
#[derive(Debug, Clone)]
pub struct ServerState {
    /// Server configuration
    config: ServerConfig,
    /// Cache coordinator answering per-token queries
    coordinator: Arc<CacheCoordinator>,
    /// Collection enumerator answering per-collection queries
    enumerator: Arc<CollectionEnumerator>,
    /// Upstream fetcher, kept for health probes
    fetcher: Arc<dyn TokenFetcher>,
    /// Cancellation token for coordinated shutdown
    pub cancellation_token: CancellationToken,
}

impl ServerState {
    /// Create new server state
    pub fn new(
        config: ServerConfig,
        coordinator: Arc<CacheCoordinator>,
        enumerator: Arc<CollectionEnumerator>,
        fetcher: Arc<dyn TokenFetcher>,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            config,
            coordinator,
            enumerator,
            fetcher,
            cancellation_token,
        }
    }

    /// Server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The cache coordinator
    pub fn coordinator(&self) -> &Arc<CacheCoordinator> {
        &self.coordinator
    }

    /// The collection enumerator
    pub fn enumerator(&self) -> &Arc<CollectionEnumerator> {
        &self.enumerator
    }

    /// Perform health check operations
    pub async fn health_check(&self) -> HealthCheck {
        let mut upstreams = HashMap::new();
        let status = match self.fetcher.health_check().await {
            Ok(status) => Self::convert_health_status(status),
            Err(error) => HealthStatus::Down {
                reason: format!("health check failed: {error}").into_boxed_str(),
            },
        };
        upstreams.insert(self.fetcher.name().to_string(), status);

        HealthCheck {
            status: HealthStatus::Up,
            version: Box::from(env!("CARGO_PKG_VERSION")),
            environment: self.config.environment,
            timestamp: chrono::Utc::now().to_rfc3339(),
            upstreams,
            cache: self.coordinator.stats(),
        }
    }

    fn convert_health_status(status: fetch_client::HealthStatus) -> HealthStatus {
        match status {
            fetch_client::HealthStatus::Up => HealthStatus::Up,
            fetch_client::HealthStatus::Degraded { reason } => HealthStatus::Degraded {
                reason: reason.into_boxed_str(),
            },
            fetch_client::HealthStatus::Down { reason } => HealthStatus::Down {
                reason: reason.into_boxed_str(),
            },
        }
    }
}

/// Health status of a service or dependency
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub enum HealthStatus {
    /// Service is fully operational and responding normally
    Up,

    /// Service is not operational or has critical failures
    Down {
        /// Human-readable explanation of why the service is down
        reason: Box<str>,
    },

    /// Service is operational but experiencing performance issues or partial failures
    Degraded {
        /// Human-readable explanation of the degradation condition
        reason: Box<str>,
    },
}

/// Health check status
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthCheck {
    /// Service status
    pub status: HealthStatus,
    /// Service version
    pub version: Box<str>,
    /// Environment
    pub environment: Environment,
    /// Timestamp
    pub timestamp: String,
    /// Status of each upstream data source
    #[schema(value_type = Object)]
    pub upstreams: HashMap<String, HealthStatus>,
    /// Cache coordinator counters
    #[schema(value_type = Object)]
    pub cache: CoordinatorStats,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use token_cache::{MemoryLockManager, MemoryTokenStore, StalenessPolicy};

    use super::*;

    #[derive(Debug)]
    struct UnreachableFetcher;

    #[async_trait::async_trait]
    impl TokenFetcher for UnreachableFetcher {
        async fn fetch_token(
            &self,
            _key: &shared_types::TokenKey,
        ) -> Result<fetch_client::FetchedToken, fetch_client::FetchError> {
            Err(fetch_client::FetchError::Http {
                message: "unreachable".to_string(),
            })
        }

        async fn health_check(
            &self,
        ) -> Result<fetch_client::HealthStatus, fetch_client::FetchError> {
            Ok(fetch_client::HealthStatus::Down {
                reason: "offline".to_string(),
            })
        }

        fn name(&self) -> &'static str {
            "unreachable"
        }
    }

    fn test_state() -> ServerState {
        let store = Arc::new(MemoryTokenStore::new());
        let locks = Arc::new(MemoryLockManager::default());
        let fetcher = Arc::new(UnreachableFetcher);
        let coordinator = Arc::new(CacheCoordinator::new(
            store.clone(),
            locks,
            fetcher.clone(),
            StalenessPolicy::default(),
        ));
        let enumerator = Arc::new(CollectionEnumerator::new(store));
        ServerState::new(
            ServerConfig::for_testing(),
            coordinator,
            enumerator,
            fetcher,
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn health_check_reports_upstream_status() {
        let state = test_state();
        let health = state.health_check().await;

        assert_eq!(health.status, HealthStatus::Up);
        assert!(matches!(
            health.upstreams.get("unreachable"),
            Some(HealthStatus::Down { .. })
        ));
    }

    #[test]
    fn cancellation_tokens_are_linked() {
        let state = test_state();
        assert!(!state.cancellation_token.is_cancelled());
        state.cancellation_token.cancel();
        assert!(state.cancellation_token.is_cancelled());
    }
}
