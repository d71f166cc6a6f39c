// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Server implementation module
//!
//! The main server struct and lifecycle: wiring the cache core from
//! configuration (Redis store, Redis lease manager, indexer fetcher), the
//! middleware stack, and coordinated graceful shutdown using
//! `CancellationToken`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{Router, http::HeaderName};
use chain_indexer::IndexerClient;
use fetch_client::TokenFetcher;
use hyper::Request;
use token_cache::{
    CacheCoordinator, CollectionEnumerator, LockManager, TokenStore, connect_shared,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, info_span, warn};

use crate::{
    config::ServerConfig,
    error::{ServerError, ServerResult},
    routes::create_routes,
    state::ServerState,
};

// Server constants
const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");
const DEFAULT_GRACEFUL_SHUTDOWN_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_FORCE_SHUTDOWN_TIMEOUT_SECONDS: u64 = 5;

/// Configuration for server shutdown behavior
#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// Maximum time to wait for graceful shutdown before forcing termination
    pub graceful_timeout: Duration,
    /// Maximum time to wait for all tasks to complete after graceful shutdown
    pub force_timeout: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            graceful_timeout: Duration::from_secs(DEFAULT_GRACEFUL_SHUTDOWN_TIMEOUT_SECONDS),
            force_timeout: Duration::from_secs(DEFAULT_FORCE_SHUTDOWN_TIMEOUT_SECONDS),
        }
    }
}

/// Main server struct
#[derive(Debug)]
#[allow(dead_code)]
pub struct Server {
    /// Server configuration
    config: ServerConfig,
    /// Application router
    router: Router,
    /// Server state
    state: ServerState,
    /// Cancellation token for coordinated shutdown
    cancellation_token: CancellationToken,
    /// Configuration for coordinated shutdown
    graceful_shutdown_config: ShutdownConfig,
}

impl Server {
    /// Create a new server wired to Redis and the configured indexer
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Config` if the store, lock manager, or indexer
    /// client cannot be constructed.
    pub async fn new(config: ServerConfig, shutdown_config: ShutdownConfig) -> ServerResult<Self> {
        let (store, locks) = connect_shared(&config.store.url, config.lock.lock_config())
            .await
            .map_err(|e| ServerError::Config {
                message: format!("failed to connect to store: {e}"),
            })?;

        let fetcher =
            IndexerClient::new(config.indexer.client_config()).map_err(|e| ServerError::Config {
                message: format!("failed to create indexer client: {e}"),
            })?;

        Self::with_components(
            config,
            shutdown_config,
            Arc::new(store),
            Arc::new(locks),
            Arc::new(fetcher),
        )
    }

    /// Create a server with injected store, lock manager, and fetcher
    ///
    /// Used by tests to wire in-memory backends, and by deployments that
    /// bring their own implementations of the seams.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Config` if the configuration is invalid.
    pub fn with_components(
        config: ServerConfig,
        graceful_shutdown_config: ShutdownConfig,
        store: Arc<dyn TokenStore>,
        locks: Arc<dyn LockManager>,
        fetcher: Arc<dyn TokenFetcher>,
    ) -> ServerResult<Self> {
        let coordinator = Arc::new(CacheCoordinator::new(
            store.clone(),
            locks,
            fetcher.clone(),
            config.cache.staleness_policy(),
        ));
        let enumerator = Arc::new(CollectionEnumerator::new(store));

        let cancellation_token = CancellationToken::new();
        let state = ServerState::new(
            config.clone(),
            coordinator,
            enumerator,
            fetcher,
            cancellation_token.child_token(),
        );
        let router = Self::create_router(state.clone());

        Ok(Self {
            config,
            router,
            state,
            cancellation_token,
            graceful_shutdown_config,
        })
    }

    /// Create application router with middleware
    fn create_router(state: ServerState) -> Router {
        let timeout_duration = state.config().timeout_seconds.value();

        let middleware = ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER, MakeRequestUuid))
            .layer(
                TraceLayer::new_for_http().make_span_with(|req: &Request<_>| {
                    if let Some(request_id) = req.headers().get(REQUEST_ID_HEADER) {
                        info_span!("http_request", ?request_id)
                    } else {
                        tracing::error!("failed to extract id from request");
                        info_span!("http_request", request_id = "unknown")
                    }
                }),
            )
            .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER))
            .layer(CorsLayer::permissive())
            .layer(TimeoutLayer::new(timeout_duration));

        create_routes().layer(middleware).with_state(state)
    }

    /// Run the server with coordinated graceful shutdown
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Bind` if unable to bind to the configured
    /// address, or `ServerError::Startup` if the server fails to start.
    pub async fn run(self) -> ServerResult<()> {
        let addr = self.config.socket_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                address: addr,
                source,
            })?;

        let actual_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Startup { source })?;

        info!(
            address = %actual_addr,
            environment = %self.config.environment,
            "NFT state API server starting",
        );

        let cancellation_token = self.cancellation_token.clone();
        let shutdown_token = cancellation_token.clone();
        tokio::spawn(async move {
            info!("spawning the graceful shutdown task");
            Self::shutdown_signal_handler(shutdown_token).await;
        });

        let server_result = axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                cancellation_token.cancelled().await;
                info!("NFT state API server shut down gracefully");
            })
            .await;

        if let Err(e) = server_result {
            error!(error = ?e, "Server error during shutdown");
            Err(ServerError::Shutdown { source: e })
        } else {
            Ok(())
        }
    }

    /// Handle shutdown signals and trigger coordinated cancellation
    ///
    /// Listens for SIGINT (Ctrl+C) and SIGTERM, and cancels the provided
    /// cancellation token when either arrives.
    async fn shutdown_signal_handler(cancellation_token: CancellationToken) {
        let signal_received = async {
            #[cfg(unix)]
            #[allow(clippy::expect_used)]
            {
                use tokio::signal::unix::{SignalKind, signal};

                let mut sigterm =
                    signal(SignalKind::terminate()).expect("Failed to register SIGTERM handler");
                let mut sigint =
                    signal(SignalKind::interrupt()).expect("Failed to register SIGINT handler");

                tokio::select! {
                    _ = sigterm.recv() => {
                        warn!("Received SIGTERM signal, initiating coordinated shutdown");
                        "SIGTERM"
                    },
                    _ = sigint.recv() => {
                        warn!("Received SIGINT signal, initiating coordinated shutdown");
                        "SIGINT"
                    },
                }
            }

            #[cfg(not(unix))]
            #[allow(clippy::expect_used)]
            {
                tokio::signal::ctrl_c()
                    .await
                    .expect("Failed to install CTRL+C signal handler");
                warn!("Received CTRL+C signal, initiating coordinated shutdown");
                "CTRL+C"
            }
        };

        tokio::select! {
            signal_name = signal_received => {
                warn!("Shutdown signal {} received, cancelling all operations...", signal_name);
                cancellation_token.cancel();
            },
            () = cancellation_token.cancelled() => {
                warn!("Cancellation token already cancelled, shutdown signal handler exiting");
            }
        }
    }

    /// Returns a clone of the cancellation token for coordinated shutdown
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Initiates graceful shutdown by cancelling the server's cancellation token
    pub fn shutdown(&self) {
        info!("programmatic shutdown requested");
        self.cancellation_token.cancel();
    }

    /// Run server for testing, returns the bound address
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Bind` if unable to bind to the configured
    /// address.
    pub async fn run_for_testing(self) -> ServerResult<(SocketAddr, CancellationToken)> {
        let addr = self.config.socket_addr();

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                address: addr,
                source,
            })?;

        let actual_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Startup { source })?;

        let token = self.cancellation_token.child_token();
        let task = token.child_token();
        tokio::spawn(async move {
            let _ = axum::serve(listener, self.router)
                .with_graceful_shutdown(async move { task.cancelled().await })
                .await;
        });

        Ok((actual_addr, token))
    }

    /// Get server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get server state for testing
    pub fn state(&self) -> &ServerState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use token_cache::{MemoryLockManager, MemoryTokenStore};

    use super::*;
    use crate::config::Environment;

    #[derive(Debug)]
    struct NoopFetcher;

    #[async_trait::async_trait]
    impl TokenFetcher for NoopFetcher {
        async fn fetch_token(
            &self,
            key: &shared_types::TokenKey,
        ) -> Result<fetch_client::FetchedToken, fetch_client::FetchError> {
            Err(fetch_client::FetchError::NotFound {
                key: key.to_string(),
            })
        }

        async fn health_check(
            &self,
        ) -> Result<fetch_client::HealthStatus, fetch_client::FetchError> {
            Ok(fetch_client::HealthStatus::Up)
        }

        fn name(&self) -> &'static str {
            "noop"
        }
    }

    fn test_server() -> Server {
        Server::with_components(
            ServerConfig::for_testing(),
            ShutdownConfig::default(),
            Arc::new(MemoryTokenStore::new()),
            Arc::new(MemoryLockManager::default()),
            Arc::new(NoopFetcher),
        )
        .expect("Failed to create server")
    }

    #[tokio::test]
    async fn server_creation() {
        let server = test_server();
        assert_eq!(server.config().environment, Environment::Testing);
        assert!(!server.cancellation_token().is_cancelled());
    }

    #[tokio::test]
    async fn programmatic_shutdown() {
        let server = test_server();
        assert!(!server.cancellation_token().is_cancelled());
        server.shutdown();
        assert!(server.cancellation_token().is_cancelled());
    }

    #[tokio::test]
    async fn shutdown_config_default() {
        let config = ShutdownConfig::default();
        assert_eq!(
            config.graceful_timeout,
            Duration::from_secs(DEFAULT_GRACEFUL_SHUTDOWN_TIMEOUT_SECONDS)
        );
        assert_eq!(
            config.force_timeout,
            Duration::from_secs(DEFAULT_FORCE_SHUTDOWN_TIMEOUT_SECONDS)
        );
    }
}
