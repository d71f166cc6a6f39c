// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Indexer HTTP client
//!
//! Speaks the indexer's token endpoint
//! (`GET {base}/{network}/tokens/{address}/{token_id}`) and its `/status`
//! health probe. Transient failures (5xx, rate limits, transport errors) are
//! retried with exponential backoff and jitter, bounded by configuration;
//! definitive answers (404, 401) are never retried.

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use fetch_client::{
    FetchError, FetchedToken, HealthStatus, TokenAccess, TokenFetcher, TokenMetadata,
};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use shared_types::TokenKey;
use thiserror::Error;
use tokio::time::timeout;
use tokio_retry::{
    RetryIf,
    strategy::{ExponentialBackoff, jitter},
};
use tracing::{debug, warn};
use url::Url;

const RETRY_BASE_DELAY_MS: u64 = 100;

/// Configuration for the indexer client
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Base URL of the indexer API
    pub base_url: String,
    /// Optional bearer token for authenticated indexers
    pub api_key: Option<String>,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Health check timeout in seconds
    pub health_check_timeout_seconds: u64,
    /// Maximum number of retry attempts for transient failures
    pub max_retries: u32,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:1317".to_string(),
            api_key: None,
            timeout_seconds: 30,
            health_check_timeout_seconds: 5,
            max_retries: 3,
        }
    }
}

/// Errors specific to the indexer client
#[derive(Debug, Error)]
pub enum IndexerError {
    /// HTTP transport failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The indexer reported that the token does not exist
    #[error("token {key} not found")]
    NotFound {
        /// Canonical key of the missing token
        key: String,
    },

    /// The indexer returned an unexpected error status
    #[error("indexer error: {status} - {message}")]
    Api {
        /// HTTP status returned
        status: u16,
        /// Response body, if any
        message: String,
    },

    /// The indexer answered 200 with a body we could not decode
    #[error("invalid indexer response: {message}")]
    InvalidResponse {
        /// Decoding failure details
        message: String,
    },

    /// Rate limit exceeded
    #[error("rate limit exceeded")]
    RateLimited,

    /// Authentication failed
    #[error("authentication failed")]
    Unauthorized,

    /// Configuration was invalid
    #[error("configuration error: {0}")]
    Config(String),

    /// Request exceeded its deadline
    #[error("request timeout after {seconds} seconds")]
    Timeout {
        /// The deadline that was exceeded
        seconds: u64,
    },
}

impl IndexerError {
    /// Whether retrying could plausibly change the outcome
    fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::RateLimited | Self::Timeout { .. } => true,
            Self::Api { status, .. } => *status >= 500,
            Self::NotFound { .. }
            | Self::InvalidResponse { .. }
            | Self::Unauthorized
            | Self::Config(_) => false,
        }
    }
}

impl From<IndexerError> for FetchError {
    fn from(value: IndexerError) -> Self {
        match value {
            IndexerError::Http(error) => FetchError::Http {
                message: error.to_string(),
            },
            IndexerError::NotFound { key } => FetchError::NotFound { key },
            IndexerError::Api { status, message } => FetchError::Custom {
                error: anyhow::Error::msg(format!("{status}: {message}")),
            },
            IndexerError::InvalidResponse { message } => FetchError::InvalidResponse { message },
            IndexerError::RateLimited => FetchError::RateLimited {
                retry_after_seconds: 3,
            },
            IndexerError::Unauthorized => FetchError::Configuration {
                message: "indexer rejected credentials".to_string(),
            },
            IndexerError::Config(message) => FetchError::Configuration { message },
            IndexerError::Timeout { seconds } => FetchError::Timeout {
                timeout_seconds: seconds,
            },
        }
    }
}

/// Token state as the indexer serves it
#[derive(Debug, Deserialize)]
struct IndexerTokenResponse {
    name: Option<String>,
    description: Option<String>,
    image: Option<String>,
    owner: String,
    approved: Option<String>,
    #[serde(flatten)]
    extra: HashMap<String, serde_json::Value>,
}

impl From<IndexerTokenResponse> for FetchedToken {
    fn from(value: IndexerTokenResponse) -> Self {
        Self {
            info: TokenMetadata {
                name: value.name,
                description: value.description,
                image: value.image,
                extra: value.extra,
            },
            access: TokenAccess {
                owner: value.owner,
                approved: value.approved,
            },
        }
    }
}

/// [`TokenFetcher`] implementation over an indexer's HTTP API
#[derive(Debug)]
pub struct IndexerClient {
    client: Client,
    config: IndexerConfig,
}

impl IndexerClient {
    /// Create a new indexer client
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL does not parse, credentials are
    /// blank, or the HTTP client cannot be constructed.
    pub fn new(config: IndexerConfig) -> Result<Self, IndexerError> {
        Url::parse(&config.base_url)
            .map_err(|e| IndexerError::Config(format!("invalid base URL: {e}")))?;
        if let Some(api_key) = &config.api_key {
            if api_key.trim().is_empty() {
                return Err(IndexerError::Config(
                    "API key cannot be blank when set".to_string(),
                ));
            }
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent("nft-state-api/0.1.0")
            .build()
            .map_err(IndexerError::Http)?;

        Ok(Self { client, config })
    }

    /// One fetch attempt with no retries
    async fn fetch_once(&self, key: &TokenKey) -> Result<IndexerTokenResponse, IndexerError> {
        let url = format!(
            "{}/{}/tokens/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            key.network,
            key.address,
            key.token_id
        );
        debug!(url, "fetching token state from indexer");

        let mut request = self.client.get(&url).header("accept", "application/json");
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = timeout(
            Duration::from_secs(self.config.timeout_seconds),
            request.send(),
        )
        .await
        .map_err(|_| IndexerError::Timeout {
            seconds: self.config.timeout_seconds,
        })?
        .map_err(IndexerError::Http)?;

        match response.status() {
            StatusCode::OK => response.json().await.map_err(|e| {
                if e.is_decode() {
                    IndexerError::InvalidResponse {
                        message: e.to_string(),
                    }
                } else {
                    IndexerError::Http(e)
                }
            }),
            StatusCode::NOT_FOUND => Err(IndexerError::NotFound {
                key: key.to_string(),
            }),
            StatusCode::UNAUTHORIZED => Err(IndexerError::Unauthorized),
            StatusCode::TOO_MANY_REQUESTS => Err(IndexerError::RateLimited),
            status => {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown error".to_string());
                warn!(status = status.as_u16(), message, "indexer error response");
                Err(IndexerError::Api {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }

    fn retry_strategy(&self) -> impl Iterator<Item = Duration> {
        ExponentialBackoff::from_millis(RETRY_BASE_DELAY_MS)
            .max_delay(Duration::from_secs(10))
            .take(self.config.max_retries as usize)
            .map(jitter)
    }
}

#[async_trait]
impl TokenFetcher for IndexerClient {
    async fn fetch_token(&self, key: &TokenKey) -> Result<FetchedToken, FetchError> {
        let response = RetryIf::spawn(
            self.retry_strategy(),
            || self.fetch_once(key),
            IndexerError::is_transient,
        )
        .await?;
        Ok(response.into())
    }

    async fn health_check(&self) -> Result<HealthStatus, FetchError> {
        let url = format!("{}/status", self.config.base_url.trim_end_matches('/'));
        debug!(url, "probing indexer health");

        let start = std::time::Instant::now();
        let response = timeout(
            Duration::from_secs(self.config.health_check_timeout_seconds),
            self.client.get(&url).send(),
        )
        .await
        .map_err(|_| {
            FetchError::from(IndexerError::Timeout {
                seconds: self.config.health_check_timeout_seconds,
            })
        })?
        .map_err(|e| FetchError::from(IndexerError::Http(e)))?;

        match response.status() {
            StatusCode::OK => {
                debug!(elapsed = ?start.elapsed(), "indexer health check passed");
                Ok(HealthStatus::Up)
            }
            StatusCode::UNAUTHORIZED => Ok(HealthStatus::Down {
                reason: "authentication failed".to_string(),
            }),
            StatusCode::TOO_MANY_REQUESTS => Ok(HealthStatus::Degraded {
                reason: "rate limited".to_string(),
            }),
            status => Ok(HealthStatus::Degraded {
                reason: format!("indexer returned status {}", status.as_u16()),
            }),
        }
    }

    fn name(&self) -> &'static str {
        "indexer"
    }
}
