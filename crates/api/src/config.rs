// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Server configuration module
//!
//! Hierarchical configuration for the query surface and the cache core it
//! wires together: defaults, then `config.json`, then an environment-specific
//! file, then `SERVER__*` environment variables. Every tunable the cache
//! core consumes (TTL, lock lease and retry parameters, store and indexer
//! endpoints) arrives through here; nothing is hardcoded downstream.

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Duration,
};

use chain_indexer::IndexerConfig;
use config::{Config, ConfigError, Environment as ConfigEnv, File};
use serde::{Deserialize, Deserializer, Serialize, de};
use token_cache::{LockConfig, StalenessPolicy};

use crate::error::{ServerError, ServerResult};

/// A validated server port appropriate for the environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServerPort {
    port: u16,
    environment: Environment,
}

impl ServerPort {
    /// Create a new `ServerPort`, rejecting port 0 outside testing
    pub fn new(port: u16, environment: Environment) -> Result<Self, ConfigError> {
        if port == 0 && environment != Environment::Testing {
            return Err(ConfigError::Message(
                "port cannot be 0 in non-testing environments".to_string(),
            ));
        }
        Ok(Self { port, environment })
    }

    /// Default development port
    pub const fn default_development() -> Self {
        Self {
            port: 3000,
            environment: Environment::Development,
        }
    }

    /// Testing port (0 lets the OS choose)
    pub const fn testing() -> Self {
        Self {
            port: 0,
            environment: Environment::Testing,
        }
    }

    /// The port value
    pub fn value(&self) -> u16 {
        self.port
    }
}

impl<'de> Deserialize<'de> for ServerPort {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let port = u16::deserialize(deserializer)?;
        // The environment is applied during configuration loading.
        Ok(Self {
            port,
            environment: Environment::Development,
        })
    }
}

/// A validated request timeout in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeoutSeconds(Duration);

impl TimeoutSeconds {
    /// Create a new `TimeoutSeconds` within the valid 1-300 second range
    pub fn new(seconds: u64) -> Result<Self, ConfigError> {
        if seconds == 0 || seconds > 300 {
            return Err(ConfigError::Message(
                "timeout must be between 1 and 300 seconds".to_string(),
            ));
        }
        Ok(Self(Duration::from_secs(seconds)))
    }

    /// Default timeout (30 seconds)
    pub const fn default_value() -> Self {
        Self(Duration::from_secs(30))
    }

    /// Testing timeout (5 seconds)
    pub const fn testing() -> Self {
        Self(Duration::from_secs(5))
    }

    /// The timeout value
    pub fn value(&self) -> Duration {
        self.0
    }
}

impl Default for TimeoutSeconds {
    fn default() -> Self {
        Self::default_value()
    }
}

impl<'de> Deserialize<'de> for TimeoutSeconds {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let seconds = u64::deserialize(deserializer)?;
        Self::new(seconds).map_err(|e| de::Error::custom(e.to_string()))
    }
}

/// Environment types for configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Production environment
    Production,
    /// Development environment
    Development,
    /// Testing environment
    Testing,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Production => write!(f, "production"),
            Environment::Development => write!(f, "development"),
            Environment::Testing => write!(f, "testing"),
        }
    }
}

/// Shared store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Redis connection URL
    pub url: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
        }
    }
}

/// Record freshness settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Seconds before a cached record is considered stale
    pub ttl_seconds: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { ttl_seconds: 60 }
    }
}

impl CacheSettings {
    /// The staleness policy these settings describe
    pub fn staleness_policy(&self) -> StalenessPolicy {
        StalenessPolicy::new(Duration::from_secs(self.ttl_seconds))
    }
}

/// Distributed lock settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockSettings {
    /// Lease duration in milliseconds
    pub lease_ms: u64,
    /// Acquisition retries after the initial attempt
    pub retry_count: u32,
    /// Fixed delay between acquisition attempts, in milliseconds
    pub retry_delay_ms: u64,
    /// Upper bound of the random per-attempt jitter, in milliseconds
    pub retry_jitter_ms: u64,
    /// Expected clock drift as a fraction of the lease
    pub drift_factor: f64,
    /// Remaining validity below which a working holder extends, in milliseconds
    pub extension_threshold_ms: u64,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            lease_ms: 10_000,
            retry_count: 1,
            retry_delay_ms: 200,
            retry_jitter_ms: 200,
            drift_factor: 0.01,
            extension_threshold_ms: 500,
        }
    }
}

impl LockSettings {
    /// The lock tuning these settings describe
    pub fn lock_config(&self) -> LockConfig {
        LockConfig {
            lease: Duration::from_millis(self.lease_ms),
            retry_count: self.retry_count,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            retry_jitter: Duration::from_millis(self.retry_jitter_ms),
            drift_factor: self.drift_factor,
            extension_threshold: Duration::from_millis(self.extension_threshold_ms),
        }
    }
}

/// Upstream indexer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerSettings {
    /// Base URL of the indexer API
    pub base_url: String,
    /// Optional bearer token
    pub api_key: Option<String>,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Health check timeout in seconds
    pub health_check_timeout_seconds: u64,
    /// Retry attempts for transient indexer failures
    pub max_retries: u32,
}

impl Default for IndexerSettings {
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

impl IndexerSettings {
    /// The indexer client configuration these settings describe
    pub fn client_config(&self) -> IndexerConfig {
        IndexerConfig {
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            timeout_seconds: self.timeout_seconds,
            health_check_timeout_seconds: self.health_check_timeout_seconds,
            max_retries: self.max_retries,
        }
    }
}

/// Server configuration for different environments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host address
    pub host: IpAddr,
    /// Server port (validated for environment compatibility)
    pub port: ServerPort,
    /// Request timeout in seconds (validated range: 1-300)
    pub timeout_seconds: TimeoutSeconds,
    /// Environment type
    pub environment: Environment,
    /// Shared store settings
    #[serde(default)]
    pub store: StoreSettings,
    /// Record freshness settings
    #[serde(default)]
    pub cache: CacheSettings,
    /// Distributed lock settings
    #[serde(default)]
    pub lock: LockSettings,
    /// Upstream indexer settings
    #[serde(default)]
    pub indexer: IndexerSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: ServerPort::default_development(),
            timeout_seconds: TimeoutSeconds::default(),
            environment: Environment::Development,
            store: StoreSettings::default(),
            cache: CacheSettings::default(),
            lock: LockSettings::default(),
            indexer: IndexerSettings::default(),
        }
    }
}

impl ServerConfig {
    /// Create configuration from environment variables and optional files
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Config` if configuration is invalid or cannot
    /// be loaded.
    pub fn from_env() -> ServerResult<Self> {
        Self::load().map_err(|e| ServerError::Config {
            message: format!("failed to load configuration: {e}"),
        })
    }

    /// Load configuration with hierarchical sources
    ///
    /// Later sources override earlier ones: defaults, `config.json`,
    /// `config.{env}.json`, then environment variables with a `SERVER__`
    /// prefix (double underscore separates nesting levels, e.g.
    /// `SERVER__CACHE__TTL_SECONDS`).
    pub fn load() -> Result<Self, ConfigError> {
        let env_var = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let mut config_builder = Config::builder()
            .set_default("host", "127.0.0.1")?
            .set_default("port", 3000)?
            .set_default("timeout_seconds", 30)?
            .set_default("environment", "development")?
            .add_source(File::with_name("config.json").required(false))
            .add_source(
                File::with_name(&format!("config.{}.json", env_var.to_lowercase())).required(false),
            )
            .add_source(
                ConfigEnv::with_prefix("SERVER")
                    .separator("__")
                    .try_parsing(true),
            );

        if std::env::var("ENVIRONMENT").is_ok() {
            config_builder = config_builder.set_override("environment", env_var.to_lowercase())?;
        }

        let config = config_builder.build()?;
        let mut server_config: Self = config.try_deserialize()?;

        // Re-validate the port now that the environment is known.
        server_config.port =
            ServerPort::new(server_config.port.value(), server_config.environment)?;

        Ok(server_config)
    }

    /// Create configuration optimized for testing
    pub fn for_testing() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: ServerPort::testing(),
            timeout_seconds: TimeoutSeconds::testing(),
            environment: Environment::Testing,
            store: StoreSettings::default(),
            cache: CacheSettings::default(),
            lock: LockSettings::default(),
            indexer: IndexerSettings::default(),
        }
    }

    /// Get socket address for binding
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port.value())
    }
}
