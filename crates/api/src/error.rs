// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Error handling module
//!
//! Server-level error types with HTTP response mapping. Cache-core errors
//! pass through [`ServerError::Cache`] and map onto the status codes the
//! public contract promises: unknown tokens are 404, exhausted refresh
//! contention is 503, upstream failures are 502.

use std::net::SocketAddr;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use token_cache::CacheError;

/// Comprehensive error types for server operations
#[derive(Error, Debug)]
pub enum ServerError {
    /// Configuration validation errors
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Network binding errors
    #[error("Failed to bind to {address}: {source}")]
    Bind {
        /// Socket address that failed to bind
        address: SocketAddr,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Server startup errors
    #[error("Server startup failed: {source}")]
    Startup {
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Server shutdown errors
    #[error("Server shutdown failed: {source}")]
    Shutdown {
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Task join errors for async operations
    #[error("Task join error: {source}")]
    TaskJoin {
        /// Underlying tokio join error
        #[source]
        source: tokio::task::JoinError,
    },

    /// Invalid path parameters (bad network id, address, or token id)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Errors surfaced by the cache core
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Result type for server operations
pub type ServerResult<T> = Result<T, ServerError>;

impl From<shared_types::KeyParseError> for ServerError {
    fn from(source: shared_types::KeyParseError) -> Self {
        Self::Validation(source.to_string())
    }
}

impl From<tokio::task::JoinError> for ServerError {
    fn from(source: tokio::task::JoinError) -> Self {
        Self::TaskJoin { source }
    }
}

fn error_body(status: StatusCode, kind: &str, message: String) -> (StatusCode, Json<serde_json::Value>) {
    (
        status,
        Json(serde_json::json!({
            "error": kind,
            "message": message,
            "status": status.as_u16(),
        })),
    )
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ServerError::Config { .. }
            | ServerError::Bind { .. }
            | ServerError::Startup { .. }
            | ServerError::Shutdown { .. }
            | ServerError::TaskJoin { .. } => error_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                self.to_string(),
            ),
            ServerError::Validation(..) => {
                error_body(StatusCode::BAD_REQUEST, "invalid_request", self.to_string())
            }
            ServerError::Cache(cache_error) => match cache_error {
                CacheError::NotFound { .. } => {
                    error_body(StatusCode::NOT_FOUND, "token_not_found", self.to_string())
                }
                CacheError::TemporarilyUnavailable { .. } => error_body(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "temporarily_unavailable",
                    self.to_string(),
                ),
                CacheError::UpstreamFetchFailed { .. } => error_body(
                    StatusCode::BAD_GATEWAY,
                    "upstream_fetch_failed",
                    self.to_string(),
                ),
                CacheError::Store(..) => error_body(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "store_error",
                    self.to_string(),
                ),
            },
        };

        (status, body).into_response()
    }
}
