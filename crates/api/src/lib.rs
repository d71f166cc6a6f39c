// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! NFT State API Server Implementation
//!
//! This crate provides the HTTP query surface over the token cache core,
//! built with Axum and designed for production use with comprehensive
//! configuration, middleware, and graceful shutdown capabilities.
//!
//! # Module Structure
//!
//! - [`config`]: Server configuration and environment management with hierarchical loading
//! - [`error`]: Error types and HTTP response handling with proper status codes
//! - [`state`]: Shared application state management with cancellation token support
//! - [`server`]: Main server implementation, lifecycle, and coordinated shutdown
//! - [`routes`]: Route configuration and HTTP request handlers
//! - [`metrics`]: Prometheus metrics and the text-format exporter endpoint
//! - [`openapi`]: `OpenAPI` specification and Swagger UI endpoints for API documentation
//!
//! # Query Surface
//!
//! The routes mirror the service's public contract: per-token metadata and
//! ownership lookups that share one refresh path, and per-collection token
//! enumerations. Everything else (staleness, locking, write-back) lives in
//! the `token-cache` crate; handlers only project fields from the records it
//! returns.

pub mod config;
pub mod error;
pub mod metrics;
pub mod openapi;
pub mod routes;
pub mod server;
pub mod state;

pub use config::{Environment, ServerConfig};
pub use error::{ServerError, ServerResult};
pub use server::{Server, ShutdownConfig};
pub use state::ServerState;
