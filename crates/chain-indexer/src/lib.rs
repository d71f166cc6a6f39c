// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! HTTP indexer integration
//!
//! This crate implements the [`fetch_client::TokenFetcher`] seam against a
//! chain indexer's HTTP API. The indexer is the slow, authoritative source
//! the cache refreshes from; this client adds request deadlines and bounded
//! retries of transient failures, nothing more. Memoization is explicitly
//! not its job.

pub mod client;

pub use client::{IndexerClient, IndexerConfig, IndexerError};
