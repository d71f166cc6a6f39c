// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Shared types for the NFT state cache service
//!
//! This crate provides the key types that identify networks, tokens, and
//! collections across the workspace, avoiding circular dependencies between
//! the cache core, the fetcher implementations, and the HTTP surface.

pub mod keys;
pub mod network;

pub use keys::{CollectionKey, KeyParseError, TokenKey};
pub use network::NetworkId;
