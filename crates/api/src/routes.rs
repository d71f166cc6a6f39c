// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Routes module
//!
//! Route configuration for the NFT state query surface. The token paths
//! mirror the public contract: `nft_info` and `owner` share one lookup path
//! and differ only in the projected field; `all_tokens` enumerates a
//! collection or a whole network.

pub mod handlers;

use axum::{Router, routing::get};
use handlers::{
    collection_tokens_handler, health_handler, legacy_nfts_handler, network_tokens_handler,
    nft_info_handler, owner_handler,
};

use crate::{
    metrics::metrics_handler,
    openapi::{openapi_spec, swagger_ui},
    state::ServerState,
};

/// Create application routes
pub fn create_routes() -> Router<ServerState> {
    // Health and metrics endpoints are unversioned for monitoring tooling.
    let ops_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler));

    let docs_routes = Router::new()
        .route("/api-doc/openapi.json", get(openapi_spec))
        .route("/swagger-ui", get(swagger_ui));

    let token_routes = Router::new()
        .route("/nfts", get(legacy_nfts_handler))
        .route(
            "/{network}/nft_info/{address}/tokenId/{token_id}",
            get(nft_info_handler),
        )
        .route(
            "/{network}/owner/{address}/tokenId/{token_id}",
            get(owner_handler),
        )
        .route(
            "/{network}/all_tokens/{address}",
            get(collection_tokens_handler),
        )
        .route("/{network}/all_tokens", get(network_tokens_handler));

    Router::new()
        .merge(ops_routes)
        .merge(docs_routes)
        .merge(token_routes)
}
