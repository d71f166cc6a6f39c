// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! HTTP request handlers module
//!
//! Handlers parse path parameters into typed keys, call the cache core, and
//! project fields from the returned records. They never fetch or lock
//! themselves; the coordinator owns that protocol.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use fetch_client::TokenMetadata;
use serde::{Deserialize, Serialize};
use shared_types::{CollectionKey, NetworkId, TokenKey};
use utoipa::ToSchema;

use crate::{
    error::ServerError,
    metrics::{inc_requests, observe_lookup_duration},
    state::{HealthCheck, ServerState},
};

/// Ownership projection of a token record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct OwnerInfo {
    /// Current owner address
    #[schema(example = "terra1alice")]
    pub owner: String,
}

/// Response for collection and network-wide token enumerations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct AllTokensResponse {
    /// Every known token, sorted by key
    pub tokens: Vec<TokenKey>,
}

fn parse_token_key(
    network: &str,
    address: &str,
    token_id: &str,
) -> Result<TokenKey, ServerError> {
    Ok(TokenKey::new(
        NetworkId::new(network)?,
        address,
        token_id,
    )?)
}

/// Health check endpoint handler
#[utoipa::path(
    get,
    path = "/health",
    tag = "ops",
    summary = "Health check endpoint",
    description = "Returns service health including upstream data source status and cache coordinator counters.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthCheck)
    )
)]
pub async fn health_handler(State(state): State<ServerState>) -> impl IntoResponse {
    Json(state.health_check().await)
}

/// Hint handler for the legacy bare `/nfts` path
#[utoipa::path(
    get,
    path = "/nfts",
    tag = "tokens",
    summary = "Legacy path hint",
    responses(
        (status = 404, description = "Always; points at the parameterized routes", body = String)
    )
)]
pub async fn legacy_nfts_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        "use /{network}/nft_info/{address}/tokenId/{token_id}",
    )
}

/// Token metadata lookup
///
/// Reads through the cache: fresh records are served directly, stale ones
/// are refreshed from the indexer exactly once across all concurrent
/// callers.
#[utoipa::path(
    get,
    path = "/{network}/nft_info/{address}/tokenId/{token_id}",
    tag = "tokens",
    summary = "Token metadata",
    params(
        ("network" = String, Path, description = "Network identifier, e.g. terra-2"),
        ("address" = String, Path, description = "Collection contract address"),
        ("token_id" = String, Path, description = "Token identifier"),
    ),
    responses(
        (status = 200, description = "Current token metadata", body = TokenMetadata),
        (status = 400, description = "Malformed network, address, or token id", body = String),
        (status = 404, description = "Token unknown to the data source", body = String),
        (status = 502, description = "Upstream fetch failed", body = String),
        (status = 503, description = "Refresh contended and no cached value available", body = String)
    )
)]
pub async fn nft_info_handler(
    State(state): State<ServerState>,
    Path((network, address, token_id)): Path<(String, String, String)>,
) -> Result<Json<TokenMetadata>, ServerError> {
    let key = parse_token_key(&network, &address, &token_id)?;
    inc_requests("nft_info", key.network.as_str());

    let started = std::time::Instant::now();
    let record = state.coordinator().get_token_record(&key).await?;
    observe_lookup_duration("nft_info", started.elapsed().as_secs_f64());

    Ok(Json(record.info))
}

/// Token owner lookup
///
/// Shares the metadata lookup's fetch path; only the projected field
/// differs.
#[utoipa::path(
    get,
    path = "/{network}/owner/{address}/tokenId/{token_id}",
    tag = "tokens",
    summary = "Token owner",
    params(
        ("network" = String, Path, description = "Network identifier, e.g. terra-2"),
        ("address" = String, Path, description = "Collection contract address"),
        ("token_id" = String, Path, description = "Token identifier"),
    ),
    responses(
        (status = 200, description = "Current token owner", body = OwnerInfo),
        (status = 400, description = "Malformed network, address, or token id", body = String),
        (status = 404, description = "Token unknown to the data source", body = String),
        (status = 502, description = "Upstream fetch failed", body = String),
        (status = 503, description = "Refresh contended and no cached value available", body = String)
    )
)]
pub async fn owner_handler(
    State(state): State<ServerState>,
    Path((network, address, token_id)): Path<(String, String, String)>,
) -> Result<Json<OwnerInfo>, ServerError> {
    let key = parse_token_key(&network, &address, &token_id)?;
    inc_requests("owner", key.network.as_str());

    let started = std::time::Instant::now();
    let record = state.coordinator().get_token_record(&key).await?;
    observe_lookup_duration("owner", started.elapsed().as_secs_f64());

    Ok(Json(OwnerInfo {
        owner: record.access.owner,
    }))
}

/// Enumerate all known tokens in one collection
#[utoipa::path(
    get,
    path = "/{network}/all_tokens/{address}",
    tag = "tokens",
    summary = "All known tokens of a collection",
    params(
        ("network" = String, Path, description = "Network identifier, e.g. terra-2"),
        ("address" = String, Path, description = "Collection contract address"),
    ),
    responses(
        (status = 200, description = "Known tokens, possibly empty", body = AllTokensResponse),
        (status = 400, description = "Malformed network or address", body = String)
    )
)]
pub async fn collection_tokens_handler(
    State(state): State<ServerState>,
    Path((network, address)): Path<(String, String)>,
) -> Result<Json<AllTokensResponse>, ServerError> {
    let key = CollectionKey::collection(NetworkId::new(&network)?, address)?;
    inc_requests("all_tokens", key.network.as_str());

    let tokens = state.enumerator().all_tokens(&key).await?;
    Ok(Json(AllTokensResponse { tokens }))
}

/// Enumerate all known tokens across every collection on a network
#[utoipa::path(
    get,
    path = "/{network}/all_tokens",
    tag = "tokens",
    summary = "All known tokens on a network",
    params(
        ("network" = String, Path, description = "Network identifier, e.g. terra-2"),
    ),
    responses(
        (status = 200, description = "Known tokens, possibly empty", body = AllTokensResponse),
        (status = 400, description = "Malformed network identifier", body = String)
    )
)]
pub async fn network_tokens_handler(
    State(state): State<ServerState>,
    Path(network): Path<String>,
) -> Result<Json<AllTokensResponse>, ServerError> {
    let key = CollectionKey::network_wide(NetworkId::new(&network)?);
    inc_requests("all_tokens", key.network.as_str());

    let tokens = state.enumerator().all_tokens(&key).await?;
    Ok(Json(AllTokensResponse { tokens }))
}
