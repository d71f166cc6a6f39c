// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! `OpenAPI` documentation module
//!
//! This module provides the `OpenAPI` specification and `Swagger UI`
//! endpoints for API documentation.

use axum::{Json, http::StatusCode, response::Html};
use utoipa::OpenApi;

use crate::{
    config::Environment,
    routes::handlers,
    state::{HealthCheck, HealthStatus},
};

/// `OpenAPI` documentation for the NFT state query surface
#[derive(OpenApi)]
#[openapi(
    info(
        title = "NFT State API",
        description = "Cached NFT state queries backed by a shared store and a chain indexer"
    ),
    paths(
        handlers::health_handler,
        handlers::legacy_nfts_handler,
        handlers::nft_info_handler,
        handlers::owner_handler,
        handlers::collection_tokens_handler,
        handlers::network_tokens_handler,
    ),
    components(schemas(
        fetch_client::TokenMetadata,
        fetch_client::TokenAccess,
        fetch_client::TokenRecord,
        shared_types::NetworkId,
        shared_types::TokenKey,
        handlers::OwnerInfo,
        handlers::AllTokensResponse,
        HealthCheck,
        HealthStatus,
        Environment,
    )),
    tags(
        (name = "tokens", description = "Cached token state queries"),
        (name = "ops", description = "Health and monitoring")
    )
)]
pub struct ApiDoc;

/// `OpenAPI` specification endpoint
pub async fn openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Swagger UI endpoint
pub async fn swagger_ui() -> Result<Html<&'static str>, StatusCode> {
    let html = r#"
<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>NFT State API Documentation</title>
    <link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css" />
    <style>
        html { box-sizing: border-box; overflow: -moz-scrollbars-vertical; overflow-y: scroll; }
        *, *:before, *:after { box-sizing: inherit; }
        body { margin:0; background: #fafafa; }
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"></script>
    <script src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-standalone-preset.js"></script>
    <script>
        window.onload = function() {
            SwaggerUIBundle({
                url: '/api-doc/openapi.json',
                dom_id: '#swagger-ui',
                deepLinking: true,
                presets: [
                    SwaggerUIBundle.presets.apis,
                    SwaggerUIStandalonePreset
                ],
                plugins: [
                    SwaggerUIBundle.plugins.DownloadUrl
                ],
                layout: "StandaloneLayout"
            });
        }
    </script>
</body>
</html>
"#;
    Ok(Html(html))
}
