// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Prometheus metrics module
//!
//! Provides global metrics using the default Prometheus registry via macros
//! and an Axum-compatible metrics handler. Cache coordinator counters are
//! copied into gauges at scrape time so the `/metrics` output always reflects
//! the live coordinator state.

use std::sync::LazyLock;

use axum::{
    extract::State,
    http::{StatusCode, header},
    response::Response,
};
use prometheus::{
    Encoder, Gauge, HistogramVec, IntCounterVec, TextEncoder, register_gauge,
    register_histogram_vec, register_int_counter_vec,
};
use token_cache::CoordinatorStats;

use crate::state::ServerState;

/// Total number of API requests received, labeled by route and network.
pub static REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "nft_state_api_requests_total",
        "Total number of API requests, labeled by route and network",
        &["route", "network"]
    )
    .expect("Failed to create nft_state_api_requests_total counter vec")
});

/// Histogram of token lookup durations in seconds, labeled by route.
pub static LOOKUP_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "nft_state_api_lookup_duration_seconds",
        "Token lookup durations in seconds",
        &["route"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("Failed to create lookup duration histogram")
});

/// Cache hit rate gauge
pub static CACHE_HIT_RATE: LazyLock<Gauge> = LazyLock::new(|| {
    register_gauge!(
        "nft_state_api_cache_hit_rate",
        "Cache hit rate as a ratio (0.0 to 1.0)"
    )
    .expect("Failed to create cache hit rate gauge")
});

/// Completed refreshes gauge
pub static CACHE_REFRESHES: LazyLock<Gauge> = LazyLock::new(|| {
    register_gauge!(
        "nft_state_api_cache_refreshes",
        "Refreshes completed by this process since startup"
    )
    .expect("Failed to create cache refreshes gauge")
});

/// Stale fallbacks gauge
pub static CACHE_STALE_FALLBACKS: LazyLock<Gauge> = LazyLock::new(|| {
    register_gauge!(
        "nft_state_api_cache_stale_fallbacks",
        "Stale records served because lock retries were exhausted"
    )
    .expect("Failed to create stale fallbacks gauge")
});

/// Upstream fetch failures gauge
pub static CACHE_FETCH_FAILURES: LazyLock<Gauge> = LazyLock::new(|| {
    register_gauge!(
        "nft_state_api_cache_fetch_failures",
        "Upstream fetch failures observed while refreshing"
    )
    .expect("Failed to create fetch failures gauge")
});

/// Increment the requests counter
pub fn inc_requests(route: &str, network: &str) {
    REQUESTS_TOTAL.with_label_values(&[route, network]).inc();
}

/// Observe the duration of a token lookup
pub fn observe_lookup_duration(route: &str, duration_secs: f64) {
    LOOKUP_DURATION
        .with_label_values(&[route])
        .observe(duration_secs);
}

/// Copy coordinator counters into the exported gauges
#[allow(clippy::cast_precision_loss)]
pub fn sync_coordinator_gauges(stats: &CoordinatorStats) {
    CACHE_HIT_RATE.set(stats.hit_rate);
    CACHE_REFRESHES.set(stats.refreshes as f64);
    CACHE_STALE_FALLBACKS.set(stats.stale_fallbacks as f64);
    CACHE_FETCH_FAILURES.set(stats.fetch_failures as f64);
}

/// Axum handler that exports metrics in Prometheus text format
///
/// # Panics
///
/// Panics if the metrics encoder fails or produces non-UTF-8 output, which
/// indicates a programming error rather than a runtime condition.
pub async fn metrics_handler(State(state): State<ServerState>) -> Response<String> {
    sync_coordinator_gauges(&state.coordinator().stats());

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];
    encoder
        .encode(&metric_families, &mut buffer)
        .expect("Failed to encode metrics");

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, encoder.format_type())
        .body(String::from_utf8(buffer).expect("metrics buffer should be valid UTF-8"))
        .expect("Failed to create metrics response")
}
