//! SILVERTAPE storefront library.
//!
//! Order creation, payment confirmation and reconciliation for the
//! storefront, exposed as a library so the server binary, the operations CLI
//! and the integration tests share one implementation.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod middleware;
pub mod payments;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;

use axum::{Router, middleware::from_fn};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use state::AppState;

/// Build the application router without rate limiting.
///
/// Used by tests and by deployments that rate limit upstream.
pub fn app(state: AppState) -> Router {
    with_layers(routes::routes(), state)
}

/// Build the application router with per-IP rate limits on order and
/// payment endpoints.
pub fn app_with_rate_limits(state: AppState) -> Router {
    with_layers(routes::rate_limited_routes(), state)
}

fn with_layers(routes: Router<AppState>, state: AppState) -> Router {
    routes
        .layer(from_fn(middleware::security_headers_middleware))
        .layer(from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}
