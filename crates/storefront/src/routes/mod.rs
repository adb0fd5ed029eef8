//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (order storage writable)
//!
//! # Orders
//! POST /orders                 - Create a pending order (price re-validated)
//! GET  /orders/{orderId}       - Full order record
//!
//! # Payment
//! POST /payment/confirm        - Confirm a gateway payment (idempotent)
//! ```

pub mod health;
pub mod orders;
pub mod payment;

use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware::{api_rate_limiter, payment_rate_limiter};
use crate::state::AppState;

/// Create the health check routes router.
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", post(orders::create))
        .route("/orders/{order_id}", get(orders::show))
}

/// Create the payment routes router.
pub fn payment_routes() -> Router<AppState> {
    Router::new().route("/payment/confirm", post(payment::confirm))
}

/// Create all routes for the storefront, without rate limiting.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(health_routes())
        .merge(order_routes())
        .merge(payment_routes())
}

/// Create all routes with per-IP rate limits on the order and payment
/// endpoints. Requests without a resolvable client IP are rejected by the
/// limiter, so this is only for deployments behind a proxy.
pub fn rate_limited_routes() -> Router<AppState> {
    Router::new()
        .merge(health_routes())
        .merge(order_routes().layer(api_rate_limiter()))
        .merge(payment_routes().layer(payment_rate_limiter()))
}
