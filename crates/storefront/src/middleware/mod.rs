//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Security headers (nosniff, frame denial, no-store)
//! 5. Rate limiting (governor, order and payment routes only)
//!
//! [`ClientContext`] is an extractor rather than a layer; handlers that send
//! conversion events take it as an argument.

pub mod client_context;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;

pub use client_context::{ClientContext, client_ip};
pub use rate_limit::{api_rate_limiter, payment_rate_limiter};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
