//! Payment gateway integration.
//!
//! # Architecture
//!
//! The browser runs the gateway's payment widget with the public client key.
//! When the buyer approves, the gateway redirects back with a `paymentKey`,
//! and the server finalises the charge with the secret key:
//!
//! ```text
//! Browser ──widget──► Gateway ──redirect(paymentKey, orderId, amount)──► Browser
//!    │
//!    └──POST /payment/confirm──► storefront ──POST /v1/payments/confirm──► Gateway
//! ```
//!
//! The secret key never leaves this module; it is only ever placed in the
//! `Authorization` header of server-to-gateway requests.

pub mod toss;

use thiserror::Error;

pub use toss::{ConfirmPaymentRequest, PaymentStatus, TossClient, TossPayment};

/// Errors that can occur when talking to the payment gateway.
#[derive(Debug, Error)]
pub enum TossError {
    /// HTTP request failed before a response was received.
    #[error("HTTP error: {0}")]
    Http(#[source] reqwest::Error),

    /// The gateway did not answer within the configured timeout.
    ///
    /// The charge may or may not have been applied gateway-side.
    #[error("gateway request timed out")]
    Timeout,

    /// The gateway answered with a non-success status.
    #[error("gateway rejected request: {status} {code} - {message}")]
    Rejected {
        /// HTTP status returned by the gateway.
        status: u16,
        /// Gateway error code (e.g. `REJECT_CARD_PAYMENT`).
        code: String,
        /// Gateway's human-readable message.
        message: String,
    },

    /// The gateway's response body could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The client could not be built from configuration.
    #[error("invalid gateway configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for TossError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(err)
        }
    }
}
