//! Unified error handling with Sentry integration.
//!
//! Route handlers return `Result<T, AppError>`. Every error renders as
//! `{"error": <message>, "code"?: <code>}`; server-side failures are captured
//! to Sentry and replaced by a generic message.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::services::{OrderError, PaymentError};
use crate::store::OrderStoreError;

/// Shown when the gateway rejects without a usable message.
const GATEWAY_FALLBACK_MESSAGE: &str = "Payment confirmation failed";

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or malformed request fields.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Client-claimed amount does not match the server's.
    #[error("Amount mismatch: {0}")]
    AmountMismatch(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The payment gateway declined; its status and code are passed through.
    #[error("Gateway error: {status} {code} - {message}")]
    Gateway {
        status: u16,
        code: String,
        message: String,
    },

    /// The payment gateway did not answer in time.
    #[error("Gateway timeout: {0}")]
    GatewayTimeout(String),

    /// The payment gateway could not be reached.
    #[error("Gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// Order storage failed.
    #[error("Storage error: {0}")]
    Storage(#[from] OrderStoreError),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::AmountMismatch(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Gateway { status, .. } => StatusCode::from_u16(*status)
                .ok()
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            Self::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::GatewayUnavailable(_) => StatusCode::BAD_GATEWAY,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Storage(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> Option<String> {
        match self {
            Self::AmountMismatch(_) => Some("AMOUNT_MISMATCH".to_string()),
            Self::Gateway { code, .. } => Some(code.clone()),
            Self::GatewayTimeout(_) => Some("GATEWAY_TIMEOUT".to_string()),
            Self::GatewayUnavailable(_) => Some("GATEWAY_UNAVAILABLE".to_string()),
            _ => None,
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::Validation(msg) | Self::AmountMismatch(msg) | Self::NotFound(msg) => msg.clone(),
            Self::Gateway { message, .. } if !message.trim().is_empty() => message.clone(),
            Self::Gateway { .. } => GATEWAY_FALLBACK_MESSAGE.to_string(),
            Self::GatewayTimeout(_) => {
                "Payment confirmation timed out; the order will be reconciled".to_string()
            }
            Self::GatewayUnavailable(_) => "Payment service unavailable".to_string(),
            Self::RateLimited => "Too many requests".to_string(),
            // Don't expose internal error details to clients
            Self::Storage(_) | Self::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if matches!(
            self,
            Self::Storage(_)
                | Self::Internal(_)
                | Self::GatewayTimeout(_)
                | Self::GatewayUnavailable(_)
        ) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let body = ErrorBody {
            error: self.public_message(),
            code: self.code(),
        };

        (self.status(), Json(body)).into_response()
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::Validation(msg) => Self::Validation(msg),
            OrderError::AmountMismatch { .. } => {
                Self::AmountMismatch("Order amount does not match the cart".to_string())
            }
            OrderError::Store(e) => Self::Storage(e),
        }
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Validation(msg) => Self::Validation(msg),
            PaymentError::NotFound(_) => Self::NotFound("Order not found".to_string()),
            e @ PaymentError::NotConfirmable { .. } => Self::Validation(e.to_string()),
            PaymentError::AmountMismatch { .. } => Self::AmountMismatch(
                "Payment amount does not match the order amount".to_string(),
            ),
            PaymentError::GatewayRejected {
                status,
                code,
                message,
            } => Self::Gateway {
                status,
                code,
                message,
            },
            PaymentError::GatewayTimeout(order_id) => Self::GatewayTimeout(order_id.to_string()),
            PaymentError::GatewayUnavailable(e) => Self::GatewayUnavailable(e.to_string()),
            PaymentError::Store(e) => Self::Storage(e),
        }
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use http_body_util::BodyExt;
    use silvertape_core::{OrderId, Won};

    use super::*;

    async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("HO-123".to_string());
        assert_eq!(err.to_string(), "Not found: HO-123");

        let err = AppError::Validation("items required".to_string());
        assert_eq!(err.to_string(), "Validation error: items required");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            err.into_response().status()
        }

        assert_eq!(
            get_status(AppError::Validation("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::RateLimited),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(AppError::GatewayTimeout("HO-1".to_string())),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[tokio::test]
    async fn test_gateway_status_and_code_forwarded() {
        let (status, body) = render(AppError::Gateway {
            status: 403,
            code: "REJECT_CARD_PAYMENT".to_string(),
            message: "한도초과".to_string(),
        })
        .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "REJECT_CARD_PAYMENT");
        assert_eq!(body["error"], "한도초과");
    }

    #[tokio::test]
    async fn test_gateway_fallbacks() {
        let (status, body) = render(AppError::Gateway {
            status: 200,
            code: "UNKNOWN_ERROR".to_string(),
            message: String::new(),
        })
        .await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], GATEWAY_FALLBACK_MESSAGE);
    }

    #[tokio::test]
    async fn test_internal_details_hidden() {
        let io = std::io::Error::other("disk full at /var/data/orders");
        let (status, body) = render(AppError::Storage(io.into())).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
        assert!(body.get("code").is_none());
    }

    #[tokio::test]
    async fn test_payment_errors_map() {
        let (status, body) = render(
            PaymentError::AmountMismatch {
                expected: Won::new(48_500),
                actual: Won::new(1),
            }
            .into(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "AMOUNT_MISMATCH");

        let (status, body) = render(PaymentError::GatewayTimeout(OrderId::new("HO-1")).into()).await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body["code"], "GATEWAY_TIMEOUT");

        let (status, _) = render(PaymentError::NotFound(OrderId::new("HO-2")).into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
