//! TossPayments-compatible REST client.
//!
//! Authentication is HTTP Basic with the secret key as the username and an
//! empty password: `Authorization: Basic base64("<secret>:")`.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, FixedOffset, Utc};
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use silvertape_core::{OrderId, Won};

use super::TossError;
use crate::config::TossConfig;

/// Gateway payment confirmation request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPaymentRequest {
    pub payment_key: String,
    pub order_id: OrderId,
    pub amount: Won,
}

/// Payment lifecycle as reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Ready,
    InProgress,
    WaitingForDeposit,
    /// Approved and captured.
    Done,
    Canceled,
    PartialCanceled,
    Aborted,
    Expired,
    #[serde(other)]
    Unknown,
}

impl PaymentStatus {
    /// The payment ended without capturing money.
    #[must_use]
    pub const fn is_terminal_failure(self) -> bool {
        matches!(self, Self::Canceled | Self::Aborted | Self::Expired)
    }
}

/// Payment object returned by the gateway.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TossPayment {
    pub payment_key: String,
    pub order_id: OrderId,
    pub status: PaymentStatus,
    /// Payment method label (e.g. "카드", "간편결제").
    #[serde(default)]
    pub method: Option<String>,
    pub total_amount: Won,
    #[serde(default)]
    pub approved_at: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub easy_pay: Option<EasyPay>,
}

impl TossPayment {
    /// Approval time in UTC, falling back to `now` when the gateway omits it.
    #[must_use]
    pub fn approved_at_utc(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.approved_at
            .map_or(now, |approved| approved.with_timezone(&Utc))
    }

    /// Method label, falling back to the easy-pay provider, then `"UNKNOWN"`.
    #[must_use]
    pub fn method_label(&self) -> String {
        self.method
            .clone()
            .or_else(|| self.easy_pay.as_ref().map(|e| e.provider.clone()))
            .unwrap_or_else(|| "UNKNOWN".to_string())
    }
}

/// Easy-pay wallet details.
#[derive(Debug, Clone, Deserialize)]
pub struct EasyPay {
    pub provider: String,
}

/// Error body returned by the gateway on non-2xx responses.
#[derive(Debug, Deserialize)]
struct GatewayErrorBody {
    code: String,
    message: String,
}

/// Payment gateway client.
#[derive(Clone)]
pub struct TossClient {
    inner: Arc<TossClientInner>,
}

struct TossClientInner {
    client: reqwest::Client,
    api_base: String,
}

impl TossClient {
    /// Create a new gateway client.
    ///
    /// # Errors
    ///
    /// Returns error if the secret key cannot form a header or the HTTP
    /// client fails to build.
    pub fn new(config: &TossConfig) -> Result<Self, TossError> {
        let credentials = STANDARD.encode(format!("{}:", config.secret_key.expose_secret()));
        let mut auth_value = HeaderValue::from_str(&format!("Basic {credentials}"))
            .map_err(|e| TossError::Config(format!("Invalid secret key format: {e}")))?;
        auth_value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth_value);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| TossError::Config(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(TossClientInner {
                client,
                api_base: config.api_base.as_str().trim_end_matches('/').to_string(),
            }),
        })
    }

    /// Confirm (capture) a payment the buyer approved in the widget.
    ///
    /// # Errors
    ///
    /// Returns `TossError::Rejected` with the gateway's code when the
    /// gateway refuses, `TossError::Timeout` when no answer arrives in time.
    #[instrument(skip(self, request), fields(order_id = %request.order_id, amount = %request.amount))]
    pub async fn confirm(&self, request: &ConfirmPaymentRequest) -> Result<TossPayment, TossError> {
        let url = format!("{}/v1/payments/confirm", self.inner.api_base);

        let response = self.inner.client.post(&url).json(request).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(rejection(response).await);
        }

        let payment: TossPayment = response
            .json()
            .await
            .map_err(|e| if e.is_timeout() { TossError::Timeout } else { TossError::Parse(e.to_string()) })?;

        debug!(payment_status = ?payment.status, "payment confirmed by gateway");
        Ok(payment)
    }

    /// Look up the payment attached to an order.
    ///
    /// Returns `Ok(None)` when the gateway has no payment for the order.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the gateway answers with an
    /// error other than not-found.
    #[instrument(skip(self))]
    pub async fn payment_by_order_id(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<TossPayment>, TossError> {
        let url = format!(
            "{}/v1/payments/orders/{}",
            self.inner.api_base,
            urlencoding::encode(order_id.as_str())
        );

        let response = self.inner.client.get(&url).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(rejection(response).await);
        }

        let payment = response
            .json()
            .await
            .map_err(|e| TossError::Parse(e.to_string()))?;
        Ok(Some(payment))
    }
}

/// Turn a non-success response into `TossError::Rejected`, keeping the
/// gateway's code and message when the body has them.
async fn rejection(response: reqwest::Response) -> TossError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();

    match serde_json::from_str::<GatewayErrorBody>(&body) {
        Ok(err) => TossError::Rejected {
            status,
            code: err.code,
            message: err.message,
        },
        Err(_) => {
            warn!(status, body = %body, "gateway returned an unstructured error");
            TossError::Rejected {
                status,
                code: "UNKNOWN_ERROR".to_string(),
                message: body,
            }
        }
    }
}
