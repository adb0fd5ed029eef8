//! Payment confirmation: the only transition from `pending`/`failed` to `paid`.
//!
//! # Sequence (under the per-order lock)
//!
//! 1. Load the order; unknown IDs fail with `NotFound`.
//! 2. Already paid: return the stored result without calling the gateway.
//! 3. Claimed amount differs from the stored total: mark `failed`, reject.
//! 4. Confirm with the gateway (or simulate when it is not configured).
//! 5. Mark `paid`, then send a `Purchase` conversion event in the background.
//!
//! Holding the lock across the gateway call means concurrent confirmations
//! of one order make exactly one gateway request; the others observe `paid`.

use chrono::Utc;
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use silvertape_core::{Order, OrderId, OrderPatch, OrderStatus, Won};

use crate::middleware::ClientContext;
use crate::payments::{ConfirmPaymentRequest, TossClient, TossError};
use crate::services::conversions::{BuyerData, ConversionEvent, ConversionTracker};
use crate::store::{OrderStore, OrderStoreError};

/// Method label recorded for simulated payments.
pub const SIMULATION_METHOD: &str = "simulation";

/// Method reported for paid orders that have no recorded method.
const FALLBACK_PAID_METHOD: &str = "PAID";

/// Errors from payment confirmation.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Required fields missing.
    #[error("{0}")]
    Validation(String),

    /// No order with this ID.
    #[error("order not found: {0}")]
    NotFound(OrderId),

    /// The order is in a state that cannot be paid (e.g. cancelled).
    #[error("order {order_id} cannot be confirmed in status {status}")]
    NotConfirmable {
        order_id: OrderId,
        status: OrderStatus,
    },

    /// Claimed or gateway-approved amount differs from the stored total.
    #[error("amount mismatch: expected {expected}, got {actual}")]
    AmountMismatch { expected: Won, actual: Won },

    /// The gateway declined the payment.
    #[error("gateway rejected payment: {code} - {message}")]
    GatewayRejected {
        status: u16,
        code: String,
        message: String,
    },

    /// The gateway did not answer in time. The order stays `pending`.
    #[error("gateway timed out confirming order {0}")]
    GatewayTimeout(OrderId),

    /// The gateway could not be reached or answered unintelligibly.
    /// The order stays `pending`.
    #[error("gateway unavailable: {0}")]
    GatewayUnavailable(#[source] TossError),

    /// Order storage failed.
    #[error("order store error: {0}")]
    Store(#[from] OrderStoreError),
}

/// Confirmation request as posted by the checkout success page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    #[serde(default)]
    pub payment_key: String,
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub amount: Option<Won>,
}

impl ConfirmRequest {
    fn validate(self) -> Result<(String, OrderId, Won), PaymentError> {
        let payment_key = self.payment_key.trim().to_string();
        let order_id = OrderId::new(self.order_id.trim());
        match self.amount {
            Some(amount) if !amount.is_zero() && !payment_key.is_empty() && !order_id.is_blank() => {
                Ok((payment_key, order_id, amount))
            }
            _ => Err(PaymentError::Validation(
                "paymentKey, orderId and amount are required".to_string(),
            )),
        }
    }
}

/// Result of a successful confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmOutcome {
    pub order_id: OrderId,
    pub amount: Won,
    pub method: String,
    /// The order was already paid; nothing was done.
    pub already_paid: bool,
    /// No gateway is configured; the payment was simulated.
    pub simulation: bool,
}

impl ConfirmOutcome {
    fn already_paid(order: &Order) -> Self {
        Self {
            order_id: order.order_id.clone(),
            amount: order.total_amount,
            method: order
                .payment_method
                .clone()
                .unwrap_or_else(|| FALLBACK_PAID_METHOD.to_string()),
            already_paid: true,
            simulation: false,
        }
    }
}

/// Confirms payments against the gateway and records the result.
#[derive(Clone)]
pub struct PaymentService {
    store: OrderStore,
    gateway: Option<TossClient>,
    tracker: ConversionTracker,
}

impl PaymentService {
    /// Create the service. `gateway: None` enables simulation mode.
    #[must_use]
    pub const fn new(
        store: OrderStore,
        gateway: Option<TossClient>,
        tracker: ConversionTracker,
    ) -> Self {
        Self {
            store,
            gateway,
            tracker,
        }
    }

    /// Returns `true` if confirmations are simulated.
    #[must_use]
    pub const fn is_simulation(&self) -> bool {
        self.gateway.is_none()
    }

    /// Confirm a payment for an order.
    ///
    /// # Errors
    ///
    /// - `Validation` if the key, order ID or amount is missing
    /// - `NotFound` if the order does not exist
    /// - `NotConfirmable` if the order was cancelled
    /// - `AmountMismatch` if the claimed or approved amount differs from the
    ///   stored total (the order is marked `failed`)
    /// - `GatewayRejected` if the gateway declines (the order is marked `failed`)
    /// - `GatewayTimeout` / `GatewayUnavailable` if the outcome is unknown
    ///   (the order stays `pending`)
    /// - `Store` if reading or writing the order fails
    #[instrument(skip(self, request, client), fields(order_id = %request.order_id))]
    pub async fn confirm(
        &self,
        request: ConfirmRequest,
        client: &ClientContext,
    ) -> Result<ConfirmOutcome, PaymentError> {
        let (payment_key, order_id, amount) = request.validate()?;

        let _guard = self.store.lock(&order_id).await;

        let order = self
            .store
            .get(&order_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(order_id.clone()))?;

        if order.status.is_paid_or_later() {
            info!(status = %order.status, "order already paid");
            return Ok(ConfirmOutcome::already_paid(&order));
        }
        if !order.status.is_confirmable() {
            return Err(PaymentError::NotConfirmable {
                order_id,
                status: order.status,
            });
        }

        if amount != order.total_amount {
            warn!(
                claimed = %amount,
                expected = %order.total_amount,
                "confirmation rejected: amount mismatch"
            );
            self.mark_failed(&order_id).await?;
            return Err(PaymentError::AmountMismatch {
                expected: order.total_amount,
                actual: amount,
            });
        }

        let Some(gateway) = &self.gateway else {
            return self.simulate(&order, payment_key, client).await;
        };

        let gateway_request = ConfirmPaymentRequest {
            payment_key,
            order_id: order_id.clone(),
            amount,
        };

        let payment = match gateway.confirm(&gateway_request).await {
            Ok(payment) => payment,
            Err(TossError::Rejected {
                status,
                code,
                message,
            }) => {
                warn!(status, code = %code, "gateway rejected payment");
                self.mark_failed(&order_id).await?;
                return Err(PaymentError::GatewayRejected {
                    status,
                    code,
                    message,
                });
            }
            Err(TossError::Timeout) => {
                error!("gateway timed out, order left pending for reconciliation");
                return Err(PaymentError::GatewayTimeout(order_id));
            }
            Err(e) => {
                error!(error = %e, "gateway unavailable, order left pending for reconciliation");
                return Err(PaymentError::GatewayUnavailable(e));
            }
        };

        if payment.total_amount != order.total_amount {
            error!(
                approved = %payment.total_amount,
                expected = %order.total_amount,
                payment_key = %payment.payment_key,
                "gateway approved a different amount"
            );
            self.mark_failed(&order_id).await?;
            return Err(PaymentError::AmountMismatch {
                expected: order.total_amount,
                actual: payment.total_amount,
            });
        }

        let method = payment.method_label();
        let patch = OrderPatch::paid(
            payment.payment_key.clone(),
            method.clone(),
            payment.approved_at_utc(Utc::now()),
        );
        let paid = self
            .store
            .update(&order_id, patch)
            .await?
            .ok_or_else(|| PaymentError::NotFound(order_id.clone()))?;

        info!(amount = %payment.total_amount, method = %method, "payment confirmed");
        self.tracker.track(
            ConversionEvent::purchase(&paid, payment.total_amount),
            BuyerData::from_order(&paid.shipping, client),
        );

        Ok(ConfirmOutcome {
            order_id,
            amount: payment.total_amount,
            method,
            already_paid: false,
            simulation: false,
        })
    }

    async fn simulate(
        &self,
        order: &Order,
        payment_key: String,
        client: &ClientContext,
    ) -> Result<ConfirmOutcome, PaymentError> {
        let patch = OrderPatch::paid(payment_key, SIMULATION_METHOD, Utc::now());
        let paid = self
            .store
            .update(&order.order_id, patch)
            .await?
            .ok_or_else(|| PaymentError::NotFound(order.order_id.clone()))?;

        warn!(amount = %paid.total_amount, "payment simulated, no gateway configured");
        self.tracker.track(
            ConversionEvent::purchase(&paid, paid.total_amount),
            BuyerData::from_order(&paid.shipping, client),
        );

        Ok(ConfirmOutcome {
            order_id: paid.order_id,
            amount: paid.total_amount,
            method: SIMULATION_METHOD.to_string(),
            already_paid: false,
            simulation: true,
        })
    }

    async fn mark_failed(&self, order_id: &OrderId) -> Result<(), OrderStoreError> {
        self.store
            .update(order_id, OrderPatch::status(OrderStatus::Failed))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use secrecy::SecretString;
    use silvertape_core::{CartItem, PriceBreakdown, ShippingInfo};
    use tempfile::TempDir;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::TossConfig;

    async fn pending_order(store: &OrderStore, id: &str) -> Order {
        let items = vec![CartItem {
            id: "p1-a3".to_string(),
            product_id: "p1".to_string(),
            quantity: 1,
            print_price: Won::new(30_000),
            frame_price: Won::new(15_000),
            ..CartItem::default()
        }];
        let price = PriceBreakdown::from_items(&items).unwrap();
        let order = Order::new_pending(
            OrderId::new(id),
            items,
            ShippingInfo {
                name: "김민지".to_string(),
                ..ShippingInfo::default()
            },
            price,
            Utc::now(),
        );
        store.save(&order).await.unwrap();
        order
    }

    fn gateway(server: &MockServer, timeout: Duration) -> TossClient {
        TossClient::new(&TossConfig {
            client_key: "test_ck_D5GePWvyJnrK0W0k6q8gLzN97Eoq".to_string(),
            secret_key: SecretString::from("test_sk_zXLkKEypNArWmo50nX3lmeaxYG5R"),
            api_base: Url::parse(&server.uri()).unwrap(),
            timeout,
        })
        .unwrap()
    }

    fn request(id: &str, amount: i64) -> ConfirmRequest {
        ConfirmRequest {
            payment_key: "tgen_20260101_abc".to_string(),
            order_id: id.to_string(),
            amount: Some(Won::new(amount)),
        }
    }

    fn approved(id: &str, amount: i64) -> serde_json::Value {
        serde_json::json!({
            "paymentKey": "tgen_20260101_abc",
            "orderId": id,
            "status": "DONE",
            "method": "카드",
            "totalAmount": amount,
            "approvedAt": "2026-01-01T12:00:00+09:00",
        })
    }

    #[tokio::test]
    async fn test_confirm_marks_paid_and_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = OrderStore::new(dir.path());
        pending_order(&store, "HO-1-aaaa").await;

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/payments/confirm"))
            .respond_with(ResponseTemplate::new(200).set_body_json(approved("HO-1-aaaa", 48_500)))
            .expect(1)
            .mount(&server)
            .await;

        let service = PaymentService::new(
            store.clone(),
            Some(gateway(&server, Duration::from_secs(5))),
            ConversionTracker::default(),
        );
        let ctx = ClientContext::default();

        let first = service.confirm(request("HO-1-aaaa", 48_500), &ctx).await.unwrap();
        assert_eq!(first.amount, Won::new(48_500));
        assert_eq!(first.method, "카드");
        assert!(!first.already_paid);
        assert!(!first.simulation);

        let stored = store.get(&OrderId::new("HO-1-aaaa")).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Paid);
        assert_eq!(stored.payment_key.as_deref(), Some("tgen_20260101_abc"));
        assert!(stored.paid_at.is_some());

        let second = service.confirm(request("HO-1-aaaa", 48_500), &ctx).await.unwrap();
        assert!(second.already_paid);
        assert_eq!(second.method, "카드");
    }

    #[tokio::test]
    async fn test_amount_mismatch_fails_order_without_gateway_call() {
        let dir = TempDir::new().unwrap();
        let store = OrderStore::new(dir.path());
        pending_order(&store, "HO-2-bbbb").await;

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let service = PaymentService::new(
            store.clone(),
            Some(gateway(&server, Duration::from_secs(5))),
            ConversionTracker::default(),
        );

        let err = service
            .confirm(request("HO-2-bbbb", 100), &ClientContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::AmountMismatch { .. }));

        let stored = store.get(&OrderId::new("HO-2-bbbb")).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Failed);
    }

    #[tokio::test]
    async fn test_gateway_rejection_fails_order() {
        let dir = TempDir::new().unwrap();
        let store = OrderStore::new(dir.path());
        pending_order(&store, "HO-3-cccc").await;

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "code": "REJECT_CARD_PAYMENT",
                "message": "한도초과 혹은 잔액부족으로 결제에 실패했습니다.",
            })))
            .mount(&server)
            .await;

        let service = PaymentService::new(
            store.clone(),
            Some(gateway(&server, Duration::from_secs(5))),
            ConversionTracker::default(),
        );

        let err = service
            .confirm(request("HO-3-cccc", 48_500), &ClientContext::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PaymentError::GatewayRejected { status: 403, ref code, .. } if code == "REJECT_CARD_PAYMENT"
        ));

        let stored = store.get(&OrderId::new("HO-3-cccc")).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Failed);
    }

    #[tokio::test]
    async fn test_failed_order_can_be_retried() {
        let dir = TempDir::new().unwrap();
        let store = OrderStore::new(dir.path());
        pending_order(&store, "HO-4-dddd").await;
        store
            .update(&OrderId::new("HO-4-dddd"), OrderPatch::status(OrderStatus::Failed))
            .await
            .unwrap();

        let service = PaymentService::new(store.clone(), None, ConversionTracker::default());
        let outcome = service
            .confirm(request("HO-4-dddd", 48_500), &ClientContext::default())
            .await
            .unwrap();
        assert!(outcome.simulation);
    }

    #[tokio::test]
    async fn test_timeout_leaves_order_pending() {
        let dir = TempDir::new().unwrap();
        let store = OrderStore::new(dir.path());
        pending_order(&store, "HO-5-eeee").await;

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(approved("HO-5-eeee", 48_500))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let service = PaymentService::new(
            store.clone(),
            Some(gateway(&server, Duration::from_millis(50))),
            ConversionTracker::default(),
        );

        let err = service
            .confirm(request("HO-5-eeee", 48_500), &ClientContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::GatewayTimeout(_)));

        let stored = store.get(&OrderId::new("HO-5-eeee")).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_approved_amount_mismatch_fails_order() {
        let dir = TempDir::new().unwrap();
        let store = OrderStore::new(dir.path());
        pending_order(&store, "HO-6-ffff").await;

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(approved("HO-6-ffff", 1_000)))
            .mount(&server)
            .await;

        let service = PaymentService::new(
            store.clone(),
            Some(gateway(&server, Duration::from_secs(5))),
            ConversionTracker::default(),
        );

        let err = service
            .confirm(request("HO-6-ffff", 48_500), &ClientContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::AmountMismatch { actual, .. } if actual == Won::new(1_000)));

        let stored = store.get(&OrderId::new("HO-6-ffff")).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Failed);
    }

    #[tokio::test]
    async fn test_simulation_mode() {
        let dir = TempDir::new().unwrap();
        let store = OrderStore::new(dir.path());
        pending_order(&store, "HO-7-0000").await;

        let service = PaymentService::new(store.clone(), None, ConversionTracker::default());
        assert!(service.is_simulation());

        let outcome = service
            .confirm(request("HO-7-0000", 48_500), &ClientContext::default())
            .await
            .unwrap();
        assert!(outcome.simulation);
        assert_eq!(outcome.method, SIMULATION_METHOD);

        let stored = store.get(&OrderId::new("HO-7-0000")).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Paid);
        assert_eq!(stored.payment_key.as_deref(), Some("tgen_20260101_abc"));
    }

    #[tokio::test]
    async fn test_unknown_order_and_missing_fields() {
        let dir = TempDir::new().unwrap();
        let store = OrderStore::new(dir.path());
        let service = PaymentService::new(store, None, ConversionTracker::default());
        let ctx = ClientContext::default();

        assert!(matches!(
            service.confirm(request("HO-404", 48_500), &ctx).await,
            Err(PaymentError::NotFound(_))
        ));
        assert!(matches!(
            service.confirm(request("HO-404", 0), &ctx).await,
            Err(PaymentError::Validation(_))
        ));
        assert!(matches!(
            service.confirm(ConfirmRequest::default(), &ctx).await,
            Err(PaymentError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_cancelled_order_is_not_confirmable() {
        let dir = TempDir::new().unwrap();
        let store = OrderStore::new(dir.path());
        pending_order(&store, "HO-8-1111").await;
        store
            .update(&OrderId::new("HO-8-1111"), OrderPatch::status(OrderStatus::Cancelled))
            .await
            .unwrap();

        let service = PaymentService::new(store, None, ConversionTracker::default());
        assert!(matches!(
            service.confirm(request("HO-8-1111", 48_500), &ClientContext::default()).await,
            Err(PaymentError::NotConfirmable { .. })
        ));
        let stored = service.store.get(&OrderId::new("HO-8-1111")).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_shipped_order_counts_as_already_paid() {
        let dir = TempDir::new().unwrap();
        let store = OrderStore::new(dir.path());
        pending_order(&store, "HO-8-2222").await;
        store
            .update(&OrderId::new("HO-8-2222"), OrderPatch::status(OrderStatus::Shipped))
            .await
            .unwrap();

        let service = PaymentService::new(store, None, ConversionTracker::default());
        let outcome = service
            .confirm(request("HO-8-2222", 48_500), &ClientContext::default())
            .await
            .unwrap();
        assert!(outcome.already_paid);
        assert!(!outcome.simulation);
    }
}
