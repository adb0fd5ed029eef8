//! Order creation with server-side price authority.
//!
//! The browser cart posts its items plus the totals it showed the buyer.
//! Totals are recomputed from per-item prices; a claimed total that does not
//! match is rejected, and nothing is persisted.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};

use silvertape_core::{CartItem, Order, OrderId, PriceBreakdown, ShippingInfo, Won};

use crate::middleware::ClientContext;
use crate::services::conversions::{BuyerData, ConversionEvent, ConversionTracker};
use crate::store::{OrderStore, OrderStoreError};

/// Errors from order creation and lookup.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Required fields missing or cart contents invalid.
    #[error("{0}")]
    Validation(String),

    /// The claimed total differs from the recomputed one.
    #[error("amount mismatch: expected {expected}, claimed {claimed}")]
    AmountMismatch { expected: Won, claimed: Won },

    /// Order storage failed.
    #[error("order store error: {0}")]
    Store(#[from] OrderStoreError),
}

/// Order creation request as posted by the checkout page.
///
/// Every field defaults so that missing fields surface as validation errors
/// rather than body rejections.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub shipping: ShippingInfo,
    /// Subtotal shown to the buyer. Informational only.
    #[serde(default)]
    pub subtotal: Option<Won>,
    /// Shipping fee shown to the buyer. Informational only.
    #[serde(default)]
    pub shipping_fee: Option<Won>,
    /// Total shown to the buyer. Must match the recomputed total.
    #[serde(default)]
    pub total_amount: Option<Won>,
}

/// A newly created pending order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedOrder {
    pub order_id: OrderId,
    pub total_amount: Won,
}

/// Creates and reads orders.
#[derive(Clone)]
pub struct OrderService {
    store: OrderStore,
    tracker: ConversionTracker,
}

impl OrderService {
    #[must_use]
    pub const fn new(store: OrderStore, tracker: ConversionTracker) -> Self {
        Self { store, tracker }
    }

    /// Validate the cart, recompute its price and persist a `Pending` order.
    ///
    /// Sends an `InitiateCheckout` conversion event in the background.
    ///
    /// # Errors
    ///
    /// - `Validation` if items, shipping name or total are missing, or an
    ///   item has a zero quantity or negative price
    /// - `AmountMismatch` if the claimed total differs from the recomputed one
    /// - `Store` if the order cannot be written
    #[instrument(skip(self, request, client), fields(items = request.items.len()))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
        client: &ClientContext,
    ) -> Result<CreatedOrder, OrderError> {
        let claimed_total = match request.total_amount {
            Some(total) if !total.is_zero() => total,
            _ => return Err(missing_fields()),
        };
        if request.items.is_empty() || request.shipping.name.trim().is_empty() {
            return Err(missing_fields());
        }

        let price = PriceBreakdown::from_items(&request.items)
            .map_err(|e| OrderError::Validation(e.to_string()))?;

        if let Some(claimed) = request.subtotal.filter(|s| *s != price.subtotal) {
            warn!(claimed = %claimed, computed = %price.subtotal, "claimed subtotal differs");
        }
        if let Some(claimed) = request.shipping_fee.filter(|s| *s != price.shipping_fee) {
            warn!(claimed = %claimed, computed = %price.shipping_fee, "claimed shipping fee differs");
        }

        if claimed_total != price.total {
            warn!(
                claimed = %claimed_total,
                computed = %price.total,
                "order rejected: total mismatch"
            );
            return Err(OrderError::AmountMismatch {
                expected: price.total,
                claimed: claimed_total,
            });
        }

        let now = Utc::now();
        let order = Order::new_pending(
            OrderId::generate(now),
            request.items,
            request.shipping,
            price,
            now,
        );
        self.store.save(&order).await?;

        info!(
            order_id = %order.order_id,
            total = %order.total_amount,
            "order created"
        );

        self.tracker.track(
            ConversionEvent::InitiateCheckout {
                order_id: order.order_id.clone(),
                value: order.total_amount,
                num_items: order.item_count(),
            },
            BuyerData::from_order(&order.shipping, client),
        );

        Ok(CreatedOrder {
            order_id: order.order_id,
            total_amount: order.total_amount,
        })
    }

    /// Look up an order.
    ///
    /// # Errors
    ///
    /// Returns `Store` if the record exists but cannot be read.
    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: &OrderId) -> Result<Option<Order>, OrderError> {
        if order_id.is_blank() {
            return Ok(None);
        }
        Ok(self.store.get(order_id).await?)
    }
}

fn missing_fields() -> OrderError {
    OrderError::Validation("items, shipping.name and totalAmount are required".to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use silvertape_core::OrderStatus;
    use tempfile::TempDir;

    use super::*;

    fn service() -> (TempDir, OrderService) {
        let dir = TempDir::new().unwrap();
        let store = OrderStore::new(dir.path());
        (dir, OrderService::new(store, ConversionTracker::default()))
    }

    fn item(product_id: &str, print: i64, frame: i64, quantity: u32) -> CartItem {
        CartItem {
            id: format!("{product_id}-a3"),
            product_id: product_id.to_string(),
            product_title: "Untitled".to_string(),
            size: "A3".to_string(),
            quantity,
            print_price: Won::new(print),
            frame_price: Won::new(frame),
            ..CartItem::default()
        }
    }

    fn request(items: Vec<CartItem>, total: i64) -> CreateOrderRequest {
        CreateOrderRequest {
            items,
            shipping: ShippingInfo {
                name: "김민지".to_string(),
                phone: "010-1234-5678".to_string(),
                ..ShippingInfo::default()
            },
            subtotal: None,
            shipping_fee: None,
            total_amount: Some(Won::new(total)),
        }
    }

    #[tokio::test]
    async fn test_create_order_adds_shipping_below_threshold() {
        let (_dir, service) = service();

        let created = service
            .create_order(
                request(vec![item("p1", 30_000, 15_000, 1)], 48_500),
                &ClientContext::default(),
            )
            .await
            .unwrap();

        assert_eq!(created.total_amount, Won::new(48_500));
        let stored = service.get_order(&created.order_id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
        assert_eq!(stored.subtotal, Won::new(45_000));
        assert_eq!(stored.shipping_fee, Won::new(3_500));
        assert!(created.order_id.as_str().starts_with("HO-"));
    }

    #[tokio::test]
    async fn test_create_order_free_shipping_at_threshold() {
        let (_dir, service) = service();

        let created = service
            .create_order(
                request(vec![item("p1", 20_000, 0, 2), item("p2", 10_000, 10_000, 1)], 60_000),
                &ClientContext::default(),
            )
            .await
            .unwrap();

        assert_eq!(created.total_amount, Won::new(60_000));
    }

    #[tokio::test]
    async fn test_tampered_total_is_rejected_and_not_persisted() {
        let (_dir, service) = service();

        let err = service
            .create_order(
                request(vec![item("p1", 30_000, 15_000, 1)], 999_999),
                &ClientContext::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OrderError::AmountMismatch { expected, claimed }
                if expected == Won::new(48_500) && claimed == Won::new(999_999)
        ));
        assert!(service.store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_claimed_subtotal_mismatch_is_not_fatal() {
        let (_dir, service) = service();
        let mut req = request(vec![item("p1", 30_000, 15_000, 1)], 48_500);
        req.subtotal = Some(Won::new(1));
        req.shipping_fee = Some(Won::ZERO);

        assert!(service.create_order(req, &ClientContext::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_fields_are_validation_errors() {
        let (_dir, service) = service();
        let ctx = ClientContext::default();

        let empty_cart = request(vec![], 3_500);
        assert!(matches!(
            service.create_order(empty_cart, &ctx).await,
            Err(OrderError::Validation(_))
        ));

        let mut no_name = request(vec![item("p1", 10_000, 0, 1)], 13_500);
        no_name.shipping.name = "  ".to_string();
        assert!(matches!(
            service.create_order(no_name, &ctx).await,
            Err(OrderError::Validation(_))
        ));

        let mut no_total = request(vec![item("p1", 10_000, 0, 1)], 0);
        assert!(matches!(
            service.create_order(no_total.clone(), &ctx).await,
            Err(OrderError::Validation(_))
        ));
        no_total.total_amount = None;
        assert!(matches!(
            service.create_order(no_total, &ctx).await,
            Err(OrderError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_zero_quantity_is_rejected() {
        let (_dir, service) = service();

        let result = service
            .create_order(
                request(vec![item("p1", 10_000, 0, 0)], 3_500),
                &ClientContext::default(),
            )
            .await;

        assert!(matches!(result, Err(OrderError::Validation(_))));
    }

    #[tokio::test]
    async fn test_get_order_unknown_and_blank() {
        let (_dir, service) = service();

        assert!(service.get_order(&OrderId::new("HO-0-missing")).await.unwrap().is_none());
        assert!(service.get_order(&OrderId::new("../..")).await.unwrap().is_none());
        assert!(service.get_order(&OrderId::new("")).await.unwrap().is_none());
    }

    #[test]
    fn test_request_deserializes_with_missing_fields() {
        let req: CreateOrderRequest = serde_json::from_value(serde_json::json!({
            "items": [],
        }))
        .unwrap();
        assert!(req.total_amount.is_none());
        assert!(req.shipping.name.is_empty());
    }
}
