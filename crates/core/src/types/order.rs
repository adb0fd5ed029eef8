//! Orders, cart snapshots, and server-side price computation.
//!
//! The browser cart posts its items together with the totals it displayed.
//! Only the per-item unit prices and quantities are used here; the claimed
//! totals are compared against [`PriceBreakdown::from_items`] by the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::id::OrderId;
use super::money::{Won, shipping_fee_for};
use super::status::OrderStatus;

/// Errors computing the price of a cart.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    /// The cart has no items.
    #[error("cart is empty")]
    EmptyCart,
    /// An item has a zero quantity.
    #[error("invalid quantity for product {0}")]
    InvalidQuantity(String),
    /// An item has a negative unit price.
    #[error("negative price for product {0}")]
    NegativePrice(String),
    /// The total does not fit in an `i64`.
    #[error("order amount overflow")]
    Overflow,
}

/// One cart line as supplied by the browser.
///
/// Labels are opaque display data. Only `quantity`, `print_price` and
/// `frame_price` feed the price computation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    /// Client-side cart line ID.
    #[serde(default)]
    pub id: String,
    pub product_id: String,
    #[serde(default)]
    pub product_title: String,
    #[serde(default)]
    pub product_image: String,
    #[serde(default)]
    pub studio_id: String,
    #[serde(default)]
    pub studio_name: String,
    #[serde(default)]
    pub studio_slug: String,
    /// Print size label (e.g. "A3").
    pub size: String,
    /// Frame colour label (e.g. "walnut", "none").
    pub frame: String,
    #[serde(default)]
    pub artwork_bg: String,
    pub quantity: u32,
    /// Unit price of the print.
    pub print_price: Won,
    /// Unit surcharge for the chosen frame.
    pub frame_price: Won,
}

impl CartItem {
    /// Unit price including the frame surcharge.
    #[must_use]
    pub fn unit_price(&self) -> Option<Won> {
        self.print_price.checked_add(self.frame_price)
    }

    /// `(print_price + frame_price) * quantity`.
    #[must_use]
    pub fn line_total(&self) -> Option<Won> {
        self.unit_price()?.checked_mul(self.quantity)
    }
}

/// Shipping destination entered at checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShippingInfo {
    pub name: String,
    pub phone: String,
    pub postal_code: String,
    pub address: String,
    pub address_detail: String,
    /// Delivery note for the courier.
    pub memo: String,
}

/// Server-computed amounts for a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceBreakdown {
    pub subtotal: Won,
    pub shipping_fee: Won,
    pub total: Won,
}

impl PriceBreakdown {
    /// Compute subtotal, shipping fee and total from per-item prices.
    ///
    /// # Errors
    ///
    /// Returns `PricingError` if the cart is empty, an item has a zero
    /// quantity or a negative price, or the sum overflows.
    pub fn from_items(items: &[CartItem]) -> Result<Self, PricingError> {
        if items.is_empty() {
            return Err(PricingError::EmptyCart);
        }

        let mut subtotal = Won::ZERO;
        for item in items {
            if item.quantity == 0 {
                return Err(PricingError::InvalidQuantity(item.product_id.clone()));
            }
            if item.print_price.is_negative() || item.frame_price.is_negative() {
                return Err(PricingError::NegativePrice(item.product_id.clone()));
            }
            let line = item.line_total().ok_or(PricingError::Overflow)?;
            subtotal = subtotal.checked_add(line).ok_or(PricingError::Overflow)?;
        }

        let shipping_fee = shipping_fee_for(subtotal);
        let total = subtotal
            .checked_add(shipping_fee)
            .ok_or(PricingError::Overflow)?;

        Ok(Self {
            subtotal,
            shipping_fee,
            total,
        })
    }
}

/// A persisted purchase attempt.
///
/// Monetary fields are fixed at creation. Later changes go through
/// [`OrderPatch`], which cannot express them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: OrderId,
    pub items: Vec<CartItem>,
    pub shipping: ShippingInfo,
    pub subtotal: Won,
    pub shipping_fee: Won,
    /// Always `subtotal + shipping_fee`.
    pub total_amount: Won,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Build a new `Pending` order from a priced cart.
    #[must_use]
    pub fn new_pending(
        order_id: OrderId,
        items: Vec<CartItem>,
        shipping: ShippingInfo,
        price: PriceBreakdown,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            order_id,
            items,
            shipping,
            subtotal: price.subtotal,
            shipping_fee: price.shipping_fee,
            total_amount: price.total,
            payment_key: None,
            payment_method: None,
            paid_at: None,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// Shallow-merge a patch and stamp `updated_at`.
    pub fn apply(&mut self, patch: OrderPatch, now: DateTime<Utc>) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(payment_key) = patch.payment_key {
            self.payment_key = Some(payment_key);
        }
        if let Some(payment_method) = patch.payment_method {
            self.payment_method = Some(payment_method);
        }
        if let Some(paid_at) = patch.paid_at {
            self.paid_at = Some(paid_at);
        }
        self.updated_at = now;
    }
}

/// Partial update to an [`Order`]. Present fields replace current values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderPatch {
    pub status: Option<OrderStatus>,
    pub payment_key: Option<String>,
    pub payment_method: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl OrderPatch {
    /// Change only the status.
    #[must_use]
    pub fn status(status: OrderStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Mark as paid with the gateway's payment reference.
    #[must_use]
    pub fn paid(
        payment_key: impl Into<String>,
        payment_method: impl Into<String>,
        paid_at: DateTime<Utc>,
    ) -> Self {
        Self {
            status: Some(OrderStatus::Paid),
            payment_key: Some(payment_key.into()),
            payment_method: Some(payment_method.into()),
            paid_at: Some(paid_at),
        }
    }
}
