//! Core types for SILVERTAPE.
//!
//! This module provides type-safe wrappers for the order domain.

pub mod id;
pub mod money;
pub mod order;
pub mod status;

pub use id::OrderId;
pub use money::{FREE_SHIPPING_THRESHOLD, SHIPPING_FEE, Won, shipping_fee_for};
pub use order::{CartItem, Order, OrderPatch, PriceBreakdown, PricingError, ShippingInfo};
pub use status::OrderStatus;
