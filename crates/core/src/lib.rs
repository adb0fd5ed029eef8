//! SILVERTAPE Core - Order and pricing domain types.
//!
//! This crate provides the types shared by the storefront server and the
//! operational CLI:
//! - `storefront` - Order creation and payment confirmation HTTP service
//! - `cli` - Order inspection and reconciliation tools
//!
//! # Architecture
//!
//! The core crate contains only types and pure pricing rules - no I/O, no
//! filesystem access, no HTTP clients. Prices are always recomputed from
//! per-item unit prices here, so every caller agrees on what an order costs.
//!
//! # Modules
//!
//! - [`types`] - Money, order identifiers, statuses, cart items and orders

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
