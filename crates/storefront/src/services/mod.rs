//! Business logic services for storefront.
//!
//! # Services
//!
//! - `orders` - Order creation with server-side price recomputation
//! - `payment` - Idempotent payment confirmation against the gateway
//! - `reconcile` - Settling orders left `pending` by gateway timeouts
//! - `conversions` - Fire-and-forget checkout/purchase conversion events
//!
//! Services are cheap to clone and hold no request state. All order writes
//! go through [`crate::store::OrderStore`].

pub mod conversions;
pub mod orders;
pub mod payment;
pub mod reconcile;

pub use conversions::{ConversionTracker, MetaConversionsClient};
pub use orders::{CreateOrderRequest, CreatedOrder, OrderError, OrderService};
pub use payment::{ConfirmOutcome, ConfirmRequest, PaymentError, PaymentService};
pub use reconcile::{ReconcileEntry, ReconcileError, ReconcileOutcome, Reconciler};
