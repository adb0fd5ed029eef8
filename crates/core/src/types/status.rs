//! Order lifecycle status.

use serde::{Deserialize, Serialize};

/// Order lifecycle status.
///
/// The checkout flow only ever produces `Pending`, `Paid` and `Failed`.
/// The fulfillment states are part of the record format but are owned by
/// downstream fulfillment operations.
///
/// ```text
/// Pending ──► Paid ──► Preparing ──► Shipped ──► Delivered
///    │  ▲
///    ▼  │ (retry with a new payment)
///  Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created, awaiting payment confirmation.
    #[default]
    Pending,
    /// Payment confirmed by the gateway (or simulated).
    Paid,
    /// Gateway rejection or amount mismatch.
    Failed,
    Preparing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [Self; 7] = [
        Self::Pending,
        Self::Paid,
        Self::Failed,
        Self::Preparing,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
    ];

    /// Whether payment confirmation may move an order in this status to `Paid`.
    #[must_use]
    pub const fn is_confirmable(self) -> bool {
        matches!(self, Self::Pending | Self::Failed)
    }

    /// Whether the order has been paid, including every fulfillment step
    /// after payment. `Cancelled` is excluded.
    #[must_use]
    pub const fn is_paid_or_later(self) -> bool {
        matches!(
            self,
            Self::Paid | Self::Preparing | Self::Shipped | Self::Delivered
        )
    }

    /// The wire representation, as stored in order records.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Preparing => "preparing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("invalid order status: {s}"))
    }
}
