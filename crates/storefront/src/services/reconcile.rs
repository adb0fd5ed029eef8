//! Reconciliation of orders stuck in `pending`.
//!
//! A confirmation that times out leaves the order `pending` even though the
//! gateway may have captured the money. This service asks the gateway what
//! actually happened and settles the order accordingly.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use silvertape_core::{Order, OrderId, OrderPatch, OrderStatus, Won};

use crate::middleware::ClientContext;
use crate::payments::{PaymentStatus, TossClient, TossError};
use crate::services::conversions::{BuyerData, ConversionEvent, ConversionTracker};
use crate::store::{OrderStore, OrderStoreError};

/// Errors from reconciliation.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Order storage failed.
    #[error("order store error: {0}")]
    Store(#[from] OrderStoreError),

    /// The gateway lookup failed.
    #[error("gateway error: {0}")]
    Gateway(#[from] TossError),
}

/// What reconciliation did to one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The gateway captured the payment; the order is now `paid`.
    Paid { amount: Won, method: String },
    /// The payment never completed; the order is now `failed`.
    Failed { reason: String },
    /// The gateway still reports the payment as in flight.
    StillPending { gateway_status: PaymentStatus },
    /// The order had already left `pending`.
    AlreadySettled { status: OrderStatus },
    /// No gateway configured; nothing to ask.
    Skipped,
    /// No such order.
    NotFound,
}

impl std::fmt::Display for ReconcileOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Paid { amount, method } => write!(f, "paid ({amount}, {method})"),
            Self::Failed { reason } => write!(f, "failed ({reason})"),
            Self::StillPending { gateway_status } => {
                write!(f, "still pending (gateway: {gateway_status:?})")
            }
            Self::AlreadySettled { status } => write!(f, "already {status}"),
            Self::Skipped => f.write_str("skipped (no gateway configured)"),
            Self::NotFound => f.write_str("not found"),
        }
    }
}

/// One line of a batch reconciliation report.
#[derive(Debug)]
pub struct ReconcileEntry {
    pub order_id: OrderId,
    pub result: Result<ReconcileOutcome, ReconcileError>,
}

/// Settles stale `pending` orders against the gateway.
#[derive(Clone)]
pub struct Reconciler {
    store: OrderStore,
    gateway: Option<TossClient>,
    tracker: ConversionTracker,
}

impl Reconciler {
    /// Create the reconciler. `gateway: None` turns every run into a no-op.
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

    /// `pending` orders created more than `older_than` ago, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the order directory cannot be listed.
    pub async fn find_stale(&self, older_than: Duration) -> Result<Vec<Order>, OrderStoreError> {
        let Some(cutoff) = cutoff(Utc::now(), older_than) else {
            return Ok(Vec::new());
        };

        Ok(self
            .store
            .list()
            .await?
            .into_iter()
            .filter(|order| order.status == OrderStatus::Pending && order.created_at < cutoff)
            .collect())
    }

    /// Ask the gateway about one order and settle it.
    ///
    /// Runs under the same per-order lock as confirmation, so it never races
    /// a confirmation in progress.
    ///
    /// # Errors
    ///
    /// Returns an error if the store or the gateway lookup fails. The order
    /// is left untouched in that case.
    #[instrument(skip(self))]
    pub async fn reconcile_order(
        &self,
        order_id: &OrderId,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let Some(gateway) = &self.gateway else {
            return Ok(ReconcileOutcome::Skipped);
        };

        let _guard = self.store.lock(order_id).await;

        let Some(order) = self.store.get(order_id).await? else {
            return Ok(ReconcileOutcome::NotFound);
        };
        if order.status != OrderStatus::Pending {
            return Ok(ReconcileOutcome::AlreadySettled {
                status: order.status,
            });
        }

        let Some(payment) = gateway.payment_by_order_id(order_id).await? else {
            self.mark_failed(order_id).await?;
            info!("no payment at gateway, order failed");
            return Ok(ReconcileOutcome::Failed {
                reason: "no payment found at gateway".to_string(),
            });
        };

        match payment.status {
            PaymentStatus::Done if payment.total_amount == order.total_amount => {
                let method = payment.method_label();
                let patch = OrderPatch::paid(
                    payment.payment_key.clone(),
                    method.clone(),
                    payment.approved_at_utc(Utc::now()),
                );
                if let Some(paid) = self.store.update(order_id, patch).await? {
                    info!(amount = %paid.total_amount, "reconciled as paid");
                    self.tracker.track(
                        ConversionEvent::purchase(&paid, paid.total_amount),
                        BuyerData::from_order(&paid.shipping, &ClientContext::default()),
                    );
                }
                Ok(ReconcileOutcome::Paid {
                    amount: payment.total_amount,
                    method,
                })
            }
            PaymentStatus::Done => {
                error!(
                    approved = %payment.total_amount,
                    expected = %order.total_amount,
                    payment_key = %payment.payment_key,
                    "gateway captured a different amount"
                );
                self.mark_failed(order_id).await?;
                Ok(ReconcileOutcome::Failed {
                    reason: format!(
                        "amount mismatch: expected {}, captured {}",
                        order.total_amount, payment.total_amount
                    ),
                })
            }
            status if status.is_terminal_failure() => {
                self.mark_failed(order_id).await?;
                info!(gateway_status = ?status, "payment ended at gateway, order failed");
                Ok(ReconcileOutcome::Failed {
                    reason: format!("gateway status {status:?}"),
                })
            }
            status => {
                info!(gateway_status = ?status, "payment still in flight");
                Ok(ReconcileOutcome::StillPending {
                    gateway_status: status,
                })
            }
        }
    }

    /// Reconcile every `pending` order older than `older_than`.
    ///
    /// Failures for one order do not stop the run; they are reported in its
    /// entry.
    ///
    /// # Errors
    ///
    /// Returns an error only if the stale orders cannot be listed.
    #[instrument(skip(self))]
    pub async fn reconcile_stale(
        &self,
        older_than: Duration,
    ) -> Result<Vec<ReconcileEntry>, OrderStoreError> {
        let stale = self.find_stale(older_than).await?;
        let mut report = Vec::with_capacity(stale.len());

        for order in stale {
            let result = self.reconcile_order(&order.order_id).await;
            if let Err(e) = &result {
                warn!(order_id = %order.order_id, error = %e, "reconciliation failed");
            }
            report.push(ReconcileEntry {
                order_id: order.order_id,
                result,
            });
        }

        info!(orders = report.len(), "stale order reconciliation finished");
        Ok(report)
    }

    async fn mark_failed(&self, order_id: &OrderId) -> Result<(), OrderStoreError> {
        self.store
            .update(order_id, OrderPatch::status(OrderStatus::Failed))
            .await?;
        Ok(())
    }
}

/// Creation time before which an order counts as stale. `None` when the
/// threshold reaches past the start of representable time.
fn cutoff(now: DateTime<Utc>, older_than: Duration) -> Option<DateTime<Utc>> {
    TimeDelta::from_std(older_than)
        .ok()
        .and_then(|delta| now.checked_sub_signed(delta))
}
