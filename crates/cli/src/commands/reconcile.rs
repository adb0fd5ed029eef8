//! Payment reconciliation command.
//!
//! Settles orders left `pending` by gateway timeouts. The per-order lock is
//! in-process only and does not coordinate with a running storefront, so the
//! threshold must stay well above the gateway timeout.

use silvertape_core::OrderId;
use silvertape_storefront::config::StorefrontConfig;
use silvertape_storefront::services::ReconcileOutcome;
use silvertape_storefront::state::AppState;
use tracing::{info, warn};

use super::stale_threshold;

/// Reconcile one order, or every stale pending order.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the order directory cannot
/// be read, or a single-order run fails.
pub async fn run(
    minutes: Option<u64>,
    order_id: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let state = AppState::new(StorefrontConfig::from_env()?)?;
    let stale_after = match minutes {
        Some(_) => stale_threshold(minutes)?,
        None => state.config().stale_order_after,
    };

    if state.payments().is_simulation() {
        warn!("TOSS_CLIENT_KEY/TOSS_SECRET_KEY not set, nothing to reconcile against");
    }

    if let Some(order_id) = order_id {
        let order_id = OrderId::new(order_id);
        let outcome = state.reconciler().reconcile_order(&order_id).await?;
        print_line(&order_id, &outcome.to_string());
        return Ok(());
    }

    let report = state.reconciler().reconcile_stale(stale_after).await?;

    let mut settled = 0usize;
    let mut errors = 0usize;
    for entry in &report {
        match &entry.result {
            Ok(outcome) => {
                if matches!(
                    outcome,
                    ReconcileOutcome::Paid { .. } | ReconcileOutcome::Failed { .. }
                ) {
                    settled += 1;
                }
                print_line(&entry.order_id, &outcome.to_string());
            }
            Err(e) => {
                errors += 1;
                print_line(&entry.order_id, &format!("error: {e}"));
            }
        }
    }

    info!(
        checked = report.len(),
        settled, errors, "Reconciliation complete"
    );
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_line(order_id: &OrderId, outcome: &str) {
    println!("{order_id:<32} {outcome}");
}
