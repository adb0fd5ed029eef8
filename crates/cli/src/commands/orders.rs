//! Read-only order commands.

use silvertape_core::{Order, OrderId, OrderStatus};
use silvertape_storefront::services::Reconciler;
use silvertape_storefront::services::conversions::ConversionTracker;
use tracing::info;

use super::{order_store, stale_threshold};

/// Print one order as pretty JSON.
///
/// # Errors
///
/// Returns an error if the order is missing or cannot be read.
pub async fn show(order_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = order_store();
    let order = store
        .get(&OrderId::new(order_id))
        .await?
        .ok_or_else(|| format!("Order not found: {order_id}"))?;

    #[allow(clippy::print_stdout)]
    {
        println!("{}", serde_json::to_string_pretty(&order)?);
    }
    Ok(())
}

/// List stored orders, optionally filtered by status.
///
/// # Errors
///
/// Returns an error if the status is unknown or the directory cannot be read.
pub async fn list(status: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let status = status.map(str::parse::<OrderStatus>).transpose()?;

    let store = order_store();
    let orders: Vec<Order> = store
        .list()
        .await?
        .into_iter()
        .filter(|order| status.is_none_or(|s| order.status == s))
        .collect();

    info!(dir = %store.dir().display(), count = orders.len(), "Listed orders");
    print_table(&orders);
    Ok(())
}

/// List pending orders older than the threshold.
///
/// # Errors
///
/// Returns an error if the threshold is invalid or the directory cannot be read.
pub async fn stale(minutes: Option<u64>) -> Result<(), Box<dyn std::error::Error>> {
    let threshold = stale_threshold(minutes)?;

    // Finding stale orders never touches the gateway
    let reconciler = Reconciler::new(order_store(), None, ConversionTracker::default());
    let orders = reconciler.find_stale(threshold).await?;

    info!(
        minutes = threshold.as_secs() / 60,
        count = orders.len(),
        "Found stale pending orders"
    );
    print_table(&orders);
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_table(orders: &[Order]) {
    println!(
        "{:<32} {:<10} {:>12} {:>5}  {:<20}",
        "ORDER ID", "STATUS", "TOTAL", "QTY", "CREATED (UTC)"
    );
    for order in orders {
        println!(
            "{:<32} {:<10} {:>12} {:>5}  {:<20}",
            order.order_id,
            order.status,
            order.total_amount.to_string(),
            order.item_count(),
            order.created_at.format("%Y-%m-%d %H:%M:%S"),
        );
    }
}
