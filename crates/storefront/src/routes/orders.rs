//! Order route handlers.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use tracing::instrument;

use silvertape_core::{Order, OrderId};

use crate::error::{AppError, Result};
use crate::middleware::ClientContext;
use crate::services::{CreateOrderRequest, CreatedOrder};
use crate::state::AppState;

/// Create a pending order from the checkout cart.
///
/// The claimed total must match the server-side computation; the response
/// carries the verified total the payment widget should be opened with.
#[instrument(skip(state, client, payload))]
pub async fn create(
    State(state): State<AppState>,
    client: ClientContext,
    payload: std::result::Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<Json<CreatedOrder>> {
    let Json(request) = payload.map_err(|e| AppError::Validation(e.body_text()))?;
    let created = state.orders().create_order(request, &client).await?;
    Ok(Json(created))
}

/// Return the full order record.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<Order>> {
    state
        .orders()
        .get_order(&OrderId::new(order_id))
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))
}
