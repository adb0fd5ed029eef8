//! Payment confirmation route handler.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde::Serialize;
use tracing::instrument;

use silvertape_core::{OrderId, Won};

use crate::error::{AppError, Result};
use crate::middleware::ClientContext;
use crate::services::{ConfirmOutcome, ConfirmRequest};
use crate::state::AppState;

/// Successful confirmation response.
///
/// `alreadyPaid` and `simulation` are only present when true.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmResponse {
    pub success: bool,
    pub order_id: OrderId,
    pub amount: Won,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub already_paid: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simulation: Option<bool>,
}

impl From<ConfirmOutcome> for ConfirmResponse {
    fn from(outcome: ConfirmOutcome) -> Self {
        Self {
            success: true,
            order_id: outcome.order_id,
            amount: outcome.amount,
            method: outcome.method,
            already_paid: outcome.already_paid.then_some(true),
            simulation: outcome.simulation.then_some(true),
        }
    }
}

/// Confirm the payment the buyer approved in the gateway widget.
///
/// Safe to retry: a second call for a paid order returns `alreadyPaid`
/// without reaching the gateway.
#[instrument(skip(state, client, payload))]
pub async fn confirm(
    State(state): State<AppState>,
    client: ClientContext,
    payload: std::result::Result<Json<ConfirmRequest>, JsonRejection>,
) -> Result<Json<ConfirmResponse>> {
    let Json(request) = payload.map_err(|e| AppError::Validation(e.body_text()))?;
    let outcome = state.payments().confirm(request, &client).await?;
    Ok(Json(outcome.into()))
}
