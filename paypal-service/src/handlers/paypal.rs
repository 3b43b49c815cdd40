//! PayPal checkout handlers.
//!
//! `checkout` sends the buyer to PayPal; the `/paypal-response/*` routes
//! receive the buyer when PayPal redirects back.

use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use tower_sessions::Session;

use crate::{
    dtos::{CheckoutRequest, CompleteParams},
    models::{PaymentResult, RefundResult},
    services::{metrics::record_outcome, GatewayOutcome},
    AppState,
};

/// Start a checkout and redirect the buyer to PayPal.
pub async fn checkout(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<CheckoutRequest>,
) -> Result<GatewayOutcome<()>, AppError> {
    tracing::info!(amount = %payload.amount, "Starting PayPal checkout");

    let result = state
        .gateway
        .payment(&session, payload.amount, payload.local_data)
        .await;
    record_outcome("checkout", &result);

    let outcome = result.map_err(|e| {
        tracing::error!(error = %e, "Failed to start PayPal checkout");
        e
    })?;

    Ok(outcome)
}

pub async fn complete(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<CompleteParams>,
) -> Result<GatewayOutcome<PaymentResult>, AppError> {
    settle(&state, &session, None, params).await
}

pub async fn complete_with_id(
    State(state): State<AppState>,
    session: Session,
    Path(trxid): Path<String>,
    Query(params): Query<CompleteParams>,
) -> Result<GatewayOutcome<PaymentResult>, AppError> {
    settle(&state, &session, Some(trxid), params).await
}

async fn settle(
    state: &AppState,
    session: &Session,
    trxid: Option<String>,
    params: CompleteParams,
) -> Result<GatewayOutcome<PaymentResult>, AppError> {
    tracing::info!(
        payer_id = %params.payer_id,
        payment_id = ?params.payment_id,
        token = ?params.token,
        "PayPal return received"
    );

    let result = state
        .gateway
        .complete(
            session,
            trxid.as_deref(),
            &params.payer_id,
            params.payment_id.as_deref(),
        )
        .await;
    record_outcome("complete", &result);

    let outcome = result.map_err(|e| {
        tracing::error!(error = %e, "Failed to complete PayPal payment");
        e
    })?;

    Ok(outcome)
}

pub async fn cancel(
    State(state): State<AppState>,
    session: Session,
) -> Result<GatewayOutcome<()>, AppError> {
    let result = state.gateway.cancel(&session, None).await;
    record_outcome("cancel", &result);
    Ok(result?)
}

pub async fn cancel_with_id(
    State(state): State<AppState>,
    session: Session,
    Path(trxid): Path<String>,
) -> Result<GatewayOutcome<()>, AppError> {
    let result = state.gateway.cancel(&session, Some(&trxid)).await;
    record_outcome("cancel", &result);
    Ok(result?)
}

/// PayPal hit the generic return endpoint without a flow to settle.
pub async fn unsolicited(uri: Uri) -> impl IntoResponse {
    tracing::debug!(uri = %uri, "Got an unsolicited call from PayPal");
    StatusCode::OK
}

/// Fully refund a settled payment.
pub async fn refund(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
) -> Result<GatewayOutcome<RefundResult>, AppError> {
    tracing::info!(payment_id = %payment_id, "Refunding PayPal payment");

    let result = state.gateway.refund_payment(&payment_id).await;
    record_outcome("refund", &result);

    let outcome = result.map_err(|e| {
        tracing::error!(payment_id = %payment_id, error = %e, "Failed to refund PayPal payment");
        e
    })?;

    Ok(outcome)
}
