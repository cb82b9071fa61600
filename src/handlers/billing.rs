// handlers/billing.rs
//
// Read endpoints for the public pay pages: an invoice by id, a payment
// link by slug. Rendering only; nothing here mutates the store.
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::state::AppState;

pub async fn get_invoice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let invoice = state
        .store
        .get_invoice(id)
        .await?
        .ok_or(AppError::InvoiceNotFound)?;
    Ok(Json(invoice))
}

pub async fn get_payment_link(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse> {
    let link = state
        .store
        .get_payment_link(&slug)
        .await?
        .ok_or(AppError::PaymentLinkNotFound)?;
    Ok(Json(link))
}

pub async fn get_subscription(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let subscription = state
        .store
        .get_subscription(id)
        .await?
        .ok_or(AppError::SubscriptionNotFound)?;
    Ok(Json(subscription))
}
