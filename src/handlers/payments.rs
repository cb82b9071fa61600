// handlers/payments.rs
//
// The three payment call sites (invoice, payment link, subscription) and
// the attempt endpoints the pages poll to render their panels. Each pay
// handler does the same dance: load the target, validate the form,
// refuse a second attempt while one is pending, initiate the charge, and
// hand the reference to the attempt tracker.
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::config::AppConfig;
use crate::errors::{AppError, Result};
use crate::models::attempt::{PaymentAttempt, PaymentTarget};
use crate::services::gateway::ChargeRequest;
use crate::services::poller::PollPlan;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct PayRequest {
    #[validate(custom(function = crate::validation::msisdn))]
    pub phone_number: String,

    /// Only meaningful for payment links without a fixed amount; invoices
    /// and subscriptions always charge their own amount.
    #[validate(range(min = 1.0, message = "Amount must be at least 1"))]
    pub amount: Option<f64>,

    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PayResponse {
    pub success: bool,
    pub attempt_id: Uuid,
    pub checkout_request_id: String,
    pub customer_message: String,
}

fn ensure_min_amount(amount: f64, config: &AppConfig) -> Result<()> {
    if amount < config.min_amount {
        return Err(AppError::invalid_data(format!(
            "Amount must be at least {}",
            config.min_amount
        )));
    }
    Ok(())
}

async fn initiate_and_watch(
    state: &AppState,
    target: PaymentTarget,
    request: &PayRequest,
    amount: f64,
    account_reference: String,
    description: String,
) -> Result<(PaymentAttempt, String)> {
    // Claim the target before charging: the claim is held across the
    // gateway round trip, so two concurrent submissions cannot both
    // trigger a phone prompt. A failed initiation drops the reservation
    // and frees the target for a retry.
    let reservation = state.attempts.reserve(target.clone())?;

    let receipt = state
        .gateway
        .initiate_charge(ChargeRequest {
            phone_number: request.phone_number.trim().to_string(),
            amount,
            account_reference,
            description,
        })
        .await?;

    info!(
        "Charge initiated for {}: {}",
        target, receipt.merchant_request_id
    );

    let plan = match &target {
        PaymentTarget::Invoice(_) => PollPlan::invoice(),
        PaymentTarget::PaymentLink(_) => PollPlan::payment_link(),
        PaymentTarget::Subscription(_) => PollPlan::subscription(),
    };

    let attempt = reservation.commit(receipt.checkout_request_id.clone(), plan)?;
    Ok((attempt, receipt.customer_message))
}

fn accepted(attempt: &PaymentAttempt, customer_message: String) -> (StatusCode, Json<PayResponse>) {
    (
        StatusCode::ACCEPTED,
        Json(PayResponse {
            success: true,
            attempt_id: attempt.id,
            checkout_request_id: attempt.reference.clone(),
            customer_message,
        }),
    )
}

pub async fn pay_invoice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<PayRequest>,
) -> Result<impl IntoResponse> {
    request.validate()?;
    state.attempts.ensure_idle(&PaymentTarget::Invoice(id))?;

    let invoice = state
        .store
        .get_invoice(id)
        .await?
        .ok_or(AppError::InvoiceNotFound)?;

    if invoice.status == "paid" {
        return Err(AppError::invalid_data("Invoice is already paid"));
    }

    ensure_min_amount(invoice.amount, &state.config)?;

    let description = request
        .description
        .clone()
        .unwrap_or_else(|| format!("Invoice {}", invoice.invoice_number));

    let (attempt, customer_message) = initiate_and_watch(
        &state,
        PaymentTarget::Invoice(id),
        &request,
        invoice.amount,
        invoice.invoice_number.clone(),
        description,
    )
    .await?;

    info!("Invoice {} payment attempt {} started", id, attempt.id);
    Ok(accepted(&attempt, customer_message))
}

pub async fn pay_link(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(request): Json<PayRequest>,
) -> Result<impl IntoResponse> {
    request.validate()?;
    state
        .attempts
        .ensure_idle(&PaymentTarget::PaymentLink(slug.clone()))?;

    let link = state
        .store
        .get_payment_link(&slug)
        .await?
        .ok_or(AppError::PaymentLinkNotFound)?;

    if !link.active {
        return Err(AppError::invalid_data("This payment link is no longer active"));
    }

    let amount = match link.amount.or(request.amount) {
        Some(amount) => amount,
        None => {
            return Err(AppError::invalid_data(
                "Amount is required for this payment link",
            ))
        }
    };
    ensure_min_amount(amount, &state.config)?;

    let description = request
        .description
        .clone()
        .unwrap_or_else(|| link.title.clone());

    let (attempt, customer_message) = initiate_and_watch(
        &state,
        PaymentTarget::PaymentLink(slug.clone()),
        &request,
        amount,
        slug,
        description,
    )
    .await?;

    info!("Payment link attempt {} started", attempt.id);
    Ok(accepted(&attempt, customer_message))
}

pub async fn charge_subscription(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<PayRequest>,
) -> Result<impl IntoResponse> {
    request.validate()?;
    state
        .attempts
        .ensure_idle(&PaymentTarget::Subscription(id))?;

    let subscription = state
        .store
        .get_subscription(id)
        .await?
        .ok_or(AppError::SubscriptionNotFound)?;

    if subscription.status == "canceled" {
        return Err(AppError::invalid_data("Subscription is canceled"));
    }

    ensure_min_amount(subscription.amount, &state.config)?;

    let description = request
        .description
        .clone()
        .unwrap_or_else(|| format!("Subscription: {}", subscription.plan_name));

    let (attempt, customer_message) = initiate_and_watch(
        &state,
        PaymentTarget::Subscription(id),
        &request,
        subscription.amount,
        subscription.plan_name.clone(),
        description,
    )
    .await?;

    info!("Subscription {} charge attempt {} started", id, attempt.id);
    Ok(accepted(&attempt, customer_message))
}

pub async fn get_attempt(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let attempt = state.attempts.get(id)?;
    Ok(Json(attempt))
}

pub async fn cancel_attempt(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state.attempts.cancel(id)?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Stopped watching the payment attempt"
    })))
}
