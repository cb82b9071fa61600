use axum::{
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;

use crate::handlers::payments;
use crate::state::AppState;

pub fn payment_routes() -> Router<AppState> {
    Router::new()
        // Health
        .route("/health", get(payments_health))

        // The three pay pages
        .route("/invoices/:id/pay", post(payments::pay_invoice))
        .route("/links/:slug/pay", post(payments::pay_link))
        .route("/subscriptions/:id/charge", post(payments::charge_subscription))

        // Attempt lifecycle: the pages poll GET and DELETE on unmount
        .route(
            "/attempts/:id",
            get(payments::get_attempt).delete(payments::cancel_attempt),
        )
}

async fn payments_health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "payments",
        "timestamp": Utc::now().to_rfc3339(),
        "features": ["stk-push", "confirmation-watch", "invoices", "links", "subscriptions"]
    }))
}
