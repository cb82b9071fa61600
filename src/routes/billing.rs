use axum::{routing::get, Router};

use crate::handlers::billing;
use crate::state::AppState;

pub fn billing_routes() -> Router<AppState> {
    Router::new()
        .route("/invoices/:id", get(billing::get_invoice))
        .route("/links/:slug", get(billing::get_payment_link))
        .route("/subscriptions/:id", get(billing::get_subscription))
}
