// models/billing.rs
//
// Read models for the records a payer sees. All of these are owned by
// the backend; this layer reads them for rendering and re-reads them
// after a successful payment to pick up the status flip.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Uuid,
    pub invoice_number: String,
    pub amount: f64,
    pub currency: String,
    pub status: String,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentLink {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    /// None means the payer chooses the amount.
    #[serde(default)]
    pub amount: Option<f64>,
    pub currency: String,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Uuid,
    pub plan_name: String,
    pub amount: f64,
    pub currency: String,
    pub status: String,
    #[serde(default)]
    pub next_billing_date: Option<DateTime<Utc>>,
}
