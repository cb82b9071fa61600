// models/transaction.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Server-authoritative transaction status. Written by the gateway
/// callback on the backend; this layer only ever reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

/// A transaction row as stored by the backend, looked up by its
/// correlation reference while a payment attempt is being watched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub transaction_ref: String,
    #[serde(default)]
    pub checkout_request_id: Option<String>,
    pub status: TransactionStatus,
    pub amount: f64,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub mpesa_receipt_number: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}
