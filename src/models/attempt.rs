// models/attempt.rs
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// What the user is paying for. One active attempt is allowed per target
/// at a time; a second submission while one is pending is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum PaymentTarget {
    Invoice(Uuid),
    PaymentLink(String),
    Subscription(Uuid),
}

impl std::fmt::Display for PaymentTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentTarget::Invoice(id) => write!(f, "invoice/{}", id),
            PaymentTarget::PaymentLink(slug) => write!(f, "link/{}", slug),
            PaymentTarget::Subscription(id) => write!(f, "subscription/{}", id),
        }
    }
}

/// Attempt state. IDLE is the absence of an attempt; everything except
/// `Pending` is terminal and written exactly once (first write wins).
///
/// The two timeout values are deliberately distinct: a deadline expiry is
/// surfaced as an outright failure on some pages and as "still pending,
/// check back later" on others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Pending,
    Succeeded,
    Failed,
    TimedOutFailed,
    TimedOutUnknown,
}

impl AttemptStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AttemptStatus::Pending)
    }
}

/// An in-flight or recently finished payment attempt. Ephemeral and
/// client-side only: held in memory, never persisted, discarded after a
/// retention window once terminal.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentAttempt {
    pub id: Uuid,
    pub target: PaymentTarget,
    /// Correlation reference (checkout request id) returned by the
    /// charge-initiation call.
    pub reference: String,
    pub status: AttemptStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mpesa_receipt_number: Option<String>,
    /// Status of the paid-for record re-read after a successful payment,
    /// so the UI can pick up the server-side flip without a second call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_status: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl PaymentAttempt {
    pub fn new(target: PaymentTarget, reference: String) -> Self {
        PaymentAttempt {
            id: Uuid::new_v4(),
            target,
            reference,
            status: AttemptStatus::Pending,
            message: "Awaiting payment confirmation. Check your phone and enter your PIN.".to_string(),
            mpesa_receipt_number: None,
            target_status: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }
}
