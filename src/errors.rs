// src/errors.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invoice not found")]
    InvoiceNotFound,

    #[error("Payment link not found")]
    PaymentLinkNotFound,

    #[error("Subscription not found")]
    SubscriptionNotFound,

    #[error("Payment attempt not found")]
    AttemptNotFound,

    #[error("A payment attempt is already in progress for this target")]
    AttemptInProgress,

    #[error("Charge initiation failed: {0}")]
    GatewayError(String),

    #[error("Transaction store error: {0}")]
    StoreError(String),

    #[error("External API error: {0}")]
    ExternalApi(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::ValidationError(_) => (StatusCode::BAD_REQUEST, "Validation failed".to_string()),
            AppError::InvoiceNotFound => (StatusCode::NOT_FOUND, "Invoice not found".to_string()),
            AppError::PaymentLinkNotFound => (StatusCode::NOT_FOUND, "Payment link not found".to_string()),
            AppError::SubscriptionNotFound => (StatusCode::NOT_FOUND, "Subscription not found".to_string()),
            AppError::AttemptNotFound => (StatusCode::NOT_FOUND, "Payment attempt not found".to_string()),
            AppError::AttemptInProgress => (StatusCode::CONFLICT, "Payment attempt already in progress".to_string()),
            AppError::GatewayError(_) => (StatusCode::BAD_GATEWAY, "Charge initiation failed".to_string()),
            AppError::StoreError(_) => (StatusCode::BAD_GATEWAY, "Transaction store error".to_string()),
            AppError::ExternalApi(_) => (StatusCode::BAD_GATEWAY, "External API error".to_string()),
        };

        let body = Json(json!({
            "error": error_message,
            "message": self.to_string(),
            "success": false,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));

        (status, body).into_response()
    }
}

// Manual From implementations
impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::ExternalApi(format!("HTTP request failed: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::StoreError(format!("JSON parsing error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

// Helper conversion functions
impl AppError {
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        AppError::ValidationError(msg.into())
    }

    pub fn gateway(msg: impl Into<String>) -> Self {
        AppError::GatewayError(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        AppError::StoreError(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
