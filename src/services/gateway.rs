// services/gateway.rs
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as base64, Engine as _};
use chrono::Utc;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{error, info};

use crate::config::AppConfig;
use crate::errors::{AppError, Result};

/// Inputs to a charge initiation. The phone number is already validated
/// at the request boundary.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub phone_number: String,
    pub amount: f64,
    pub account_reference: String,
    pub description: String,
}

/// Outcome of a successful charge initiation. The checkout request id is
/// the correlation reference the confirmation watcher polls on.
#[derive(Debug, Clone)]
pub struct ChargeReceipt {
    pub checkout_request_id: String,
    pub merchant_request_id: String,
    pub customer_message: String,
}

/// Handle to the payment gateway. Injected so pages can be tested
/// without invoking a real gateway.
#[async_trait]
pub trait ChargeGateway: Send + Sync {
    async fn initiate_charge(&self, request: ChargeRequest) -> Result<ChargeReceipt>;
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    access_token: String,
}

#[derive(Debug, Serialize)]
struct StkPushRequest {
    #[serde(rename = "BusinessShortCode")]
    business_short_code: String,
    #[serde(rename = "Password")]
    password: String,
    #[serde(rename = "Timestamp")]
    timestamp: String,
    #[serde(rename = "TransactionType")]
    transaction_type: String,
    #[serde(rename = "Amount")]
    amount: String,
    #[serde(rename = "PartyA")]
    party_a: String,
    #[serde(rename = "PartyB")]
    party_b: String,
    #[serde(rename = "PhoneNumber")]
    phone_number: String,
    #[serde(rename = "CallBackURL")]
    callback_url: String,
    #[serde(rename = "AccountReference")]
    account_reference: String,
    #[serde(rename = "TransactionDesc")]
    transaction_desc: String,
}

#[derive(Debug, Deserialize)]
struct StkPushResponse {
    #[serde(rename = "MerchantRequestID")]
    merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    checkout_request_id: String,
    #[serde(rename = "ResponseCode")]
    response_code: String,
    #[serde(rename = "ResponseDescription")]
    response_description: String,
    #[serde(rename = "CustomerMessage")]
    customer_message: String,
}

/// M-Pesa Daraja STK push client with a cached OAuth token.
#[derive(Debug, Clone)]
pub struct DarajaGateway {
    config: AppConfig,
    client: Client,
    cached_token: Arc<RwLock<Option<(String, chrono::DateTime<Utc>)>>>,
}

impl DarajaGateway {
    pub fn new(config: AppConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        DarajaGateway {
            config,
            client,
            cached_token: Arc::new(RwLock::new(None)),
        }
    }

    fn generate_password(&self, timestamp: &str) -> String {
        let password_string = format!(
            "{}{}{}",
            self.config.mpesa_short_code, self.config.mpesa_passkey, timestamp
        );
        base64.encode(password_string)
    }

    pub async fn get_access_token(&self) -> Result<String> {
        {
            let cached = self.cached_token.read().unwrap();
            if let Some((token, expiry)) = cached.as_ref() {
                if *expiry > Utc::now() + chrono::Duration::minutes(5) {
                    return Ok(token.clone());
                }
            }
        }

        info!("Requesting new gateway access token");
        let auth_string = format!(
            "{}:{}",
            self.config.mpesa_consumer_key, self.config.mpesa_consumer_secret
        );
        let encoded_auth = base64.encode(auth_string);

        let (auth_url, _) = self.config.get_mpesa_urls();

        let response = self
            .client
            .get(&auth_url)
            .header(header::AUTHORIZATION, format!("Basic {}", encoded_auth))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Failed to get access token: {} - {}", status, body);
            return Err(AppError::gateway(format!("gateway auth failed: {}", status)));
        }

        let auth_response: AuthResponse = response.json().await?;

        {
            let expiry_time = Utc::now() + chrono::Duration::hours(1);
            let mut cached = self.cached_token.write().unwrap();
            *cached = Some((auth_response.access_token.clone(), expiry_time));
        }

        Ok(auth_response.access_token)
    }
}

#[async_trait]
impl ChargeGateway for DarajaGateway {
    async fn initiate_charge(&self, request: ChargeRequest) -> Result<ChargeReceipt> {
        info!(
            "STK push for {} - KSh {}",
            request.phone_number, request.amount
        );

        let access_token = self.get_access_token().await?;
        let timestamp = Utc::now().format("%Y%m%d%H%M%S").to_string();
        let password = self.generate_password(&timestamp);

        let (_, stk_url) = self.config.get_mpesa_urls();

        // Daraja wants whole-unit amounts as strings.
        let stk_request = StkPushRequest {
            business_short_code: self.config.mpesa_short_code.clone(),
            password,
            timestamp,
            transaction_type: "CustomerPayBillOnline".to_string(),
            amount: format!("{}", request.amount.round() as u64),
            party_a: request.phone_number.clone(),
            party_b: self.config.mpesa_short_code.clone(),
            phone_number: request.phone_number.clone(),
            callback_url: self.config.mpesa_callback_url.clone(),
            account_reference: request.account_reference,
            transaction_desc: request.description,
        };

        let response = self
            .client
            .post(&stk_url)
            .header(header::AUTHORIZATION, format!("Bearer {}", access_token))
            .header(header::CONTENT_TYPE, "application/json")
            .json(&stk_request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("STK push failed: {} - {}", status, body);
            return Err(AppError::gateway(format!("STK push failed: {}", status)));
        }

        let stk_response: StkPushResponse = response.json().await?;

        if stk_response.response_code != "0" {
            return Err(AppError::gateway(stk_response.response_description));
        }

        info!("STK push initiated: {}", stk_response.merchant_request_id);
        Ok(ChargeReceipt {
            checkout_request_id: stk_response.checkout_request_id,
            merchant_request_id: stk_response.merchant_request_id,
            customer_message: stk_response.customer_message,
        })
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Gateway fake that hands out sequential references, or fails every
    /// call with the given message. An optional delay holds each call in
    /// flight, for tests that overlap submissions.
    pub struct ScriptedGateway {
        pub calls: AtomicUsize,
        failure: Option<String>,
        delay: Option<std::time::Duration>,
    }

    impl ScriptedGateway {
        pub fn succeeding() -> Self {
            ScriptedGateway {
                calls: AtomicUsize::new(0),
                failure: None,
                delay: None,
            }
        }

        pub fn succeeding_slowly(delay: std::time::Duration) -> Self {
            ScriptedGateway {
                calls: AtomicUsize::new(0),
                failure: None,
                delay: Some(delay),
            }
        }

        pub fn failing(message: &str) -> Self {
            ScriptedGateway {
                calls: AtomicUsize::new(0),
                failure: Some(message.to_string()),
                delay: None,
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChargeGateway for ScriptedGateway {
        async fn initiate_charge(&self, _request: ChargeRequest) -> Result<ChargeReceipt> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            if let Some(message) = &self.failure {
                return Err(AppError::gateway(message.clone()));
            }

            Ok(ChargeReceipt {
                checkout_request_id: format!("ws_CO_TEST_{:04}", n),
                merchant_request_id: format!("mr_TEST_{:04}", n),
                customer_message: "Success. Request accepted for processing".to_string(),
            })
        }
    }
}
