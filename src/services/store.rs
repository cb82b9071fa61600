// services/store.rs
use async_trait::async_trait;
use reqwest::{header, Client};
use std::time::Duration;
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::models::billing::{Invoice, PaymentLink, Subscription};
use crate::models::transaction::TransactionRecord;

/// Read-only handle to the backend data store. Every page goes through
/// this instead of a module-level client singleton so call sites can be
/// exercised against a fake without a live backend.
///
/// This layer never writes transaction status; the gateway callback on
/// the backend owns it.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Single-record lookup by correlation reference. A row that has not
    /// been written yet is `Ok(None)`, not an error.
    async fn find_transaction(&self, reference: &str) -> Result<Option<TransactionRecord>>;

    async fn get_invoice(&self, id: Uuid) -> Result<Option<Invoice>>;

    async fn get_payment_link(&self, slug: &str) -> Result<Option<PaymentLink>>;

    async fn get_subscription(&self, id: Uuid) -> Result<Option<Subscription>>;
}

/// PostgREST-style store client: filtered single-row reads over HTTP
/// with an API key header.
#[derive(Debug, Clone)]
pub struct RestStore {
    base_url: String,
    api_key: String,
    client: Client,
}

impl RestStore {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        RestStore {
            base_url: base_url.into(),
            api_key: api_key.into(),
            client,
        }
    }

    async fn fetch_one<T: serde::de::DeserializeOwned>(
        &self,
        table: &str,
        filter: &str,
    ) -> Result<Option<T>> {
        let url = format!(
            "{}/rest/v1/{}?select=*&{}&limit=1",
            self.base_url, table, filter
        );

        let response = self
            .client
            .get(&url)
            .header("apikey", &self.api_key)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::store(format!(
                "read from {} failed: {} - {}",
                table, status, body
            )));
        }

        let mut rows: Vec<T> = response.json().await?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.swap_remove(0))
        })
    }
}

#[async_trait]
impl TransactionStore for RestStore {
    async fn find_transaction(&self, reference: &str) -> Result<Option<TransactionRecord>> {
        let filter = format!("transaction_ref=eq.{}", reference);
        self.fetch_one("transactions", &filter).await
    }

    async fn get_invoice(&self, id: Uuid) -> Result<Option<Invoice>> {
        let filter = format!("id=eq.{}", id);
        self.fetch_one("invoices", &filter).await
    }

    async fn get_payment_link(&self, slug: &str) -> Result<Option<PaymentLink>> {
        let filter = format!("slug=eq.{}", slug);
        self.fetch_one("payment_links", &filter).await
    }

    async fn get_subscription(&self, id: Uuid) -> Result<Option<Subscription>> {
        let filter = format!("id=eq.{}", id);
        self.fetch_one("subscriptions", &filter).await
    }
}
