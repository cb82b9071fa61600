use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::attempts::AttemptTracker;
use crate::services::gateway::ChargeGateway;
use crate::services::store::TransactionStore;

/// Shared handles for every page. The store and gateway are injected as
/// trait objects so handlers can be exercised against fakes.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn TransactionStore>,
    pub gateway: Arc<dyn ChargeGateway>,
    pub attempts: AttemptTracker,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn TransactionStore>,
        gateway: Arc<dyn ChargeGateway>,
    ) -> Self {
        let attempts = AttemptTracker::new(store.clone());
        AppState {
            config,
            store,
            gateway,
            attempts,
        }
    }
}
