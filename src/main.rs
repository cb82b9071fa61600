use axum::{http::Method, response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod state;
mod validation;

use services::gateway::DarajaGateway;
use services::store::RestStore;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = config::AppConfig::from_env();
    let app_state = initialize_app_state(config).await;

    let sweeper = app_state.attempts.clone();
    let retention = Duration::from_secs(app_state.config.attempt_retention_secs);
    tokio::spawn(sweeper.run_sweeper(retention));

    let app = build_router(app_state.clone());
    start_server(app, &app_state.config).await
}

async fn initialize_app_state(config: config::AppConfig) -> AppState {
    let store = Arc::new(RestStore::new(
        config.store_base_url.clone(),
        config.store_api_key.clone(),
    ));

    let gateway = Arc::new(DarajaGateway::new(config.clone()));

    tracing::info!("Gateway environment: {}", config.mpesa_environment);

    // Verify gateway credentials up front; a failure here is logged but
    // not fatal, the first charge will retry the token request.
    match gateway.get_access_token().await {
        Ok(_) => tracing::info!("Gateway access token obtained"),
        Err(e) => tracing::warn!("Could not verify gateway credentials at startup: {}", e),
    }

    AppState::new(config, store, gateway)
}

fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .allow_credentials(false);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .nest("/api/payments", routes::payments::payment_routes())
        .nest("/api/billing", routes::billing::billing_routes())
        .layer(cors)
        .with_state(app_state)
}

async fn start_server(app: Router, config: &config::AppConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("Server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn root_handler() -> &'static str {
    "lipalink payments API"
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
