//! HTTP API gateway for Pennywise.
//!
//! Exposes the agent over `POST /chat`, direct ledger access under
//! `/expenses`, and a database-backed `/health` probe.
//!
//! Built on Axum for high performance async HTTP.

pub mod api;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

use pennywise_agent::AgentLoop;
use pennywise_config::AppConfig;
use pennywise_core::event::EventBus;
use pennywise_core::ledger::Ledger;

/// Request bodies above this are rejected before deserialization.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub agent: Arc<AgentLoop>,
    pub ledger: Arc<dyn Ledger>,
    /// Identity used when a request does not name a user
    pub default_user: String,
    pub allowed_origins: Vec<String>,
}

impl GatewayState {
    pub fn new(agent: Arc<AgentLoop>, ledger: Arc<dyn Ledger>, config: &AppConfig) -> Self {
        Self {
            agent,
            ledger,
            default_user: config.agent.default_user.clone(),
            allowed_origins: config.gateway.allowed_origins.clone(),
        }
    }
}

pub type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
///
/// Layers applied:
/// - CORS from the configured origin allowlist
/// - Request body size limit (1 MB)
/// - HTTP trace logging
pub fn build_router(state: SharedState) -> Router {
    let cors = cors_layer(&state.allowed_origins);

    Router::new()
        .route("/chat", post(api::chat))
        .route("/expenses", post(api::create_expense).get(api::list_expenses))
        .route("/expenses/summary", get(api::expense_summary))
        .route("/health", get(api::health))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|o| o == "*") {
        return cors.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring unparseable CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(parsed))
}

/// Start the gateway HTTP server.
///
/// Builds the provider, ledger, tools and agent once and shares them across
/// all requests.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let provider = pennywise_providers::build_from_config(&config)
        .default()
        .ok_or("no default provider configured")?;
    let ledger = pennywise_ledger::open(&config.ledger).await?;
    let tools = Arc::new(pennywise_tools::default_registry(ledger.clone()));
    let event_bus = Arc::new(EventBus::default());
    let agent = Arc::new(AgentLoop::from_config(&config, provider, tools, event_bus));

    let state = Arc::new(GatewayState::new(agent, ledger.clone(), &config));
    let app = build_router(state);

    info!(
        addr = %addr,
        ledger = ledger.name(),
        model = %config.default_model,
        "Gateway starting"
    );
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
