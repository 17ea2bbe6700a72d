//! HTTP API and browser UI for the boardroom team.
//!
//! # Endpoints
//!
//! - `GET /` - Single-page UI
//! - `GET /api/v1/health` - Health check
//! - `POST /api/v1/agent-response` - Ask the whole team
//! - `POST /api/v1/{slug}` - Ask one member, e.g. `/api/v1/finance-agent`
//!
//! Every `POST` takes `{"query": "..."}` and answers with
//! `{"response", "agent_name", "status", "error"}`.

pub mod routes;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use routes::{AgentResponse, QueryRequest, ResponseStatus};
pub use state::AppState;

/// Create the API router with all routes configured.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.server.cors_origins);
    let body_limit = state.server.max_body_bytes;

    Router::new()
        .route("/", get(routes::index))
        .route("/api/v1/health", get(routes::health))
        .route("/api/v1/agent-response", post(routes::team_response))
        .route("/api/v1/{slug}", post(routes::agent_response))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// `*` (or nothing) allows any origin; otherwise only the listed ones.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(allowed)
}

/// Start the API server on the given address.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> anyhow::Result<()> {
    let router = create_router(state);

    info!(%addr, "Starting boardroom API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
