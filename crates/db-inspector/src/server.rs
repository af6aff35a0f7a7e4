//! HTTP server
//!
//! Builds the shared state from the configuration and serves the inspector
//! API. Every handler reaches the database session through `AppState`.

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

use crate::api;
use crate::config::Config;
use crate::shared_state::AppState;

/// Headroom above the upload ceiling for multipart framing, so the
/// validator reports oversize uploads before the body limit cuts them off.
const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1024;

/// Run the inspector until the listener fails.
pub async fn run_server(cfg: Config) -> anyhow::Result<()> {
    crate::telemetry::init_tracing();
    crate::metrics::init_metrics();
    cfg.print_config();

    let addr = cfg.api_addr()?;
    let state = AppState::new(cfg)?;
    let app = build_router(state);

    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
        ])
        .allow_headers(Any);

    let upload_limit = usize::try_from(
        state
            .config
            .max_upload_bytes
            .saturating_add(MULTIPART_OVERHEAD_BYTES),
    )
    .unwrap_or(usize::MAX);
    let timeout = Duration::from_secs(state.config.request_timeout_seconds);

    Router::new()
        // Stored databases and the session
        .route("/", get(api::list_databases))
        .route("/databases", get(api::list_databases))
        .route(
            "/databases/upload",
            post(api::upload_database).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/databases/select", post(api::select_database))
        .route("/databases/:name", put(api::rename_database))
        .route("/databases/:name", delete(api::delete_database))
        // Browsing the active database
        .route("/projects", get(api::browse))
        .route("/project_states/:state_id/:category", get(api::get_detail))
        .route("/llm_requests/:state_id", get(api::get_llm_requests))
        // Operations
        .route("/status", get(api::status))
        .route("/healthz", get(api::health))
        .route("/metrics", get(crate::metrics::get_metrics))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(timeout))
        .with_state(state)
}
