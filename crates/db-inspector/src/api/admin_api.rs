//! Administrative endpoints
//!
//! Liveness and a small status document describing the current session.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::shared_state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    #[serde(rename = "activeDatabase")]
    pub active_database: Option<String>,
    #[serde(rename = "maxUploadBytes")]
    pub max_upload_bytes: u64,
    #[serde(rename = "dataDir")]
    pub data_dir: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        active_database: state.inspector.session().get_active().map(|a| a.name),
        max_upload_bytes: state.inspector.max_upload_bytes(),
        data_dir: state.config.data_dir.display().to_string(),
    })
}
