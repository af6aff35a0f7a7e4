//! Per-state detail endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use tracing::debug;

use crate::detail::{DetailCategory, DetailView};
use crate::error::InspectorResult;
use crate::metrics;
use crate::shared_state::AppState;

async fn fetch_detail(state: &AppState, category: &str, state_id: &str) -> InspectorResult<DetailView> {
    let category: DetailCategory = category.parse()?;
    debug!("Fetching {} for state {}", category, state_id);
    state.inspector.detail(category, state_id).await
}

/// `GET /project_states/:state_id/:category`
pub async fn get_detail(
    State(state): State<AppState>,
    Path((state_id, category)): Path<(String, String)>,
) -> InspectorResult<Json<DetailView>> {
    let result = fetch_detail(&state, &category, &state_id).await;
    match &result {
        Ok(_) => metrics::inc_request("detail", "ok"),
        Err(e) => metrics::inc_request("detail", e.status().as_str()),
    }
    Ok(Json(result?))
}

/// `GET /llm_requests/:state_id`
pub async fn get_llm_requests(
    State(state): State<AppState>,
    Path(state_id): Path<String>,
) -> InspectorResult<Json<DetailView>> {
    let result = state.inspector.detail(DetailCategory::LlmRequests, &state_id).await;
    match &result {
        Ok(_) => metrics::inc_request("llm_requests", "ok"),
        Err(e) => metrics::inc_request("llm_requests", e.status().as_str()),
    }
    Ok(Json(result?))
}
