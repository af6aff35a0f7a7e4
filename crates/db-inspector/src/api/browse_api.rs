//! Project / branch / state browsing

use axum::{
    extract::{Query, State},
    Json,
};
use tracing::debug;

use crate::error::InspectorResult;
use crate::metrics;
use crate::navigation::{NavigationQuery, ResolvedView};
use crate::shared_state::AppState;

/// Resolve the selected project and branch of the active database and list its states.
pub async fn browse(
    State(state): State<AppState>,
    Query(query): Query<NavigationQuery>,
) -> InspectorResult<Json<ResolvedView>> {
    debug!("Browsing with {:?}", query);
    let result = state.inspector.browse(query).await;
    match &result {
        Ok(_) => metrics::inc_request("browse", "ok"),
        Err(e) => metrics::inc_request("browse", e.status().as_str()),
    }
    Ok(Json(result?))
}
