//! API endpoints for managing stored databases

use axum::{
    extract::{Multipart, Path, State},
    response::Redirect,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};
use validator::Validate;

use crate::error::{InspectorError, InspectorResult};
use crate::lifecycle::DatabaseListing;
use crate::metrics;
use crate::shared_state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct SelectRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RenameRequest {
    #[serde(rename = "newName")]
    #[validate(length(min = 1, max = 255))]
    pub new_name: String,
}

fn check<T: Validate>(body: &T) -> InspectorResult<()> {
    body.validate()
        .map_err(|e| InspectorError::InvalidRequest(e.to_string()))
}

fn record<T>(route: &str, result: &InspectorResult<T>) {
    match result {
        Ok(_) => metrics::inc_request(route, "ok"),
        Err(e) => metrics::inc_request(route, e.status().as_str()),
    }
}

/// Stored databases plus the active one.
pub async fn list_databases(State(state): State<AppState>) -> InspectorResult<Json<DatabaseListing>> {
    let result = state.inspector.list().await;
    record("list_databases", &result);
    let listing = result?;
    debug!("Listing {} stored databases", listing.databases.len());
    Ok(Json(listing))
}

/// Receive a database through the configured multipart field, then redirect to the browser view.
pub async fn upload_database(
    State(state): State<AppState>,
    multipart: Multipart,
) -> InspectorResult<Redirect> {
    let result = receive_upload(&state, multipart).await;
    record("upload_database", &result);
    let name = result?;
    info!("Upload stored and selected as {}", name);
    Ok(Redirect::to("/projects"))
}

async fn receive_upload(state: &AppState, mut multipart: Multipart) -> InspectorResult<String> {
    let wanted = state.config.upload_field.as_str();
    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| InspectorError::InvalidRequest(e.to_string()))?;
        let Some(field) = field else {
            return Err(InspectorError::NoFileProvided);
        };
        if field.name() != Some(wanted) {
            debug!("Skipping multipart field {:?}", field.name());
            continue;
        }

        let original_name = match field.file_name() {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => return Err(InspectorError::NoFileProvided),
        };
        let stored = state
            .inspector
            .upload(wanted, &original_name, Box::pin(field))
            .await?;
        return Ok(stored.name);
    }
}

pub async fn select_database(
    State(state): State<AppState>,
    Json(req): Json<SelectRequest>,
) -> InspectorResult<Json<Value>> {
    let result = match check(&req) {
        Ok(()) => state.inspector.select(&req.name).await,
        Err(e) => Err(e),
    };
    record("select_database", &result);
    let selected = result?;
    Ok(Json(json!({
        "success": true,
        "active": selected.name,
    })))
}

pub async fn rename_database(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<RenameRequest>,
) -> InspectorResult<Json<Value>> {
    info!("Renaming database {} to {}", name, req.new_name);
    let result = match check(&req) {
        Ok(()) => state.inspector.rename(&name, &req.new_name).await,
        Err(e) => Err(e),
    };
    record("rename_database", &result);
    let renamed = result?;
    Ok(Json(json!({
        "success": true,
        "name": renamed.name,
    })))
}

/// Refused with 403 while `name` is the active database.
pub async fn delete_database(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> InspectorResult<Json<Value>> {
    let result = state.inspector.delete(&name).await;
    record("delete_database", &result);
    result?;
    Ok(Json(json!({
        "success": true,
        "name": name,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rename_request_uses_camel_case_field() {
        let req: RenameRequest = serde_json::from_str(r#"{"newName":"b.db"}"#).unwrap();
        assert_eq!(req.new_name, "b.db");
        assert!(check(&req).is_ok());
    }

    #[test]
    fn test_blank_names_fail_validation() {
        let req = SelectRequest { name: String::new() };
        assert!(matches!(check(&req), Err(InspectorError::InvalidRequest(_))));
        let req = RenameRequest { new_name: "x".repeat(300) };
        assert!(matches!(check(&req), Err(InspectorError::InvalidRequest(_))));
    }
}
