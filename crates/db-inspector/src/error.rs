//! Error taxonomy for the inspector
//!
//! Every request either yields a complete payload or exactly one of these.
//! `IntoResponse` turns them into the JSON error body used across the API.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

/// Why an upload was turned away.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadRejection {
    #[error("unsupported file extension '{0}' (expected .db, .sqlite, .sqlite3 or none)")]
    UnsupportedExtension(String),
    #[error("upload exceeds the {limit} byte limit")]
    TooLarge { limit: u64 },
    #[error("uploaded file is empty")]
    EmptyUpload,
    #[error("not a valid SQLite database: {0}")]
    InvalidDatabaseFormat(String),
}

#[derive(Debug, thiserror::Error)]
pub enum InspectorError {
    #[error("no active database, select or upload one first")]
    NoActiveDatabase,

    #[error("no file provided")]
    NoFileProvided,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("upload rejected: {0}")]
    UploadRejected(#[from] UploadRejection),

    #[error("database not found: {0}")]
    DatabaseNotFound(String),

    #[error("invalid file name: {0}")]
    InvalidFileName(String),

    #[error("a database named '{0}' already exists")]
    AlreadyExists(String),

    #[error("{op} failed: {cause}")]
    Io {
        op: &'static str,
        #[source]
        cause: std::io::Error,
    },

    #[error("failed to fetch data: {0:#}")]
    DataFetch(#[source] anyhow::Error),

    #[error("unsupported detail category: {0}")]
    UnsupportedDetailCategory(String),

    #[error("cannot delete the active database '{0}'")]
    ActiveDatabaseDeletionForbidden(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type InspectorResult<T> = Result<T, InspectorError>;

impl InspectorError {
    pub fn io(op: &'static str, cause: std::io::Error) -> Self {
        Self::Io { op, cause }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::NoActiveDatabase => StatusCode::CONFLICT,
            Self::NoFileProvided
            | Self::InvalidRequest(_)
            | Self::UploadRejected(_)
            | Self::InvalidFileName(_)
            | Self::UnsupportedDetailCategory(_) => StatusCode::BAD_REQUEST,
            Self::DatabaseNotFound(_) => StatusCode::NOT_FOUND,
            Self::AlreadyExists(_) => StatusCode::CONFLICT,
            Self::ActiveDatabaseDeletionForbidden(_) => StatusCode::FORBIDDEN,
            Self::Io { .. } | Self::DataFetch(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<tokio::task::JoinError> for InspectorError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Internal(format!("blocking task failed: {}", e))
    }
}

impl IntoResponse for InspectorError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        if status.is_server_error() {
            error!("{}", message);
        } else {
            warn!("{}", message);
        }
        (
            status,
            Json(json!({
                "error": message,
                "code": status.as_u16(),
            })),
        )
            .into_response()
    }
}
