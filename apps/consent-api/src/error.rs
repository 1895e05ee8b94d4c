//! Error types for the consent API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use consent_core::{BuildError, FieldError, IndexError, SessionError, StorageError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Form validation failed")]
    Validation(Vec<FieldError>),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Transition(#[from] SessionError),

    #[error("Artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Storage error: {0}")]
    Storage(StorageError),
}

impl From<BuildError> for ApiError {
    fn from(e: BuildError) -> Self {
        match e {
            BuildError::Validation(v) => ApiError::Validation(v.errors),
            other => ApiError::Validation(vec![FieldError {
                field: "signature".to_string(),
                message: other.to_string(),
            }]),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(path) => ApiError::ArtifactNotFound(path),
            StorageError::InvalidPath(path) => {
                ApiError::InvalidRequest(format!("Invalid artifact path: {}", path))
            }
            other => ApiError::Storage(other),
        }
    }
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            ApiError::SessionNotFound(_) => "SESSION_NOT_FOUND",
            ApiError::Validation(_) => "VALIDATION_FAILED",
            ApiError::InvalidRequest(_) => "INVALID_REQUEST",
            ApiError::Transition(_) => "INVALID_TRANSITION",
            ApiError::ArtifactNotFound(_) => "ARTIFACT_NOT_FOUND",
            ApiError::Index(_) => "INDEX_UNAVAILABLE",
            ApiError::Storage(_) => "STORAGE_UNAVAILABLE",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::SessionNotFound(id) => {
                (StatusCode::NOT_FOUND, format!("Session not found: {}", id))
            }
            ApiError::Validation(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Form validation failed".to_string(),
            ),
            ApiError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Transition(e) => (StatusCode::CONFLICT, e.to_string()),
            ApiError::ArtifactNotFound(path) => {
                (StatusCode::NOT_FOUND, format!("Artifact not found: {}", path))
            }
            ApiError::Index(e) => {
                tracing::error!("Index error: {}", e);
                (StatusCode::BAD_GATEWAY, "Submission index unavailable".to_string())
            }
            ApiError::Storage(e) => {
                tracing::error!("Storage error: {}", e);
                (StatusCode::BAD_GATEWAY, "Artifact storage unavailable".to_string())
            }
        };

        let mut body = json!({
            "error": message,
            "code": self.code(),
        });
        if let ApiError::Validation(fields) = &self {
            body["fields"] = json!(fields);
        }

        (status, Json(body)).into_response()
    }
}
