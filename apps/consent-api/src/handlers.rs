//! HTTP handlers for the consent API

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Local;
use uuid::Uuid;

use consent_core::validation::STATES;
use consent_core::{ArtifactStore, DuplicateSet, IntakeForm, Outcome, SessionSnapshot};

use crate::error::ApiError;
use crate::models::*;
use crate::state::{AppState, SharedSession};

type Shared = State<Arc<AppState>>;

/// Health check endpoint
pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "consent-api",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// US states offered by the form
pub async fn handle_list_states() -> Json<Vec<StateOption>> {
    Json(
        STATES
            .iter()
            .map(|&(code, name)| StateOption { code, name })
            .collect(),
    )
}

/// Start a new intake session
pub async fn handle_create_session(
    State(state): Shared,
) -> (StatusCode, Json<SessionSnapshot>) {
    let session = state.open_session().await;
    let snapshot = session.lock().await.snapshot();
    (StatusCode::CREATED, Json(snapshot))
}

pub async fn handle_get_session(
    State(state): Shared,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let session = find_session(&state, id).await?;
    let snapshot = session.lock().await.snapshot();
    Ok(Json(snapshot))
}

/// Validate a form, build the record and run it through the pipeline
pub async fn handle_submit(
    State(state): Shared,
    Path(id): Path<Uuid>,
    Json(form): Json<IntakeForm>,
) -> Result<Response, ApiError> {
    let session = find_session(&state, id).await?;
    let mut session = session.lock().await;

    let record = state.builder.build(&form, Local::now().date_naive())?;
    let outcome = session.submit(&state.pipeline, record).await?;

    Ok(outcome_response(outcome, session.snapshot()))
}

/// Commit the pending record over its duplicates
pub async fn handle_confirm(
    State(state): Shared,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let session = find_session(&state, id).await?;
    let mut session = session.lock().await;

    let outcome = session.confirm(&state.pipeline).await?;
    Ok(outcome_response(outcome, session.snapshot()))
}

/// Discard the pending record
pub async fn handle_abandon(
    State(state): Shared,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let session = find_session(&state, id).await?;
    let mut session = session.lock().await;
    session.abandon()?;
    tracing::info!(session = %id, "Pending submission abandoned");
    Ok(Json(session.snapshot()))
}

pub async fn handle_reset(
    State(state): Shared,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let session = find_session(&state, id).await?;
    let mut session = session.lock().await;
    session.reset();
    Ok(Json(session.snapshot()))
}

/// Prior submissions for an MRN, most recent first
pub async fn handle_list_submissions(
    State(state): Shared,
    Query(query): Query<SubmissionQuery>,
) -> Result<Json<DuplicateSet>, ApiError> {
    let mrn = query.mrn.trim();
    if mrn.is_empty() {
        return Err(ApiError::InvalidRequest("mrn is required".to_string()));
    }
    let duplicates = state.pipeline.duplicates(mrn).await?;
    Ok(Json(duplicates))
}

/// Download a stored consent document
pub async fn handle_get_artifact(
    State(state): Shared,
    Path(path): Path<String>,
) -> Result<Response, ApiError> {
    let bytes = state.artifacts.get(&path).await?;
    Ok(([(header::CONTENT_TYPE, "application/pdf")], Body::from(bytes)).into_response())
}

async fn find_session(state: &AppState, id: Uuid) -> Result<SharedSession, ApiError> {
    state
        .session(id)
        .await
        .ok_or_else(|| ApiError::SessionNotFound(id.to_string()))
}

fn outcome_response(outcome: Outcome, session: SessionSnapshot) -> Response {
    let status = match &outcome {
        Outcome::Committed { .. } => StatusCode::CREATED,
        Outcome::Conflict { .. } => StatusCode::CONFLICT,
        Outcome::Failure { .. } => StatusCode::BAD_GATEWAY,
    };
    (status, Json(SubmissionResponse { outcome, session })).into_response()
}
