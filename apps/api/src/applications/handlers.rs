//! Axum route handlers for the Application API.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::applications::lifecycle::{
    apply_with_cv, transition_status, withdraw_application, ApplyResponse, CvUpload,
};
use crate::applications::status::ApplicationStatus;
use crate::errors::AppError;
use crate::models::application::{ApplicationSummary, Candidate};
use crate::state::AppState;
use crate::uploads::content_type_for;

const CV_FIELD: &str = "cv";

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UserIdQuery {
    pub user_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct ApplicationListQuery {
    pub user_id: i64,
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub success: bool,
    pub result: Vec<T>,
}

#[derive(Debug, Serialize)]
pub struct TransitionResponse {
    pub success: bool,
    pub status: ApplicationStatus,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/application/apply/:job_id?user_id=
///
/// Multipart body with a file field named `cv`.
pub async fn handle_apply(
    State(state): State<AppState>,
    Path(job_id): Path<i64>,
    Query(params): Query<UserIdQuery>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ApplyResponse>), AppError> {
    let upload = read_cv_field(multipart).await?;
    debug!(
        "Received CV upload for job {job_id}: {} bytes, type {}",
        upload.bytes.len(),
        upload.content_type
    );

    let response = apply_with_cv(
        state.applications.as_ref(),
        &state.cv_storage,
        job_id,
        params.user_id,
        upload,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/application/candidate_list/:job_id
pub async fn handle_candidate_list(
    State(state): State<AppState>,
    Path(job_id): Path<i64>,
) -> Result<Json<ListResponse<Candidate>>, AppError> {
    let result = state.applications.list_candidates(job_id).await?;
    Ok(Json(ListResponse {
        success: true,
        result,
    }))
}

/// GET /api/application/application_list?user_id=[&status=]
pub async fn handle_application_list(
    State(state): State<AppState>,
    Query(params): Query<ApplicationListQuery>,
) -> Result<Json<ListResponse<ApplicationSummary>>, AppError> {
    let status = params
        .status
        .as_deref()
        .map(str::parse::<ApplicationStatus>)
        .transpose()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let result = state
        .applications
        .list_applications_for_user(params.user_id, status)
        .await?;
    Ok(Json(ListResponse {
        success: true,
        result,
    }))
}

/// POST /api/application/:id/:action
pub async fn handle_transition(
    State(state): State<AppState>,
    Path((application_id, action)): Path<(i64, String)>,
) -> Result<Json<TransitionResponse>, AppError> {
    let status = transition_status(state.applications.as_ref(), application_id, &action).await?;
    Ok(Json(TransitionResponse {
        success: true,
        status,
    }))
}

/// DELETE /api/application/:id
pub async fn handle_withdraw(
    State(state): State<AppState>,
    Path(application_id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    withdraw_application(
        state.applications.as_ref(),
        &state.cv_storage,
        application_id,
    )
    .await?;
    Ok(Json(SuccessResponse { success: true }))
}

/// GET /api/application/cv/:filename
pub async fn handle_get_cv(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let bytes = state.cv_storage.retrieve_cv(&filename).await?;
    Ok(([(header::CONTENT_TYPE, content_type_for(&filename))], bytes))
}

/// Pulls the `cv` file field out of the multipart body; other fields are ignored.
async fn read_cv_field(mut multipart: Multipart) -> Result<CvUpload, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.body_text()))?
    {
        if field.name() != Some(CV_FIELD) {
            continue;
        }

        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let file_name = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;

        return Ok(CvUpload {
            bytes,
            content_type,
            file_name,
        });
    }

    Err(AppError::Validation(format!(
        "Missing file field '{CV_FIELD}'"
    )))
}
