//! HTTP handlers for individual submissions

use super::model::{SUBMISSION_UPDATABLE_FIELDS, Submission};
use crate::core::access::{find_or_fail, update_fields};
use crate::core::auth::{AuthContext, AuthPolicy};
use crate::core::error::{ApiError, ApiResult, StorageError};
use crate::core::extractors::JsonBody;
use crate::server::AppState;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, patch};
use serde_json::Value;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/submissions/{id}", patch(update_submission))
        .route("/submissions/{id}/file", get(download_file))
}

/// PATCH /submissions/{id}
///
/// Only `grade` can change, and only the enrolled student who made the
/// submission may change it.
pub async fn update_submission(
    State(state): State<AppState>,
    caller: AuthContext,
    Path(id): Path<String>,
    body: Result<JsonBody<Value>, ApiError>,
) -> ApiResult<StatusCode> {
    let submission: Submission = find_or_fail(state.submissions.as_ref(), &id).await?;
    let policy = AuthPolicy::And(vec![
        AuthPolicy::StudentOf(submission.course_id),
        AuthPolicy::SelfOf(submission.student_id),
    ]);
    state.authorize(&policy, &caller).await?;
    let JsonBody(payload) = body?;

    let updated: Submission = update_fields(
        state.submissions.as_ref(),
        submission.id,
        SUBMISSION_UPDATABLE_FIELDS,
        &payload,
    )
    .await?;
    tracing::info!(submission_id = %updated.id, grade = ?updated.grade, "submission graded");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /submissions/{id}/file
///
/// Admins, the course instructor and the submitting student may download.
pub async fn download_file(
    State(state): State<AppState>,
    caller: AuthContext,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let submission: Submission = find_or_fail(state.submissions.as_ref(), &id).await?;
    let policy = AuthPolicy::Or(vec![
        AuthPolicy::AdminOnly,
        AuthPolicy::InstructorOf(submission.course_id),
        AuthPolicy::SelfOf(submission.student_id),
    ]);
    state.authorize(&policy, &caller).await?;

    let blob = state
        .blobs
        .get(&submission.file)
        .await
        .map_err(|e| {
            ApiError::Storage(StorageError::Blob {
                message: format!("{:#}", e),
            })
        })?
        .ok_or_else(|| ApiError::not_found("file", &submission.file))?;

    Ok(([(header::CONTENT_TYPE, blob.content_type)], blob.data))
}
