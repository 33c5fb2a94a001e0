//! HTTP handlers for assignments and the submissions made against them

use super::model::{ASSIGNMENT_UPDATABLE_FIELDS, Assignment, NewAssignment};
use crate::core::access::{
    CascadeStep, cascade_delete, create_or_fail, find_by_id_or_fail, find_or_fail, parse_id, update_fields,
};
use crate::core::auth::{AuthContext, AuthPolicy};
use crate::core::error::{ApiError, ApiResult, FieldValidationError, ValidationError};
use crate::core::extractors::JsonBody;
use crate::core::field::Filter;
use crate::core::query::{Page, PageQuery, fetch_page};
use crate::core::service::Record;
use crate::core::upload::ReceivedUpload;
use crate::entities::{Course, Submission};
use crate::server::AppState;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/assignments", post(create_assignment))
        .route(
            "/assignments/{id}",
            get(get_assignment)
                .patch(update_assignment)
                .delete(delete_assignment),
        )
        .route(
            "/assignments/{id}/submissions",
            get(list_submissions).post(create_submission),
        )
}

/// POST /assignments
///
/// The course reference is checked first because authorization is anchored
/// on it: malformed is a 400, then admin-or-instructor is required, then the
/// course must exist.
pub async fn create_assignment(
    State(state): State<AppState>,
    caller: AuthContext,
    body: Result<JsonBody<Value>, ApiError>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let JsonBody(payload) = body?;
    let raw_course_id = payload
        .get("courseId")
        .and_then(Value::as_str)
        .ok_or_else(|| ValidationError::MissingField {
            field: "courseId".to_string(),
        })?;
    let course_id = parse_id::<Course>(raw_course_id)?;

    state
        .authorize(&AuthPolicy::admin_or(AuthPolicy::InstructorOf(course_id)), &caller)
        .await?;

    if state.courses.get(&course_id).await?.is_none() {
        return Err(ValidationError::FieldErrors(vec![FieldValidationError {
            field: "courseId".to_string(),
            message: "course does not exist".to_string(),
        }])
        .into());
    }

    let new_assignment: NewAssignment = serde_json::from_value(payload)?;
    let assignment = create_or_fail(state.assignments.as_ref(), new_assignment.into_assignment(course_id)).await?;

    Ok((StatusCode::CREATED, Json(json!({ "assignment": assignment.id }))))
}

/// GET /assignments/{id}
pub async fn get_assignment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let assignment: Assignment = find_or_fail(state.assignments.as_ref(), &id).await?;
    Ok(Json(json!({ "assignment": assignment })))
}

/// PATCH /assignments/{id}
pub async fn update_assignment(
    State(state): State<AppState>,
    caller: AuthContext,
    Path(id): Path<String>,
    body: Result<JsonBody<Value>, ApiError>,
) -> ApiResult<StatusCode> {
    let assignment = instructed_assignment(&state, &caller, &id).await?;
    let JsonBody(payload) = body?;

    update_fields::<Assignment, _>(
        state.assignments.as_ref(),
        assignment.id,
        ASSIGNMENT_UPDATABLE_FIELDS,
        &payload,
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /assignments/{id}
///
/// Submissions for the assignment and their stored files are removed
/// afterwards, best effort.
pub async fn delete_assignment(
    State(state): State<AppState>,
    caller: AuthContext,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let assignment = instructed_assignment(&state, &caller, &id).await?;

    let pipeline = state.pipeline.clone();
    let by_assignment = Filter::all().eq("assignmentId", assignment.id);
    let steps = vec![CascadeStep::new(Submission::COLLECTION, async move {
        pipeline.purge(&by_assignment).await
    })];

    cascade_delete(state.assignments.as_ref(), &assignment, steps).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /assignments/{id}/submissions
///
/// Paginated over every submission in the assignment's course.
pub async fn list_submissions(
    State(state): State<AppState>,
    caller: AuthContext,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Page<Submission>>> {
    let assignment = instructed_assignment(&state, &caller, &id).await?;

    let page = fetch_page(
        state.submissions.as_ref(),
        &Filter::all().eq("courseId", assignment.course_id),
        query.requested_page(),
        state.page_size,
    )
    .await?;
    Ok(Json(page))
}

/// POST /assignments/{id}/submissions
///
/// Multipart upload by a student enrolled in the assignment's course. The
/// student id is always the caller's.
pub async fn create_submission(
    State(state): State<AppState>,
    caller: AuthContext,
    Path(id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let assignment: Assignment = find_or_fail(state.assignments.as_ref(), &id).await?;
    state
        .authorize(&AuthPolicy::StudentOf(assignment.course_id), &caller)
        .await?;
    let student_id = caller.user_id().ok_or_else(ApiError::forbidden)?;

    let multipart = multipart.map_err(|e| ValidationError::InvalidBody {
        message: e.body_text(),
    })?;
    let upload = ReceivedUpload::from_multipart(multipart).await?;

    let submission = state.pipeline.submit(&assignment, student_id, upload).await?;
    tracing::info!(
        submission_id = %submission.id,
        assignment_id = %assignment.id,
        %student_id,
        "submission created"
    );
    Ok((
        StatusCode::CREATED,
        Json(json!({ "submissionId": submission.id })),
    ))
}

/// Load the assignment, then require admin or the instructor of its course
async fn instructed_assignment(state: &AppState, caller: &AuthContext, raw_id: &str) -> ApiResult<Assignment> {
    let id = parse_id::<Assignment>(raw_id)?;
    let assignment = find_by_id_or_fail(state.assignments.as_ref(), id).await?;
    state
        .authorize(
            &AuthPolicy::admin_or(AuthPolicy::InstructorOf(assignment.course_id)),
            caller,
        )
        .await?;
    Ok(assignment)
}
