//! HTTP handlers for courses, their rosters and enrollment

use super::model::{COURSE_UPDATABLE_FIELDS, Course, CourseSummary, EnrollmentUpdate, NewCourse};
use crate::core::access::{
    CascadeStep, cascade_delete, create_or_fail, find_by_id_or_fail, parse_id, update_fields,
};
use crate::core::auth::{AuthContext, AuthPolicy};
use crate::core::error::{ApiError, ApiResult, FieldValidationError, StorageError, ValidationError};
use crate::core::extractors::JsonBody;
use crate::core::field::Filter;
use crate::core::query::{Page, PageQuery, fetch_page};
use crate::core::service::Record;
use crate::entities::{Assignment, Role, Submission, User};
use crate::server::AppState;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/courses", get(list_courses).post(create_course))
        .route(
            "/courses/{id}",
            get(get_course).patch(update_course).delete(delete_course),
        )
        .route("/courses/{id}/students", get(list_students).post(update_enrollment))
        .route("/courses/{id}/roster", get(roster))
        .route("/courses/{id}/assignments", get(list_assignments))
}

/// POST /courses
pub async fn create_course(
    State(state): State<AppState>,
    caller: AuthContext,
    body: Result<JsonBody<NewCourse>, ApiError>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    state.authorize(&AuthPolicy::AdminOnly, &caller).await?;
    let JsonBody(body) = body?;

    let instructor = state.users.get(&body.instructor_id).await?;
    if !instructor.is_some_and(|user| user.role == Role::Instructor) {
        return Err(ValidationError::FieldErrors(vec![FieldValidationError {
            field: "instructorId".to_string(),
            message: "instructorId must reference an existing instructor".to_string(),
        }])
        .into());
    }

    let course = create_or_fail(state.courses.as_ref(), body.into_course()).await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": course.id }))))
}

/// GET /courses
///
/// Public, paginated, and never exposes enrollment.
pub async fn list_courses(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Page<CourseSummary>>> {
    let page = fetch_page(
        state.courses.as_ref(),
        &Filter::all(),
        query.requested_page(),
        state.page_size,
    )
    .await?;
    Ok(Json(page.map(CourseSummary::from)))
}

/// GET /courses/{id}
pub async fn get_course(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_id::<Course>(&id)?;
    let course = find_by_id_or_fail(state.courses.as_ref(), id).await?;
    Ok(Json(json!({ "course": CourseSummary::from(course) })))
}

/// GET /courses/{id}/students
pub async fn list_students(
    State(state): State<AppState>,
    caller: AuthContext,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let course = authorized_course(&state, &caller, &id).await?;
    let students = enrolled_users(&state, &course).await?;
    Ok(Json(json!({ "students": students })))
}

#[derive(Debug, Serialize)]
struct RosterRow<'a> {
    id: Uuid,
    name: &'a str,
    email: &'a str,
}

/// GET /courses/{id}/roster
///
/// CSV without a header row: `id,name,email` per enrolled student.
pub async fn roster(
    State(state): State<AppState>,
    caller: AuthContext,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let course = authorized_course(&state, &caller, &id).await?;
    let students = enrolled_users(&state, &course).await?;

    let csv = render_roster(&students).await?;
    Ok(([(header::CONTENT_TYPE, "text/csv")], csv))
}

async fn render_roster(students: &[User]) -> ApiResult<Vec<u8>> {
    let csv_error = |e: String| ApiError::Storage(StorageError::Persistence { message: e });

    let mut writer = csv_async::AsyncWriterBuilder::new()
        .has_headers(false)
        .create_serializer(Vec::new());
    for student in students {
        writer
            .serialize(RosterRow {
                id: student.id,
                name: &student.name,
                email: &student.email,
            })
            .await
            .map_err(|e| csv_error(e.to_string()))?;
    }
    writer
        .into_inner()
        .await
        .map_err(|e| csv_error(format!("flushing roster: {}", e)))
}

/// GET /courses/{id}/assignments
pub async fn list_assignments(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_id::<Course>(&id)?;
    let course = find_by_id_or_fail(state.courses.as_ref(), id).await?;
    let assignments = state
        .assignments
        .find(&Filter::all().eq("courseId", course.id))
        .await?;
    Ok(Json(json!({ "assignments": assignments })))
}

/// POST /courses/{id}/students
///
/// Adds every well-formed id that names an existing user (set semantics),
/// then removes the listed ids. Both lists are required; either may be
/// empty. The roster change is applied to the stored course in one step,
/// so concurrent enrollment calls and course edits never drop each other.
pub async fn update_enrollment(
    State(state): State<AppState>,
    caller: AuthContext,
    Path(id): Path<String>,
    body: Result<JsonBody<EnrollmentUpdate>, ApiError>,
) -> ApiResult<StatusCode> {
    let course = authorized_course(&state, &caller, &id).await?;
    let JsonBody(body) = body?;
    let (Some(add), Some(remove)) = (body.add, body.remove) else {
        return Err(ValidationError::InvalidBody {
            message: "both 'add' and 'remove' lists are required".to_string(),
        }
        .into());
    };

    let mut additions = Vec::with_capacity(add.len());
    for raw in &add {
        let Ok(user_id) = Uuid::parse_str(raw.trim()) else {
            tracing::debug!(course_id = %course.id, value = %raw, "skipping malformed student id");
            continue;
        };
        if state.users.get(&user_id).await?.is_none() {
            tracing::debug!(course_id = %course.id, %user_id, "skipping unknown student");
            continue;
        }
        additions.push(user_id);
    }
    let removals: Vec<Uuid> = remove
        .iter()
        .filter_map(|raw| Uuid::parse_str(raw.trim()).ok())
        .collect();

    let added = Arc::new(AtomicUsize::new(0));
    let removed = Arc::new(AtomicUsize::new(0));
    let (added_count, removed_count) = (added.clone(), removed.clone());
    state
        .courses
        .modify(
            &course.id,
            Box::new(move |course: &mut Course| -> anyhow::Result<()> {
                let enrolled = additions.into_iter().filter(|id| course.enroll(*id)).count();
                let before = course.students.len();
                course.unenroll(&removals);
                added_count.store(enrolled, Ordering::Relaxed);
                removed_count.store(before - course.students.len(), Ordering::Relaxed);
                Ok(())
            }),
        )
        .await?
        .ok_or_else(|| ApiError::not_found(Course::COLLECTION, course.id))?;

    tracing::info!(
        course_id = %course.id,
        added = added.load(Ordering::Relaxed),
        removed = removed.load(Ordering::Relaxed),
        "enrollment updated"
    );
    Ok(StatusCode::OK)
}

/// PATCH /courses/{id}
pub async fn update_course(
    State(state): State<AppState>,
    caller: AuthContext,
    Path(id): Path<String>,
    body: Result<JsonBody<Value>, ApiError>,
) -> ApiResult<StatusCode> {
    let course = authorized_course(&state, &caller, &id).await?;
    let JsonBody(payload) = body?;

    update_fields::<Course, _>(
        state.courses.as_ref(),
        course.id,
        COURSE_UPDATABLE_FIELDS,
        &payload,
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /courses/{id}
///
/// Admin only. Assignments, submissions and their stored files are removed
/// afterwards on a best-effort basis.
pub async fn delete_course(
    State(state): State<AppState>,
    caller: AuthContext,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id::<Course>(&id)?;
    state.authorize(&AuthPolicy::AdminOnly, &caller).await?;
    let course = find_by_id_or_fail(state.courses.as_ref(), id).await?;

    let by_course = Filter::all().eq("courseId", course.id);
    let assignments = state.assignments.clone();
    let pipeline = state.pipeline.clone();
    let assignment_filter = by_course.clone();
    let steps = vec![
        CascadeStep::new(Assignment::COLLECTION, async move {
            assignments.delete_where(&assignment_filter).await
        }),
        CascadeStep::new(Submission::COLLECTION, async move {
            pipeline.purge(&by_course).await
        }),
    ];

    cascade_delete(state.courses.as_ref(), &course, steps).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Parse the id, require admin or the course's instructor, then load it
///
/// Authorization runs before the lookup, so a non-admin asking about a
/// course that does not exist is told 403, not 404.
async fn authorized_course(state: &AppState, caller: &AuthContext, raw_id: &str) -> ApiResult<Course> {
    let id = parse_id::<Course>(raw_id)?;
    state
        .authorize(&AuthPolicy::admin_or(AuthPolicy::InstructorOf(id)), caller)
        .await?;
    find_by_id_or_fail(state.courses.as_ref(), id).await
}

/// Users currently enrolled, skipping ids whose user no longer exists
async fn enrolled_users(state: &AppState, course: &Course) -> ApiResult<Vec<User>> {
    let mut students = Vec::with_capacity(course.students.len());
    for student_id in &course.students {
        if let Some(user) = state.users.get(student_id).await? {
            students.push(user);
        }
    }
    Ok(students)
}
