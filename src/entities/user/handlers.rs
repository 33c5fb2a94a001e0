//! HTTP handlers for users: signup, login and profile

use super::model::{LoginRequest, NewUser, Role, User};
use crate::core::access::{create_unique_or_fail, find_or_fail};
use crate::core::auth::{AuthContext, AuthPolicy};
use crate::core::error::{ApiError, ApiResult, FieldValidationError, RequestError, ValidationError};
use crate::core::extractors::{JsonBody, ValidatedJson};
use crate::core::field::Filter;
use crate::core::password::{hash_password_blocking, verify_password_blocking};
use crate::entities::{Course, CourseSummary};
use crate::server::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{Value, json};
use uuid::Uuid;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(create_user))
        .route("/users/login", post(login))
        .route("/users/{id}", get(get_user))
}

/// Courses attached to a profile, shaped by the user's role
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum UserCourses {
    Taught(Vec<Course>),
    Enrolled(Vec<CourseSummary>),
}

#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub user: User,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub courses: Option<UserCourses>,
}

/// POST /users
///
/// Anyone may sign up as a student; creating an admin or instructor needs
/// an admin caller.
pub async fn create_user(
    State(state): State<AppState>,
    caller: AuthContext,
    ValidatedJson(body): ValidatedJson<NewUser>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    if body.role.is_privileged() {
        state.authorize(&AuthPolicy::AdminOnly, &caller).await?;
    }

    let email = body.email.trim().to_lowercase();
    let same_email = Filter::all().eq("email", email.as_str());
    // skip hashing for an address that is plainly taken
    if state.users.find_one(&same_email).await?.is_some() {
        return Err(email_taken());
    }

    let password_hash = hash_password_blocking(body.password).await?;
    let user = User {
        id: Uuid::new_v4(),
        name: body.name,
        email,
        password_hash,
        role: body.role,
    };
    let user = create_unique_or_fail(state.users.as_ref(), user, &same_email)
        .await?
        .ok_or_else(email_taken)?;

    Ok((StatusCode::CREATED, Json(json!({ "id": user.id }))))
}

fn email_taken() -> ApiError {
    ValidationError::FieldErrors(vec![FieldValidationError {
        field: "email".to_string(),
        message: "email is already registered".to_string(),
    }])
    .into()
}

/// POST /users/login
pub async fn login(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<LoginRequest>,
) -> ApiResult<Json<Value>> {
    if body.email.trim().is_empty() || body.password.is_empty() {
        return Err(ValidationError::InvalidBody {
            message: "email and password are required".to_string(),
        }
        .into());
    }

    let email = body.email.trim().to_lowercase();
    let user = state
        .users
        .find_one(&Filter::all().eq("email", email.as_str()))
        .await?;

    let authenticated = match user {
        Some(user) => {
            let valid = verify_password_blocking(body.password, user.password_hash.clone()).await?;
            valid.then_some(user)
        }
        None => None,
    };

    let Some(user) = authenticated else {
        tracing::info!("login rejected");
        return Err(RequestError::Unauthorized {
            message: "Invalid authentication credentials".to_string(),
        }
        .into());
    };

    let token = state.identity.tokens().issue(user.id)?;
    tracing::info!(user_id = %user.id, "login succeeded");
    Ok(Json(json!({ "token": token })))
}

/// GET /users/{id}
///
/// Admins and the user themself only. Instructors see the courses they
/// teach, students the courses they are enrolled in.
pub async fn get_user(
    State(state): State<AppState>,
    caller: AuthContext,
    Path(id): Path<String>,
) -> ApiResult<Json<UserProfile>> {
    let user: User = find_or_fail(state.users.as_ref(), &id).await?;
    state
        .authorize(&AuthPolicy::admin_or(AuthPolicy::SelfOf(user.id)), &caller)
        .await?;

    let courses = match user.role {
        Role::Instructor => Some(UserCourses::Taught(
            state
                .courses
                .find(&Filter::all().eq("instructorId", user.id))
                .await?,
        )),
        Role::Student => Some(UserCourses::Enrolled(
            state
                .courses
                .find(&Filter::all().eq("students", user.id))
                .await?
                .into_iter()
                .map(CourseSummary::from)
                .collect(),
        )),
        Role::Admin => None,
    };

    Ok(Json(UserProfile { user, courses }))
}
