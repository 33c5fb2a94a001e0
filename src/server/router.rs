//! Router assembly: resource routes, health checks and the fallback

use super::state::AppState;
use crate::core::identity::resolve_identity;
use crate::entities::{assignment, course, submission, user};
use axum::extract::DefaultBodyLimit;
use axum::http::{StatusCode, Uri};
use axum::routing::get;
use axum::{Json, Router, middleware};
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

/// Build the complete API router
///
/// - resource routes for users, courses, assignments and submissions
/// - `GET /health` and `GET /healthz`
/// - a JSON 404 for anything else
///
/// The caller is resolved once per request before any handler runs.
pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .merge(user::handlers::routes())
        .merge(course::handlers::routes())
        .merge(assignment::handlers::routes())
        .merge(submission::handlers::routes())
        .route("/health", get(health_check))
        .route("/healthz", get(health_check))
        .fallback(not_recognized)
        .layer(middleware::from_fn_with_state(
            state.identity.clone(),
            resolve_identity,
        ))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "course-api"
    }))
}

async fn not_recognized(uri: Uri) -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("This URL was not recognized: {}", uri) })),
    )
}
