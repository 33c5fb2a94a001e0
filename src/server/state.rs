//! Shared application state handed to every handler

use crate::core::auth::{AuthContext, AuthPolicy, authorize};
use crate::core::error::ApiResult;
use crate::core::identity::IdentityResolver;
use crate::core::service::{BlobStore, Repository};
use crate::core::upload::SubmissionPipeline;
use crate::entities::{Assignment, Course, Submission, User};
use axum::extract::FromRef;
use std::sync::Arc;

/// Stores and services shared across requests
///
/// Everything is behind an `Arc`, so cloning per request is cheap. No
/// request-scoped data lives here.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn Repository<User>>,
    pub courses: Arc<dyn Repository<Course>>,
    pub assignments: Arc<dyn Repository<Assignment>>,
    pub submissions: Arc<dyn Repository<Submission>>,
    pub blobs: Arc<dyn BlobStore>,
    pub identity: Arc<IdentityResolver>,
    pub pipeline: Arc<SubmissionPipeline>,
    pub page_size: usize,
}

impl AppState {
    /// Evaluate `policy` for the caller against current course data
    pub async fn authorize(&self, policy: &AuthPolicy, context: &AuthContext) -> ApiResult<()> {
        authorize(policy, context, self.courses.as_ref()).await
    }
}

impl FromRef<AppState> for Arc<IdentityResolver> {
    fn from_ref(state: &AppState) -> Self {
        state.identity.clone()
    }
}
