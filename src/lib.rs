//! # Course API
//!
//! A course-management REST API: users with a closed role
//! (`admin`, `instructor`, `student`), the courses they teach or attend,
//! assignments, and file-bearing submissions.
//!
//! ## Features
//!
//! - **Relationship-based authorization**: `AuthPolicy` combines role checks
//!   with instructor-of-course, student-of-course and self-access lookups
//! - **Pagination**: clamped page windows with a uniform `Page<T>` envelope
//! - **Submission uploads**: multipart files staged on disk, then stored by key
//! - **Cascading deletes**: children are removed best effort after the parent
//! - **Pluggable storage**: `Repository<T>` and `BlobStore` traits with
//!   in-memory and filesystem implementations
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use course_api::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::load()?;
//!     ServerBuilder::new(config)
//!         .with_courses(InMemoryRepository::new())
//!         .serve()
//!         .await
//! }
//! ```

pub mod config;
pub mod core;
pub mod entities;
pub mod server;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Configuration ===
    pub use crate::config::AppConfig;

    // === Core ===
    pub use crate::core::{
        access::{
            CascadeStep, cascade_delete, create_or_fail, create_unique_or_fail, find_or_fail, parse_id, update_fields,
        },
        auth::{AuthContext, AuthPolicy, authorize},
        error::{ApiError, ApiResult},
        extractors::{JsonBody, ValidatedJson},
        field::{FieldValue, Filter},
        identity::{IdentityResolver, TokenService},
        query::{Page, PageQuery, Pagination},
        service::{BlobStore, Mutation, Record, Repository, StoredBlob},
        upload::{ReceivedUpload, SubmissionPipeline},
    };

    // === Entities ===
    pub use crate::entities::{Assignment, Course, CourseSummary, Role, Submission, User};

    // === Storage ===
    pub use crate::storage::{FsBlobStore, InMemoryBlobStore, InMemoryRepository};

    // === Server ===
    pub use crate::server::{AppState, ServerBuilder, build_router};

    // === External re-exports ===
    pub use anyhow::Result;
    pub use async_trait::async_trait;
    pub use serde::{Deserialize, Serialize};
    pub use uuid::Uuid;
}
