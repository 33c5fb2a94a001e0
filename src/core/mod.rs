//! Core building blocks shared by every resource

pub mod access;
pub mod auth;
pub mod error;
pub mod extractors;
pub mod field;
pub mod identity;
pub mod password;
pub mod query;
pub mod service;
pub mod upload;

pub use access::{
    CascadeStep, cascade_delete, create_or_fail, create_unique_or_fail, find_or_fail, parse_id, update_fields,
};
pub use auth::{AuthContext, AuthPolicy, authorize};
pub use error::{ApiError, ApiResult};
pub use extractors::{JsonBody, ValidatedJson};
pub use field::{FieldValue, Filter};
pub use identity::{IdentityResolver, TokenService};
pub use query::{Page, PageQuery, Pagination};
pub use service::{BlobStore, Record, Repository, StoredBlob};
pub use upload::{ReceivedUpload, SubmissionPipeline};
