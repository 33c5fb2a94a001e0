//! Typed error handling for the course API
//!
//! Every handler returns [`ApiResult`], so a failure anywhere in the request
//! path is rendered the same way: a status code chosen from the error category
//! and the envelope `{"error": "<message>"}`.
//!
//! # Error Categories
//!
//! - [`EntityError`]: a well-formed identifier that matches no record (404)
//! - [`ValidationError`]: malformed ids, bodies or uploads (400)
//! - [`RequestError`]: bad credentials (401) or a failed authorization predicate (403)
//! - [`StorageError`]: persistence or blob backend failures (500)
//!
//! Upstream failures are logged with their detail and reported to the caller
//! with a generic message only.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::fmt;

/// The main error type of the API
#[derive(Debug)]
pub enum ApiError {
    /// Record lookups
    Entity(EntityError),

    /// Malformed input
    Validation(ValidationError),

    /// Authentication and authorization failures
    Request(RequestError),

    /// Persistence or blob storage failures
    Storage(StorageError),

    /// Anything else that should not happen in normal operation
    Internal(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Entity(e) => write!(f, "{}", e),
            ApiError::Validation(e) => write!(f, "{}", e),
            ApiError::Request(e) => write!(f, "{}", e),
            ApiError::Storage(e) => write!(f, "{}", e),
            ApiError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApiError::Entity(e) => Some(e),
            ApiError::Validation(e) => Some(e),
            ApiError::Request(e) => Some(e),
            ApiError::Storage(e) => Some(e),
            ApiError::Internal(_) => None,
        }
    }
}

/// Error envelope sent to clients
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ApiError {
    /// Shorthand for a 403 raised by the authorization layer
    pub fn forbidden() -> Self {
        ApiError::Request(RequestError::Forbidden)
    }

    /// Shorthand for a 404 on `collection`
    pub fn not_found(collection: &str, id: impl fmt::Display) -> Self {
        ApiError::Entity(EntityError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        })
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Entity(e) => e.status_code(),
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Request(e) => e.status_code(),
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message exposed to the caller
    ///
    /// Server-side failures never leak their detail.
    pub fn public_message(&self) -> String {
        if self.status_code().is_server_error() {
            "Internal server error, try again later".to_string()
        } else {
            self.to_string()
        }
    }

    /// Convert to an error response
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.public_message(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "request rejected");
        }
        (status, Json(self.to_response())).into_response()
    }
}

// =============================================================================
// Entity Errors
// =============================================================================

/// Errors related to record lookups
#[derive(Debug)]
pub enum EntityError {
    /// Well-formed identifier with no matching record
    NotFound { collection: String, id: String },
}

impl fmt::Display for EntityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityError::NotFound { collection, id } => {
                write!(f, "{} with id '{}' does not exist", collection, id)
            }
        }
    }
}

impl std::error::Error for EntityError {}

impl EntityError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            EntityError::NotFound { .. } => StatusCode::NOT_FOUND,
        }
    }
}

impl From<EntityError> for ApiError {
    fn from(err: EntityError) -> Self {
        ApiError::Entity(err)
    }
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Errors related to input validation
#[derive(Debug)]
pub enum ValidationError {
    /// Identifier that cannot be parsed for the collection's id type
    MalformedId { collection: String, value: String },

    /// One or more fields failed their constraints
    FieldErrors(Vec<FieldValidationError>),

    /// Body missing or not decodable
    InvalidBody { message: String },

    /// A field the endpoint requires is absent
    MissingField { field: String },

    /// Partial update carrying none of the updatable fields
    NoUpdatableFields { allowed: Vec<&'static str> },

    /// Upload absent or outside the allowed content types
    UnsupportedFileType,

    /// A grade was supplied while creating a submission
    GradeNotAllowed,
}

/// A single field validation error
#[derive(Debug, Clone, Serialize)]
pub struct FieldValidationError {
    pub field: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MalformedId { collection, value } => {
                write!(f, "Could not parse {} id '{}'", collection, value)
            }
            ValidationError::FieldErrors(errors) => {
                let msgs: Vec<String> = errors
                    .iter()
                    .map(|e| format!("{}: {}", e.field, e.message))
                    .collect();
                write!(f, "Validation errors: {}", msgs.join(", "))
            }
            ValidationError::InvalidBody { message } => {
                write!(f, "Invalid request body: {}", message)
            }
            ValidationError::MissingField { field } => {
                write!(f, "Missing required field: {}", field)
            }
            ValidationError::NoUpdatableFields { allowed } => {
                write!(
                    f,
                    "Request body contains none of the updatable fields ({})",
                    allowed.join(", ")
                )
            }
            ValidationError::UnsupportedFileType => write!(f, "Unsupported file type"),
            ValidationError::GradeNotAllowed => {
                write!(f, "A grade cannot be set when creating a submission")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Validation(err)
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<FieldValidationError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| FieldValidationError {
                    field: field.to_string(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string()),
                })
            })
            .collect();
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        ApiError::Validation(ValidationError::FieldErrors(fields))
    }
}

// =============================================================================
// Request Errors
// =============================================================================

/// Errors related to the caller's credentials
#[derive(Debug)]
pub enum RequestError {
    /// Login with a wrong email or password
    Unauthorized { message: String },

    /// Authenticated or not, no authorization predicate matched
    Forbidden,
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::Unauthorized { message } => write!(f, "{}", message),
            RequestError::Forbidden => {
                write!(f, "The request was not made by an authorized user")
            }
        }
    }
}

impl std::error::Error for RequestError {}

impl RequestError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RequestError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            RequestError::Forbidden => StatusCode::FORBIDDEN,
        }
    }
}

impl From<RequestError> for ApiError {
    fn from(err: RequestError) -> Self {
        ApiError::Request(err)
    }
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Errors raised by the persistence or blob backends
#[derive(Debug)]
pub enum StorageError {
    /// Record store failure
    Persistence { message: String },

    /// Blob store failure
    Blob { message: String },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Persistence { message } => write!(f, "Persistence error: {}", message),
            StorageError::Blob { message } => write!(f, "Blob storage error: {}", message),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError::Storage(err)
    }
}

// =============================================================================
// Conversions from external errors
// =============================================================================

/// Persistence traits report failures through `anyhow`
///
/// An `ApiError` raised inside a repository mutation comes back out as
/// itself; anything else is a storage failure.
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<ApiError>() {
            Ok(api) => api,
            Err(err) => ApiError::Storage(StorageError::Persistence {
                message: format!("{:#}", err),
            }),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Validation(ValidationError::InvalidBody {
            message: err.to_string(),
        })
    }
}

impl From<crate::core::password::PasswordError> for ApiError {
    fn from(err: crate::core::password::PasswordError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<crate::core::identity::TokenError> for ApiError {
    fn from(err: crate::core::identity::TokenError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

/// A specialized Result type for request handling
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_404() {
        let err = ApiError::not_found("course", "abc");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert!(err.to_string().contains("course"));
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_validation_errors_map_to_400() {
        let malformed = ApiError::from(ValidationError::MalformedId {
            collection: "assignment".to_string(),
            value: "xyz".to_string(),
        });
        assert_eq!(malformed.status_code(), StatusCode::BAD_REQUEST);

        let upload = ApiError::from(ValidationError::UnsupportedFileType);
        assert_eq!(upload.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(upload.public_message(), "Unsupported file type");
    }

    #[test]
    fn test_request_error_status_codes() {
        assert_eq!(ApiError::forbidden().status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::from(RequestError::Unauthorized {
                message: "bad".to_string()
            })
            .status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_storage_error_hides_detail() {
        let err = ApiError::from(anyhow::anyhow!("connection reset by peer"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("connection reset"));
        assert!(!err.public_message().contains("connection reset"));
    }

    #[test]
    fn test_api_error_survives_anyhow_round_trip() {
        let wrapped = anyhow::Error::new(ApiError::from(ValidationError::GradeNotAllowed));
        let err = ApiError::from(wrapped);
        assert!(matches!(err, ApiError::Validation(ValidationError::GradeNotAllowed)));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_no_updatable_fields_lists_allowed() {
        let err = ValidationError::NoUpdatableFields {
            allowed: vec!["title", "points", "due"],
        };
        assert!(err.to_string().contains("title, points, due"));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let err: ApiError = json_err.into();
        assert!(matches!(
            err,
            ApiError::Validation(ValidationError::InvalidBody { .. })
        ));
    }

    #[test]
    fn test_error_response_envelope() {
        let body = serde_json::to_value(ApiError::forbidden().to_response()).unwrap();
        assert!(body["error"].is_string());
        assert_eq!(body.as_object().unwrap().len(), 1);
    }
}
