//! Submission file pipeline
//!
//! ```text
//! Received -> Validated -> Stored -> Bound -> Complete
//!     \-> Rejected
//! ```
//!
//! An upload is staged in the local upload directory, copied into the blob
//! store under a random key, and only then bound to a new [`Submission`].
//! A failure before the blob is stored creates no record; a failure to bind
//! removes the stored blob again. Removing the staged copy is the last step
//! and its failure is logged, never reported.

use crate::core::error::{ApiError, ApiResult, StorageError, ValidationError};
use crate::core::field::Filter;
use crate::core::service::{BlobStore, Repository, StoredBlob};
use crate::entities::{Assignment, Submission};
use axum::extract::Multipart;
use bytes::Bytes;
use chrono::Utc;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;
use uuid::Uuid;

/// Multipart field carrying the uploaded file
pub const FILE_FIELD: &str = "file";

/// Accepted content types and the extension given to their blob keys
const ALLOWED_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("text/plain", "txt"),
    ("application/pdf", "pdf"),
];

/// Extension for an allowed content type
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    ALLOWED_TYPES
        .iter()
        .find(|(mime, _)| mime.eq_ignore_ascii_case(essence))
        .map(|(_, ext)| *ext)
}

/// Pipeline stage, used for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Validated,
    Stored,
    Bound,
    Complete,
    Rejected,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::Validated => "validated",
            Stage::Stored => "stored",
            Stage::Bound => "bound",
            Stage::Complete => "complete",
            Stage::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// The file part of a multipart request
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub content_type: String,
    pub data: Bytes,
}

/// A decoded multipart body: the file part plus every text field
#[derive(Debug, Clone, Default)]
pub struct ReceivedUpload {
    pub file: Option<UploadedFile>,
    pub fields: HashMap<String, String>,
}

impl ReceivedUpload {
    pub async fn from_multipart(mut multipart: Multipart) -> ApiResult<Self> {
        let mut upload = ReceivedUpload::default();

        while let Some(field) = multipart.next_field().await.map_err(invalid_multipart)? {
            let name = field.name().unwrap_or_default().to_string();
            if name == FILE_FIELD {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(invalid_multipart)?;
                upload.file = Some(UploadedFile {
                    file_name,
                    content_type,
                    data,
                });
            } else {
                let value = field.text().await.map_err(invalid_multipart)?;
                upload.fields.insert(name, value);
            }
        }

        Ok(upload)
    }

    /// Whether the caller tried to set a grade
    pub fn has_grade(&self) -> bool {
        self.fields.contains_key("grade")
    }
}

fn invalid_multipart(e: axum::extract::multipart::MultipartError) -> ApiError {
    ValidationError::InvalidBody {
        message: e.body_text(),
    }
    .into()
}

/// Stages uploads, stores them as blobs and binds them to submissions
pub struct SubmissionPipeline {
    blobs: Arc<dyn BlobStore>,
    submissions: Arc<dyn Repository<Submission>>,
    upload_dir: PathBuf,
    upload_dir_ready: OnceCell<()>,
}

impl SubmissionPipeline {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        submissions: Arc<dyn Repository<Submission>>,
        upload_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            blobs,
            submissions,
            upload_dir: upload_dir.into(),
            upload_dir_ready: OnceCell::new(),
        }
    }

    /// Run an upload through every stage
    ///
    /// The caller has already checked that `student_id` is enrolled in the
    /// assignment's course.
    pub async fn submit(
        &self,
        assignment: &Assignment,
        student_id: Uuid,
        upload: ReceivedUpload,
    ) -> ApiResult<Submission> {
        trace_stage(Stage::Received, assignment.id, student_id);

        if upload.has_grade() {
            trace_stage(Stage::Rejected, assignment.id, student_id);
            return Err(ValidationError::GradeNotAllowed.into());
        }
        let Some((file, ext)) = upload
            .file
            .and_then(|file| extension_for(&file.content_type).map(|ext| (file, ext)))
        else {
            trace_stage(Stage::Rejected, assignment.id, student_id);
            return Err(ValidationError::UnsupportedFileType.into());
        };
        trace_stage(Stage::Validated, assignment.id, student_id);
        tracing::debug!(
            file_name = file.file_name.as_deref().unwrap_or("<unnamed>"),
            content_type = %file.content_type,
            size = file.data.len(),
            "accepted upload"
        );

        let key = format!("{}.{}", Uuid::new_v4().simple(), ext);
        let staged = self.stage(&key, &file.data).await?;

        let stored = self
            .store(&key, &file.content_type, student_id, &staged)
            .await;
        if let Err(e) = stored {
            self.discard_staged(&staged).await;
            return Err(e);
        }
        trace_stage(Stage::Stored, assignment.id, student_id);

        let submission = Submission {
            id: Uuid::new_v4(),
            assignment_id: assignment.id,
            student_id,
            course_id: assignment.course_id,
            timestamp: Utc::now(),
            grade: None,
            file: key.clone(),
        };
        let submission = match self.submissions.insert(submission).await {
            Ok(submission) => submission,
            Err(e) => {
                if let Err(cleanup) = self.blobs.delete(&key).await {
                    tracing::warn!(%key, error = %cleanup, "could not remove blob of unbound submission");
                }
                self.discard_staged(&staged).await;
                return Err(e.into());
            }
        };
        trace_stage(Stage::Bound, assignment.id, student_id);

        self.discard_staged(&staged).await;
        trace_stage(Stage::Complete, assignment.id, student_id);

        Ok(submission)
    }

    /// Delete every submission matching `filter`, then its stored file
    ///
    /// Blob removal is best effort: a blob that cannot be deleted is logged
    /// and the submission stays deleted. Returns the number of submissions
    /// removed.
    pub async fn purge(&self, filter: &Filter) -> anyhow::Result<usize> {
        let doomed = self.submissions.find(filter).await?;
        let removed = self.submissions.delete_where(filter).await?;
        for submission in &doomed {
            if let Err(e) = self.blobs.delete(&submission.file).await {
                tracing::warn!(key = %submission.file, error = %e, "could not remove submission blob");
            }
        }
        Ok(removed)
    }

    async fn stage(&self, key: &str, data: &[u8]) -> ApiResult<PathBuf> {
        self.upload_dir_ready
            .get_or_try_init(|| async { tokio::fs::create_dir_all(&self.upload_dir).await })
            .await
            .map_err(|e| blob_error(format!("creating upload directory: {}", e)))?;

        let path = self.upload_dir.join(key);
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| blob_error(format!("staging upload {}: {}", path.display(), e)))?;
        Ok(path)
    }

    async fn store(&self, key: &str, content_type: &str, student_id: Uuid, staged: &Path) -> ApiResult<()> {
        let data = tokio::fs::read(staged)
            .await
            .map_err(|e| blob_error(format!("reading staged upload {}: {}", staged.display(), e)))?;

        self.blobs
            .put(StoredBlob {
                key: key.to_string(),
                content_type: content_type.to_string(),
                metadata: HashMap::from([
                    ("contentType".to_string(), content_type.to_string()),
                    ("studentId".to_string(), student_id.to_string()),
                ]),
                data: Bytes::from(data),
            })
            .await
            .map_err(|e| blob_error(format!("{:#}", e)))
    }

    async fn discard_staged(&self, staged: &Path) {
        if let Err(e) = tokio::fs::remove_file(staged).await {
            tracing::warn!(path = %staged.display(), error = %e, "could not remove staged upload");
        }
    }
}

fn blob_error(message: String) -> ApiError {
    StorageError::Blob { message }.into()
}

fn trace_stage(stage: Stage, assignment_id: Uuid, student_id: Uuid) {
    tracing::debug!(%stage, %assignment_id, %student_id, "submission upload");
}
