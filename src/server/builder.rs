//! ServerBuilder for fluent API to build HTTP servers

use super::router::build_router;
use super::state::AppState;
use crate::config::AppConfig;
use crate::core::identity::{IdentityResolver, TokenService};
use crate::core::service::{BlobStore, Repository};
use crate::core::upload::SubmissionPipeline;
use crate::entities::{Assignment, Course, Submission, User};
use crate::storage::{FsBlobStore, InMemoryBlobStore, InMemoryRepository};
use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Builder wiring stores, identity and the upload pipeline into a router
///
/// Stores default to in-memory repositories; the blob store defaults to the
/// filesystem when `storage.blob_dir` is configured and to memory otherwise.
///
/// # Example
///
/// ```ignore
/// ServerBuilder::new(AppConfig::load()?)
///     .with_users(InMemoryRepository::new())
///     .serve()
///     .await?;
/// ```
pub struct ServerBuilder {
    config: AppConfig,
    users: Option<Arc<dyn Repository<User>>>,
    courses: Option<Arc<dyn Repository<Course>>>,
    assignments: Option<Arc<dyn Repository<Assignment>>>,
    submissions: Option<Arc<dyn Repository<Submission>>>,
    blobs: Option<Arc<dyn BlobStore>>,
}

impl ServerBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            users: None,
            courses: None,
            assignments: None,
            submissions: None,
            blobs: None,
        }
    }

    pub fn with_users(mut self, repository: impl Repository<User> + 'static) -> Self {
        self.users = Some(Arc::new(repository));
        self
    }

    pub fn with_courses(mut self, repository: impl Repository<Course> + 'static) -> Self {
        self.courses = Some(Arc::new(repository));
        self
    }

    pub fn with_assignments(mut self, repository: impl Repository<Assignment> + 'static) -> Self {
        self.assignments = Some(Arc::new(repository));
        self
    }

    pub fn with_submissions(mut self, repository: impl Repository<Submission> + 'static) -> Self {
        self.submissions = Some(Arc::new(repository));
        self
    }

    pub fn with_blob_store(mut self, store: impl BlobStore + 'static) -> Self {
        self.blobs = Some(Arc::new(store));
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Assemble the shared state
    pub fn build_state(&mut self) -> Result<AppState> {
        self.config.validate()?;

        let users = self
            .users
            .take()
            .unwrap_or_else(|| Arc::new(InMemoryRepository::<User>::new()));
        let courses = self
            .courses
            .take()
            .unwrap_or_else(|| Arc::new(InMemoryRepository::<Course>::new()));
        let assignments = self
            .assignments
            .take()
            .unwrap_or_else(|| Arc::new(InMemoryRepository::<Assignment>::new()));
        let submissions = self
            .submissions
            .take()
            .unwrap_or_else(|| Arc::new(InMemoryRepository::<Submission>::new()));
        let blobs: Arc<dyn BlobStore> = match (self.blobs.take(), &self.config.storage.blob_dir) {
            (Some(store), _) => store,
            (None, Some(dir)) => Arc::new(FsBlobStore::new(dir)),
            (None, None) => Arc::new(InMemoryBlobStore::new()),
        };

        let tokens = TokenService::new(&self.config.auth.jwt_secret, self.config.auth.token_ttl_hours);
        let identity = Arc::new(IdentityResolver::new(tokens, users.clone()));
        let pipeline = Arc::new(SubmissionPipeline::new(
            blobs.clone(),
            submissions.clone(),
            self.config.storage.upload_dir.clone(),
        ));

        Ok(AppState {
            users,
            courses,
            assignments,
            submissions,
            blobs,
            identity,
            pipeline,
            page_size: self.config.pagination.page_size,
        })
    }

    /// Build the final REST router
    pub fn build(mut self) -> Result<Router> {
        let state = self.build_state()?;
        Ok(build_router(state, self.config.storage.max_upload_bytes))
    }

    /// Serve the application with graceful shutdown
    ///
    /// Binds the configured address and stops on SIGTERM or Ctrl+C once
    /// in-flight requests finish.
    pub async fn serve(self) -> Result<()> {
        let addr = self.config.socket_addr()?;
        let app = self.build()?;
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}
