use anyhow::Result;
use course_api::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!(
        port = config.server.port,
        page_size = config.pagination.page_size,
        upload_dir = %config.storage.upload_dir.display(),
        "starting course-api"
    );

    ServerBuilder::new(config).serve().await
}
