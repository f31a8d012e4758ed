use std::sync::Arc;

use anyhow::Result;
use aws_config::BehaviorVersion;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod locator;
mod middleware;
mod models;
mod processing;
mod repositories;
mod routes;
mod state;
mod storage;

use common::database::{DatabaseConfig, init_pool};

use crate::config::{AppConfig, ThumbnailStorage};
use crate::processing::{MediaProcessor, SystemRunner};
use crate::repositories::VideoRepository;
use crate::state::AppState;
use crate::storage::VideoStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    info!("Starting clipstream API service");

    let config = AppConfig::from_env()?;

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    if common::database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    // Initialize AWS S3 client
    let aws_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let s3_client = aws_sdk_s3::Client::new(&aws_config);

    if config.thumbnail_storage == ThumbnailStorage::Filesystem {
        tokio::fs::create_dir_all(&config.assets_root).await?;
    }

    let bind_addr = config.bind_addr.clone();

    let app_state = AppState {
        store: VideoStore::new(s3_client, config.s3_bucket.clone()),
        video_repository: VideoRepository::new(pool),
        processor: MediaProcessor::new(Arc::new(SystemRunner)),
        config: Arc::new(config),
    };

    // Start the web server
    let app = routes::create_router(app_state);

    let listener = TcpListener::bind(&bind_addr).await?;
    info!("clipstream API listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
