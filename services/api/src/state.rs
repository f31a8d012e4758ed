//! Application state shared across handlers

use std::sync::Arc;

use crate::config::AppConfig;
use crate::processing::MediaProcessor;
use crate::repositories::VideoRepository;
use crate::storage::VideoStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub video_repository: VideoRepository,
    pub store: VideoStore,
    pub processor: MediaProcessor,
}
