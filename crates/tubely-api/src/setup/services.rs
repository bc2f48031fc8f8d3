//! Wiring of the ingestion services into [`AppState`]

use anyhow::{Context, Result};
use sqlx::PgPool;
use std::sync::Arc;
use tubely_core::Config;
use tubely_db::{PgVideoRepository, VideoRepository};
use tubely_processing::{FfmpegTools, PipelineOptions, ThumbnailUploader, VideoIngestPipeline};
use tubely_storage::Storage;

use crate::state::AppState;

pub fn initialize_services(
    config: Config,
    pool: PgPool,
    storage: Arc<dyn Storage>,
) -> Result<Arc<AppState>> {
    let videos: Arc<dyn VideoRepository> = Arc::new(PgVideoRepository::new(pool));
    let tools = FfmpegTools::from_config(&config).context("Invalid media tool configuration")?;

    tracing::info!(
        ffprobe = %config.ffprobe_path(),
        ffmpeg = %config.ffmpeg_path(),
        timeout_secs = config.media_tool_timeout().map(|t| t.as_secs()),
        temp_dir = %config.upload_temp_dir().display(),
        "Media tools configured"
    );

    Ok(build_state(config, Arc::new(tools), storage, videos))
}

/// Assemble the state from already-constructed collaborators.
pub fn build_state(
    config: Config,
    tools: Arc<dyn tubely_processing::MediaTools>,
    storage: Arc<dyn Storage>,
    videos: Arc<dyn VideoRepository>,
) -> Arc<AppState> {
    let pipeline = VideoIngestPipeline::new(
        tools,
        storage.clone(),
        videos.clone(),
        PipelineOptions::from_config(&config),
    );
    let thumbnails = ThumbnailUploader::new(
        storage.clone(),
        videos,
        config.thumbnail_allowed_content_types().to_vec(),
        config.cleanup_orphaned_objects(),
    );

    Arc::new(AppState {
        config,
        storage,
        pipeline,
        thumbnails,
    })
}
