use std::sync::Arc;

use tubely_core::Config;
use tubely_processing::{ThumbnailUploader, VideoIngestPipeline};
use tubely_storage::Storage;

/// Shared, read-only state handed to every handler.
pub struct AppState {
    pub config: Config,
    pub storage: Arc<dyn Storage>,
    pub pipeline: VideoIngestPipeline,
    pub thumbnails: ThumbnailUploader,
}
