//! Upload paths: the video ingestion pipeline and the thumbnail uploader.

mod error;
mod pipeline;
mod thumbnail;
mod types;

pub use error::IngestError;
pub use pipeline::VideoIngestPipeline;
pub use thumbnail::ThumbnailUploader;
pub use types::{IngestOutcome, IngestRequest, IngestStage, PipelineOptions};
