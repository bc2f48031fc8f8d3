//! Tubely media processing
//!
//! Content-type validation, the ffprobe/ffmpeg wrappers and the video
//! ingestion pipeline that ties them to storage and the video repository.

pub mod upload;
pub mod validator;
pub mod video;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use upload::{
    IngestError, IngestOutcome, IngestRequest, IngestStage, PipelineOptions, ThumbnailUploader,
    VideoIngestPipeline,
};
pub use validator::{extension_for_content_type, normalize_content_type, ContentTypeValidator, ValidationError};
pub use video::{
    processing_path, FastStartRemuxer, FfmpegTools, MediaToolError, MediaTools, Orientation,
    ProbeResult, VideoProber,
};
