use super::faststart::FastStartRemuxer;
use super::probe::{ProbeResult, VideoProber};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tubely_core::AppError;

/// Failures of the external media tools. None of them are retryable.
#[derive(Debug, thiserror::Error)]
pub enum MediaToolError {
    #[error("ffprobe failed: {0}")]
    ProbeExecution(String),

    #[error("ffprobe output could not be parsed: {0}")]
    ProbeFormat(String),

    #[error("ffprobe reported no streams")]
    ProbeEmpty,

    #[error("ffmpeg remux failed: {0}")]
    Remux(String),

    #[error("{tool} did not finish within {secs}s")]
    Timeout { tool: &'static str, secs: u64 },

    #[error("Failed to run {tool}: {message}")]
    Spawn { tool: &'static str, message: String },

    #[error("Invalid media tool path: {0}")]
    InvalidToolPath(String),
}

impl From<MediaToolError> for AppError {
    fn from(err: MediaToolError) -> Self {
        AppError::MediaProcessing(err.to_string())
    }
}

/// The two media operations the ingestion pipeline needs.
#[async_trait]
pub trait MediaTools: Send + Sync {
    /// Geometry of the first video stream in `path`.
    async fn probe(&self, path: &Path) -> Result<ProbeResult, MediaToolError>;

    /// Rewrite `input` with its index at the front. Writes `processing_path(input)`
    /// and returns that path. `input` is left in place.
    async fn remux(&self, input: &Path) -> Result<PathBuf, MediaToolError>;
}

/// `MediaTools` backed by the ffprobe and ffmpeg binaries.
#[derive(Debug, Clone)]
pub struct FfmpegTools {
    prober: VideoProber,
    remuxer: FastStartRemuxer,
}

impl FfmpegTools {
    pub fn new(
        ffprobe_path: String,
        ffmpeg_path: String,
        timeout: Option<Duration>,
    ) -> Result<Self, MediaToolError> {
        Ok(Self {
            prober: VideoProber::new(ffprobe_path, timeout)?,
            remuxer: FastStartRemuxer::new(ffmpeg_path, timeout)?,
        })
    }

    pub fn from_config(config: &tubely_core::Config) -> Result<Self, MediaToolError> {
        Self::new(
            config.ffprobe_path().to_string(),
            config.ffmpeg_path().to_string(),
            config.media_tool_timeout(),
        )
    }
}

#[async_trait]
impl MediaTools for FfmpegTools {
    async fn probe(&self, path: &Path) -> Result<ProbeResult, MediaToolError> {
        self.prober.probe(path).await
    }

    async fn remux(&self, input: &Path) -> Result<PathBuf, MediaToolError> {
        self.remuxer.remux(input).await
    }
}
