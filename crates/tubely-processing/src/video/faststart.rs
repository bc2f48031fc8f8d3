use super::command::{run_tool, stderr_tail, validate_tool_path};
use super::tools::MediaToolError;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

/// Output location for a remux of `input`: `<input>.processing`.
pub fn processing_path(input: &Path) -> PathBuf {
    let mut name = OsString::from(input.as_os_str());
    name.push(".processing");
    PathBuf::from(name)
}

/// Relocates the MP4 index (moov atom) to the front of the file with a stream copy.
#[derive(Debug, Clone)]
pub struct FastStartRemuxer {
    ffmpeg_path: String,
    timeout: Option<Duration>,
}

impl FastStartRemuxer {
    pub fn new(ffmpeg_path: String, timeout: Option<Duration>) -> Result<Self, MediaToolError> {
        validate_tool_path(&ffmpeg_path)?;
        Ok(Self {
            ffmpeg_path,
            timeout,
        })
    }

    /// Writes `processing_path(input)`. On failure the output may exist and
    /// must be removed by the caller.
    #[tracing::instrument(skip(self), fields(
        process.executable.name = "ffmpeg",
        process.executable.path = %self.ffmpeg_path,
        ffmpeg.operation = "faststart"
    ))]
    pub async fn remux(&self, input: &Path) -> Result<PathBuf, MediaToolError> {
        let start = std::time::Instant::now();
        let output_path = processing_path(input);

        let mut command = Command::new(&self.ffmpeg_path);
        command
            .arg("-y")
            .arg("-i")
            .arg(input)
            .args(["-c", "copy", "-movflags", "faststart", "-f", "mp4"])
            .arg(&output_path);

        let output = run_tool("ffmpeg", command, self.timeout)
            .await
            .map_err(|e| match e {
                MediaToolError::Spawn { message, .. } => MediaToolError::Remux(message),
                other => other,
            })?;

        if !output.status.success() {
            let stderr = stderr_tail(&output);
            tracing::error!(status = %output.status, stderr = %stderr, "ffmpeg remux failed");
            return Err(MediaToolError::Remux(format!("{}: {}", output.status, stderr)));
        }

        tracing::debug!(
            duration_ms = start.elapsed().as_millis() as u64,
            output = %output_path.display(),
            "Fast-start remux completed"
        );

        Ok(output_path)
    }
}
