use super::command::{run_tool, stderr_tail, validate_tool_path};
use super::tools::MediaToolError;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;

/// Frame geometry of the first video stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResult {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
}

/// Decode ffprobe's `-print_format json -show_streams` report.
pub fn parse_probe_output(stdout: &[u8]) -> Result<ProbeResult, MediaToolError> {
    let report: FfprobeOutput = serde_json::from_slice(stdout)
        .map_err(|e| MediaToolError::ProbeFormat(e.to_string()))?;

    let stream = report
        .streams
        .into_iter()
        .next()
        .ok_or(MediaToolError::ProbeEmpty)?;

    Ok(ProbeResult {
        width: stream.width,
        height: stream.height,
    })
}

/// Runs ffprobe against local files.
#[derive(Debug, Clone)]
pub struct VideoProber {
    ffprobe_path: String,
    timeout: Option<Duration>,
}

impl VideoProber {
    pub fn new(ffprobe_path: String, timeout: Option<Duration>) -> Result<Self, MediaToolError> {
        validate_tool_path(&ffprobe_path)?;
        Ok(Self {
            ffprobe_path,
            timeout,
        })
    }

    #[tracing::instrument(skip(self), fields(
        process.executable.name = "ffprobe",
        process.executable.path = %self.ffprobe_path,
        ffmpeg.operation = "probe"
    ))]
    pub async fn probe(&self, path: &Path) -> Result<ProbeResult, MediaToolError> {
        let start = std::time::Instant::now();

        let mut command = Command::new(&self.ffprobe_path);
        command
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_streams",
                "-select_streams",
                "v:0",
            ])
            .arg(path);

        let output = run_tool("ffprobe", command, self.timeout)
            .await
            .map_err(|e| match e {
                MediaToolError::Spawn { message, .. } => MediaToolError::ProbeExecution(message),
                other => other,
            })?;

        if !output.status.success() {
            let stderr = stderr_tail(&output);
            tracing::error!(status = %output.status, stderr = %stderr, "ffprobe failed");
            return Err(MediaToolError::ProbeExecution(format!(
                "{}: {}",
                output.status, stderr
            )));
        }

        let result = parse_probe_output(&output.stdout)?;

        tracing::debug!(
            duration_ms = start.elapsed().as_millis() as u64,
            width = result.width,
            height = result.height,
            "Video probe completed"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_first_stream() {
        let json = br#"{"streams":[
            {"index":0,"codec_type":"video","width":1920,"height":1080},
            {"index":1,"codec_type":"video","width":640,"height":360}
        ]}"#;
        let result = parse_probe_output(json).unwrap();
        assert_eq!(
            result,
            ProbeResult {
                width: 1920,
                height: 1080
            }
        );
    }

    #[test]
    fn test_missing_dimensions_decode_as_zero() {
        let json = br#"{"streams":[{"index":0,"codec_type":"video"}]}"#;
        let result = parse_probe_output(json).unwrap();
        assert_eq!(result.width, 0);
        assert_eq!(result.height, 0);
    }

    #[test]
    fn test_empty_stream_list() {
        assert!(matches!(
            parse_probe_output(br#"{"streams":[]}"#),
            Err(MediaToolError::ProbeEmpty)
        ));
        assert!(matches!(
            parse_probe_output(b"{}"),
            Err(MediaToolError::ProbeEmpty)
        ));
    }

    #[test]
    fn test_malformed_output() {
        assert!(matches!(
            parse_probe_output(b"not json at all"),
            Err(MediaToolError::ProbeFormat(_))
        ));
        assert!(matches!(
            parse_probe_output(br#"{"streams":[{"width":"wide"}]}"#),
            Err(MediaToolError::ProbeFormat(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_binary_is_probe_execution_error() {
        let prober = VideoProber::new("tubely-missing-ffprobe".to_string(), None).unwrap();
        let err = prober.probe(Path::new("/nonexistent.mp4")).await.unwrap_err();
        assert!(matches!(err, MediaToolError::ProbeExecution(_)));
    }

    #[tokio::test]
    #[ignore = "requires ffprobe on PATH"]
    async fn test_real_ffprobe_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.mp4");
        std::fs::write(&path, b"definitely not a video").unwrap();

        let prober = VideoProber::new("ffprobe".to_string(), Some(Duration::from_secs(30))).unwrap();
        let err = prober.probe(&path).await.unwrap_err();
        assert!(matches!(err, MediaToolError::ProbeExecution(_)));
    }
}
