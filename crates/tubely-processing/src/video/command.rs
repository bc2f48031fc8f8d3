//! Running ffprobe/ffmpeg child processes.

use super::tools::MediaToolError;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;

/// Reject tool paths containing shell metacharacters or traversal sequences.
pub(crate) fn validate_tool_path(path: &str) -> Result<(), MediaToolError> {
    let dangerous_chars = [';', '|', '&', '$', '`', '(', ')', '<', '>', '\n', '\r'];
    if path.is_empty() || path.chars().any(|c| dangerous_chars.contains(&c)) {
        return Err(MediaToolError::InvalidToolPath(path.to_string()));
    }
    if path.contains("..") {
        return Err(MediaToolError::InvalidToolPath(path.to_string()));
    }
    Ok(())
}

/// Spawn `command`, capture its output and enforce `timeout`.
///
/// The child is killed if the returned future is dropped or the timeout fires.
pub(crate) async fn run_tool(
    tool: &'static str,
    mut command: Command,
    timeout: Option<Duration>,
) -> Result<Output, MediaToolError> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = command.output();
    let result = match timeout {
        Some(limit) => tokio::time::timeout(limit, output).await.map_err(|_| {
            tracing::warn!(tool, timeout_secs = limit.as_secs(), "Media tool timed out");
            MediaToolError::Timeout {
                tool,
                secs: limit.as_secs(),
            }
        })?,
        None => output.await,
    };

    result.map_err(|e| MediaToolError::Spawn {
        tool,
        message: e.to_string(),
    })
}

/// Last few lines of a tool's stderr, for error messages.
pub(crate) fn stderr_tail(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let lines: Vec<&str> = stderr.lines().collect();
    let start = lines.len().saturating_sub(5);
    lines[start..].join("\n")
}
