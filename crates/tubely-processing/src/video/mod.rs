//! Video inspection and remuxing through the external ffprobe/ffmpeg tools.

mod command;
mod faststart;
mod orientation;
mod probe;
mod tools;

pub use faststart::{processing_path, FastStartRemuxer};
pub use orientation::Orientation;
pub use probe::{parse_probe_output, ProbeResult, VideoProber};
pub use tools::{FfmpegTools, MediaToolError, MediaTools};
