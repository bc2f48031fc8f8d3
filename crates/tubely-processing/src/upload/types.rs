//! Types for the upload pipeline.

use crate::video::{Orientation, ProbeResult};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;
use tubely_core::models::Video;
use uuid::Uuid;

/// Steps of a video ingestion, in order. A failure at any step ends the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IngestStage {
    Received,
    Staged,
    Probed,
    Classified,
    Remuxed,
    Uploaded,
    Linked,
    Done,
}

impl Display for IngestStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            IngestStage::Received => "received",
            IngestStage::Staged => "staged",
            IngestStage::Probed => "probed",
            IngestStage::Classified => "classified",
            IngestStage::Remuxed => "remuxed",
            IngestStage::Uploaded => "uploaded",
            IngestStage::Linked => "linked",
            IngestStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// One inbound upload.
pub struct IngestRequest<R> {
    pub video_id: Uuid,
    pub user_id: Uuid,
    /// Content type as declared by the client
    pub content_type: String,
    pub body: R,
}

/// Result of a successful ingestion.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub video: Video,
    pub storage_key: String,
    pub url: String,
    pub orientation: Orientation,
    pub probe: ProbeResult,
}

/// Settings the pipeline takes from configuration.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub allowed_content_types: Vec<String>,
    pub temp_dir: PathBuf,
    /// Delete the stored object when linking it to the record fails
    pub cleanup_orphaned_objects: bool,
}

impl PipelineOptions {
    pub fn from_config(config: &tubely_core::Config) -> Self {
        Self {
            allowed_content_types: config.video_allowed_content_types().to_vec(),
            temp_dir: config.upload_temp_dir(),
            cleanup_orphaned_objects: config.cleanup_orphaned_objects(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stages_are_ordered() {
        assert!(IngestStage::Received < IngestStage::Staged);
        assert!(IngestStage::Remuxed < IngestStage::Uploaded);
        assert!(IngestStage::Linked < IngestStage::Done);
        assert_eq!(IngestStage::Classified.to_string(), "classified");
    }
}
