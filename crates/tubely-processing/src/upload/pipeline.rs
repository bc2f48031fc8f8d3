//! Video ingestion: validate → stage → probe → classify → remux → upload → link.
//!
//! Temporary files are held as `TempPath` guards for their whole lifetime, so
//! every exit (error, panic, or the request future being dropped) removes them.
//! The video record is only touched after the upload has succeeded.

use std::sync::Arc;
use std::time::Instant;

use tempfile::TempPath;
use tokio::io::{AsyncRead, AsyncWriteExt};
use uuid::Uuid;

use tubely_core::models::Video;
use tubely_db::VideoRepository;
use tubely_storage::{generate_storage_key, Storage};

use super::error::IngestError;
use super::types::{IngestOutcome, IngestRequest, IngestStage, PipelineOptions};
use crate::validator::ContentTypeValidator;
use crate::video::{processing_path, MediaTools, Orientation};

const STAGING_PREFIX: &str = "tubely-upload-";
const VIDEO_EXTENSION: &str = "mp4";

pub struct VideoIngestPipeline {
    tools: Arc<dyn MediaTools>,
    storage: Arc<dyn Storage>,
    videos: Arc<dyn VideoRepository>,
    validator: ContentTypeValidator,
    options: PipelineOptions,
}

impl VideoIngestPipeline {
    pub fn new(
        tools: Arc<dyn MediaTools>,
        storage: Arc<dyn Storage>,
        videos: Arc<dyn VideoRepository>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            tools,
            storage,
            videos,
            validator: ContentTypeValidator::new(options.allowed_content_types.clone()),
            options,
        }
    }

    /// Run one ingestion to completion.
    #[tracing::instrument(skip_all, fields(video_id = %request.video_id, user_id = %request.user_id))]
    pub async fn ingest<R>(&self, request: IngestRequest<R>) -> Result<IngestOutcome, IngestError>
    where
        R: AsyncRead + Send,
    {
        let started = Instant::now();
        let video_id = request.video_id;
        let mut stage = IngestStage::Received;

        match self.run(request, &mut stage).await {
            Ok(outcome) => {
                tracing::info!(
                    video_id = %video_id,
                    orientation = %outcome.orientation,
                    key = %outcome.storage_key,
                    width = outcome.probe.width,
                    height = outcome.probe.height,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Video ingestion completed"
                );
                Ok(outcome)
            }
            Err(e) => {
                match &e {
                    IngestError::Validation(_)
                    | IngestError::VideoNotFound(_)
                    | IngestError::NotOwner { .. } => tracing::debug!(
                        video_id = %video_id,
                        stage = %stage,
                        error = %e,
                        "Video ingestion rejected"
                    ),
                    _ => tracing::error!(
                        video_id = %video_id,
                        stage = %stage,
                        error = %e,
                        duration_ms = started.elapsed().as_millis() as u64,
                        "Video ingestion failed"
                    ),
                }
                Err(e)
            }
        }
    }

    /// `stage` is the last step that completed; on error it names where the run stopped.
    async fn run<R>(
        &self,
        request: IngestRequest<R>,
        stage: &mut IngestStage,
    ) -> Result<IngestOutcome, IngestError>
    where
        R: AsyncRead + Send,
    {
        let IngestRequest {
            video_id,
            user_id,
            content_type,
            body,
        } = request;

        let content_type = self.validator.validate(&content_type)?;
        self.load_owned_video(video_id, user_id).await?;
        tracing::debug!(video_id = %video_id, content_type = %content_type, "Upload received");

        let staged = self.stage(body).await?;
        advance(stage, IngestStage::Staged, video_id);

        let probe = self.tools.probe(&staged).await?;
        advance(stage, IngestStage::Probed, video_id);

        let orientation = Orientation::classify(probe.width, probe.height);
        advance(stage, IngestStage::Classified, video_id);

        // Guard the output before the tool runs so a partial file is removed too.
        let processed =
            TempPath::try_from_path(processing_path(&staged)).map_err(IngestError::Staging)?;
        let remuxed = self.tools.remux(&staged).await?;
        let processed = if remuxed.as_path() == &*processed {
            processed
        } else {
            TempPath::try_from_path(remuxed).map_err(IngestError::Staging)?
        };
        discard(staged, "staged upload");
        advance(stage, IngestStage::Remuxed, video_id);

        let storage_key = generate_storage_key(orientation.folder(), VIDEO_EXTENSION)?;
        let file = tokio::fs::File::open(&*processed)
            .await
            .map_err(IngestError::Staging)?;
        let content_length = file.metadata().await.ok().map(|m| m.len());
        self.storage
            .upload_stream(&storage_key, &content_type, content_length, Box::pin(file))
            .await?;
        discard(processed, "remuxed upload");
        advance(stage, IngestStage::Uploaded, video_id);

        let url = self.storage.public_url(&storage_key);
        let video = self.link(video_id, user_id, &storage_key, &url).await?;
        advance(stage, IngestStage::Linked, video_id);

        *stage = IngestStage::Done;
        Ok(IngestOutcome {
            video,
            storage_key,
            url,
            orientation,
            probe,
        })
    }

    async fn load_owned_video(&self, video_id: Uuid, user_id: Uuid) -> Result<Video, IngestError> {
        let video = self
            .videos
            .get_video(video_id)
            .await
            .map_err(IngestError::Persistence)?
            .ok_or(IngestError::VideoNotFound(video_id))?;

        if !video.is_owned_by(user_id) {
            tracing::warn!(video_id = %video_id, user_id = %user_id, "Upload rejected: not the video owner");
            return Err(IngestError::NotOwner { video_id, user_id });
        }

        Ok(video)
    }

    /// Copy the request body into a fresh file under the staging directory.
    async fn stage<R>(&self, body: R) -> Result<TempPath, IngestError>
    where
        R: AsyncRead + Send,
    {
        let named = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .suffix(".mp4")
            .tempfile_in(&self.options.temp_dir)
            .map_err(IngestError::Staging)?;
        let (file, path) = named.into_parts();
        let mut file = tokio::fs::File::from_std(file);

        tokio::pin!(body);
        let bytes = tokio::io::copy(&mut body, &mut file)
            .await
            .map_err(IngestError::Staging)?;
        file.flush().await.map_err(IngestError::Staging)?;

        tracing::debug!(path = %path.display(), size_bytes = bytes, "Upload staged");
        Ok(path)
    }

    /// Point the record at the stored object, re-checking ownership first.
    async fn link(
        &self,
        video_id: Uuid,
        user_id: Uuid,
        storage_key: &str,
        url: &str,
    ) -> Result<Video, IngestError> {
        let result = async {
            let mut video = self.load_owned_video(video_id, user_id).await?;
            video.video_url = Some(url.to_string());
            self.videos
                .update_video(&video)
                .await
                .map_err(IngestError::Persistence)
        }
        .await;

        if result.is_err() && self.options.cleanup_orphaned_objects {
            remove_orphan(self.storage.as_ref(), storage_key).await;
        }

        result
    }
}

fn advance(stage: &mut IngestStage, next: IngestStage, video_id: Uuid) {
    *stage = next;
    tracing::debug!(video_id = %video_id, stage = %next, "Ingestion stage complete");
}

/// Remove a temporary file now rather than at drop, logging failures.
pub(crate) fn discard(path: TempPath, what: &str) {
    let shown = path.display().to_string();
    if let Err(e) = path.close() {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %shown, error = %e, "Failed to remove {}", what);
        }
    }
}

/// Best-effort delete of an object that no record points to.
pub(crate) async fn remove_orphan(storage: &dyn Storage, storage_key: &str) {
    match storage.delete(storage_key).await {
        Ok(()) => tracing::info!(key = %storage_key, "Removed orphaned object"),
        Err(e) => tracing::warn!(
            key = %storage_key,
            error = %e,
            "Failed to remove orphaned object"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_discard_ignores_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path =
            TempPath::try_from_path(dir.path().join("never-created.mp4.processing")).unwrap();
        discard(path, "remuxed upload");
    }

    #[test]
    fn test_discard_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("staged.mp4");
        std::fs::write(&file, b"bytes").unwrap();
        discard(TempPath::try_from_path(&file).unwrap(), "staged upload");
        assert!(!Path::new(&file).exists());
    }

    #[test]
    fn test_discard_survives_unremovable_path() {
        let dir = tempfile::tempdir().unwrap();
        let occupied = dir.path().join("staged.mp4");
        std::fs::create_dir(&occupied).unwrap();
        discard(TempPath::try_from_path(&occupied).unwrap(), "staged upload");
        assert!(occupied.is_dir());
    }
}
