//! In-memory collaborators for exercising the ingestion paths without
//! PostgreSQL, S3 or the ffmpeg binaries.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::AsyncReadExt;
use uuid::Uuid;

use tubely_core::models::Video;
use tubely_core::AppError;
use tubely_db::VideoRepository;
use tubely_storage::{ByteReader, Storage, StorageBackend, StorageError, StorageResult};

use crate::video::{processing_path, MediaToolError, MediaTools, ProbeResult};

pub const TEST_BUCKET: &str = "tubely-test";
pub const TEST_REGION: &str = "us-east-2";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A video record owned by `user_id` with no media attached yet.
pub fn sample_video(user_id: Uuid) -> Video {
    let now = Utc::now();
    Video {
        id: Uuid::new_v4(),
        user_id,
        title: "Boot camp day one".to_string(),
        description: Some("First day footage".to_string()),
        thumbnail_url: None,
        video_url: None,
        created_at: now,
        updated_at: now,
    }
}

/// Video repository backed by a `HashMap`.
#[derive(Default)]
pub struct InMemoryVideoRepository {
    videos: Mutex<HashMap<Uuid, Video>>,
    fail_updates: AtomicBool,
    update_calls: AtomicUsize,
}

impl InMemoryVideoRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, video: Video) {
        lock(&self.videos).insert(video.id, video);
    }

    pub fn get(&self, id: Uuid) -> Option<Video> {
        lock(&self.videos).get(&id).cloned()
    }

    /// Make every subsequent `update_video` fail with a database error.
    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VideoRepository for InMemoryVideoRepository {
    async fn get_video(&self, id: Uuid) -> Result<Option<Video>, AppError> {
        Ok(self.get(id))
    }

    async fn update_video(&self, video: &Video) -> Result<Video, AppError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(AppError::Internal("injected update failure".to_string()));
        }

        let mut videos = lock(&self.videos);
        let stored = videos
            .get_mut(&video.id)
            .ok_or_else(|| AppError::NotFound(format!("Video {} not found", video.id)))?;
        let mut updated = video.clone();
        updated.updated_at = Utc::now();
        *stored = updated.clone();
        Ok(updated)
    }
}

#[derive(Clone)]
struct StoredObject {
    data: Vec<u8>,
    content_type: String,
}

/// Object store that keeps everything in memory and counts calls.
#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<HashMap<String, StoredObject>>,
    fail_uploads: AtomicBool,
    upload_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent upload fail after consuming part of the stream.
    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = lock(&self.objects).keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        lock(&self.objects).get(key).map(|o| o.data.clone())
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        lock(&self.objects).get(key).map(|o| o.content_type.clone())
    }

    fn put(&self, key: &str, data: Vec<u8>, content_type: &str) {
        lock(&self.objects).insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn upload_stream(
        &self,
        storage_key: &str,
        content_type: &str,
        _content_length: Option<u64>,
        mut reader: ByteReader,
    ) -> StorageResult<String> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        tubely_storage::validate_storage_key(storage_key)?;

        if self.fail_uploads.load(Ordering::SeqCst) {
            let mut first_chunk = [0u8; 16];
            let _ = reader.read(&mut first_chunk).await;
            return Err(StorageError::UploadFailed(
                "injected upload failure".to_string(),
            ));
        }

        let mut data = Vec::new();
        reader.read_to_end(&mut data).await?;
        self.put(storage_key, data, content_type);
        Ok(self.public_url(storage_key))
    }

    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<String> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        tubely_storage::validate_storage_key(storage_key)?;

        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(StorageError::UploadFailed(
                "injected upload failure".to_string(),
            ));
        }

        self.put(storage_key, data, content_type);
        Ok(self.public_url(storage_key))
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.objects).remove(storage_key);
        Ok(())
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        Ok(lock(&self.objects).contains_key(storage_key))
    }

    fn public_url(&self, storage_key: &str) -> String {
        format!(
            "https://{}.s3.{}.amazonaws.com/{}",
            TEST_BUCKET, TEST_REGION, storage_key
        )
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}

/// Scripted ffprobe behaviour.
#[derive(Debug, Clone, Copy)]
pub enum FakeProbe {
    Geometry { width: u32, height: u32 },
    /// Tool exits non-zero
    Fail,
    /// Tool prints something that is not JSON
    Malformed,
    /// Tool reports an empty stream list
    Empty,
}

/// Scripted ffmpeg behaviour.
#[derive(Debug, Clone, Copy)]
pub enum FakeRemux {
    /// Copies the input to the processing path
    Succeed,
    /// Writes half an output file, then fails
    Fail,
}

/// `MediaTools` that touch the filesystem like the real tools but never spawn a process.
pub struct FakeMediaTools {
    probe: FakeProbe,
    remux: FakeRemux,
    probe_calls: AtomicUsize,
    remux_calls: AtomicUsize,
    seen_paths: Mutex<Vec<PathBuf>>,
}

impl FakeMediaTools {
    pub fn new(probe: FakeProbe, remux: FakeRemux) -> Self {
        Self {
            probe,
            remux,
            probe_calls: AtomicUsize::new(0),
            remux_calls: AtomicUsize::new(0),
            seen_paths: Mutex::new(Vec::new()),
        }
    }

    /// Probe reports `width`x`height` and remux succeeds.
    pub fn with_geometry(width: u32, height: u32) -> Self {
        Self::new(FakeProbe::Geometry { width, height }, FakeRemux::Succeed)
    }

    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    pub fn remux_calls(&self) -> usize {
        self.remux_calls.load(Ordering::SeqCst)
    }

    /// Every file path the tools were handed or produced, in order.
    pub fn seen_paths(&self) -> Vec<PathBuf> {
        lock(&self.seen_paths).clone()
    }

    fn record(&self, path: &Path) {
        lock(&self.seen_paths).push(path.to_path_buf());
    }
}

#[async_trait]
impl MediaTools for FakeMediaTools {
    async fn probe(&self, path: &Path) -> Result<ProbeResult, MediaToolError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        self.record(path);

        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(MediaToolError::ProbeExecution(format!(
                "{}: No such file or directory",
                path.display()
            )));
        }

        match self.probe {
            FakeProbe::Geometry { width, height } => Ok(ProbeResult { width, height }),
            FakeProbe::Fail => Err(MediaToolError::ProbeExecution(
                "exit status: 1: Invalid data found when processing input".to_string(),
            )),
            FakeProbe::Malformed => crate::video::parse_probe_output(b"<html>"),
            FakeProbe::Empty => crate::video::parse_probe_output(br#"{"streams":[]}"#),
        }
    }

    async fn remux(&self, input: &Path) -> Result<PathBuf, MediaToolError> {
        self.remux_calls.fetch_add(1, Ordering::SeqCst);
        let output = processing_path(input);
        self.record(input);
        self.record(&output);

        let data = tokio::fs::read(input)
            .await
            .map_err(|e| MediaToolError::Remux(e.to_string()))?;

        match self.remux {
            FakeRemux::Succeed => {
                tokio::fs::write(&output, &data)
                    .await
                    .map_err(|e| MediaToolError::Remux(e.to_string()))?;
                Ok(output)
            }
            FakeRemux::Fail => {
                let half = &data[..data.len() / 2];
                tokio::fs::write(&output, half)
                    .await
                    .map_err(|e| MediaToolError::Remux(e.to_string()))?;
                Err(MediaToolError::Remux(
                    "exit status: 1: moov atom not found".to_string(),
                ))
            }
        }
    }
}
