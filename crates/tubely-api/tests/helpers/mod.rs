//! Test helpers: build the real router over in-memory collaborators.
//!
//! Run with `cargo test -p tubely-api`. No database, object store or ffmpeg
//! binaries are needed.

#![allow(dead_code)]

pub mod auth;

use axum_test::TestServer;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tubely_api::setup::services::build_state;
use tubely_core::{Config, Video};
use tubely_processing::testing::{
    sample_video, FakeMediaTools, InMemoryVideoRepository, MemoryStorage,
};
use uuid::Uuid;

/// Test application: server plus handles on every fake it was built with.
pub struct TestApp {
    pub server: TestServer,
    pub storage: Arc<MemoryStorage>,
    pub videos: Arc<InMemoryVideoRepository>,
    pub tools: Arc<FakeMediaTools>,
    pub temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Insert a fresh video record owned by `user_id`.
    pub fn seed_video(&self, user_id: Uuid) -> Video {
        let video = sample_video(user_id);
        self.videos.insert(video.clone());
        video
    }

    /// Files left behind in the staging directory.
    pub fn staged_files(&self) -> Vec<String> {
        list_dir(self.temp_dir.path())
    }
}

fn list_dir(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default()
}

/// Setup a test app whose media tools report a 1920x1080 stream.
pub fn setup_test_app() -> TestApp {
    setup_test_app_with(FakeMediaTools::with_geometry(1920, 1080), &[])
}

/// Setup a test app with scripted tools and extra configuration variables.
pub fn setup_test_app_with(tools: FakeMediaTools, extra_env: &[(&str, &str)]) -> TestApp {
    let temp_dir = TempDir::new().expect("create temp dir");
    let temp_path = temp_dir.path().to_string_lossy().into_owned();

    let mut vars: HashMap<String, String> = [
        ("JWT_SECRET", auth::TEST_JWT_SECRET),
        ("DATABASE_URL", "postgres://tubely@localhost/tubely"),
        ("S3_BUCKET", tubely_processing::testing::TEST_BUCKET),
        ("S3_REGION", tubely_processing::testing::TEST_REGION),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    vars.insert("UPLOAD_TEMP_DIR".to_string(), temp_path);
    for (k, v) in extra_env {
        vars.insert(k.to_string(), v.to_string());
    }
    let config = Config::from_lookup(|key| vars.get(key).cloned()).expect("valid test config");

    let storage = Arc::new(MemoryStorage::new());
    let videos = Arc::new(InMemoryVideoRepository::new());
    let tools = Arc::new(tools);

    let state = build_state(config, tools.clone(), storage.clone(), videos.clone());
    let router = tubely_api::build_router(state);
    let server = TestServer::new(router).expect("start test server");

    TestApp {
        server,
        storage,
        videos,
        tools,
        temp_dir,
    }
}
