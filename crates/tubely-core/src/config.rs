//! Configuration module
//!
//! Configuration is read once at process start from the environment (and an
//! optional `.env` file), validated, and then passed explicitly to every
//! component that needs it.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::storage_types::StorageBackend;

// Common constants
const SERVER_PORT: u16 = 8091;
const MAX_CONNECTIONS: u32 = 10;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const MAX_VIDEO_SIZE_MB: usize = 1024;
const MAX_THUMBNAIL_SIZE_MB: usize = 10;
const MEDIA_TOOL_TIMEOUT_SECS: u64 = 600;
const S3_MAX_RETRIES: usize = 3;
const MIN_JWT_SECRET_LEN: usize = 32;

/// Server, database and authentication settings
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub environment: String,
    pub jwt_secret: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    /// JSON log lines instead of the compact console format
    pub log_json: bool,
}

/// Storage and media processing settings
#[derive(Clone, Debug)]
pub struct MediaConfig {
    pub storage_backend: Option<StorageBackend>,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, etc.)
    pub aws_region: Option<String>,
    pub s3_max_retries: usize,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    /// 0 disables the timeout
    pub media_tool_timeout_secs: u64,
    pub max_video_size_bytes: usize,
    pub video_allowed_content_types: Vec<String>,
    pub max_thumbnail_size_bytes: usize,
    pub thumbnail_allowed_content_types: Vec<String>,
    pub upload_temp_dir: Option<PathBuf>,
    pub cleanup_orphaned_objects: bool,
}

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub base: BaseConfig,
    pub media: MediaConfig,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<ServiceConfig>);

impl Config {
    /// Load from the process environment, reading `.env` first if present.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. `from_env` is this over `std::env`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = ServiceConfig::from_lookup(lookup)?;
        config.validate()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.0.validate()
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        is_production(&self.0.base.environment)
    }

    pub fn server_port(&self) -> u16 {
        self.0.base.server_port
    }

    pub fn environment(&self) -> &str {
        &self.0.base.environment
    }

    pub fn jwt_secret(&self) -> &str {
        &self.0.base.jwt_secret
    }

    pub fn database_url(&self) -> &str {
        &self.0.base.database_url
    }

    pub fn db_max_connections(&self) -> u32 {
        self.0.base.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.0.base.db_timeout_seconds
    }

    pub fn log_json(&self) -> bool {
        self.0.base.log_json
    }

    pub fn storage_backend(&self) -> Option<StorageBackend> {
        self.0.media.storage_backend
    }

    pub fn s3_bucket(&self) -> Option<&str> {
        self.0.media.s3_bucket.as_deref()
    }

    pub fn s3_region(&self) -> Option<&str> {
        self.0.media.s3_region.as_deref()
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.0.media.s3_endpoint.as_deref()
    }

    pub fn aws_region(&self) -> Option<&str> {
        self.0.media.aws_region.as_deref()
    }

    pub fn s3_max_retries(&self) -> usize {
        self.0.media.s3_max_retries
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.0.media.local_storage_path.as_deref()
    }

    pub fn local_storage_base_url(&self) -> Option<&str> {
        self.0.media.local_storage_base_url.as_deref()
    }

    pub fn ffmpeg_path(&self) -> &str {
        &self.0.media.ffmpeg_path
    }

    pub fn ffprobe_path(&self) -> &str {
        &self.0.media.ffprobe_path
    }

    pub fn media_tool_timeout(&self) -> Option<Duration> {
        match self.0.media.media_tool_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn max_video_size_bytes(&self) -> usize {
        self.0.media.max_video_size_bytes
    }

    pub fn video_allowed_content_types(&self) -> &[String] {
        &self.0.media.video_allowed_content_types
    }

    pub fn max_thumbnail_size_bytes(&self) -> usize {
        self.0.media.max_thumbnail_size_bytes
    }

    pub fn thumbnail_allowed_content_types(&self) -> &[String] {
        &self.0.media.thumbnail_allowed_content_types
    }

    pub fn upload_temp_dir(&self) -> PathBuf {
        self.0
            .media
            .upload_temp_dir
            .clone()
            .unwrap_or_else(env::temp_dir)
    }

    pub fn cleanup_orphaned_objects(&self) -> bool {
        self.0.media.cleanup_orphaned_objects
    }
}

fn is_production(environment: &str) -> bool {
    let env = environment.to_lowercase();
    env == "production" || env == "prod"
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_bool(value: Option<String>, default: bool) -> bool {
    value
        .map(|v| v.trim().to_lowercase())
        .and_then(|v| match v.as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

impl ServiceConfig {
    fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|s| !s.trim().is_empty());

        let environment = non_empty("ENVIRONMENT")
            .or_else(|| non_empty("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let base = BaseConfig {
            server_port: match non_empty("PORT") {
                Some(port) => port
                    .parse()
                    .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
                None => SERVER_PORT,
            },
            environment,
            jwt_secret: non_empty("JWT_SECRET")
                .ok_or_else(|| anyhow::anyhow!("JWT_SECRET must be set for authentication"))?,
            database_url: non_empty("DATABASE_URL")
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))?,
            db_max_connections: non_empty("DB_MAX_CONNECTIONS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: non_empty("DB_TIMEOUT_SECONDS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            log_json: non_empty("LOG_FORMAT")
                .map(|f| f.trim().eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        };

        let storage_backend = non_empty("STORAGE_BACKEND")
            .map(|s| s.parse::<StorageBackend>())
            .transpose()?;

        let max_video_size_mb = non_empty("MAX_VIDEO_SIZE_MB")
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(MAX_VIDEO_SIZE_MB);

        let max_thumbnail_size_mb = non_empty("MAX_THUMBNAIL_SIZE_MB")
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(MAX_THUMBNAIL_SIZE_MB);

        let media = MediaConfig {
            storage_backend,
            s3_bucket: non_empty("S3_BUCKET"),
            s3_region: non_empty("S3_REGION"),
            s3_endpoint: non_empty("S3_ENDPOINT"),
            aws_region: non_empty("AWS_REGION"),
            s3_max_retries: non_empty("S3_MAX_RETRIES")
                .and_then(|s| s.parse().ok())
                .unwrap_or(S3_MAX_RETRIES),
            local_storage_path: non_empty("LOCAL_STORAGE_PATH"),
            local_storage_base_url: non_empty("LOCAL_STORAGE_BASE_URL"),
            ffmpeg_path: non_empty("FFMPEG_PATH").unwrap_or_else(|| "ffmpeg".to_string()),
            ffprobe_path: non_empty("FFPROBE_PATH").unwrap_or_else(|| "ffprobe".to_string()),
            media_tool_timeout_secs: non_empty("MEDIA_TOOL_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(MEDIA_TOOL_TIMEOUT_SECS),
            max_video_size_bytes: max_video_size_mb * 1024 * 1024,
            video_allowed_content_types: parse_list(
                &non_empty("VIDEO_ALLOWED_CONTENT_TYPES").unwrap_or_else(|| "video/mp4".into()),
            ),
            max_thumbnail_size_bytes: max_thumbnail_size_mb * 1024 * 1024,
            thumbnail_allowed_content_types: parse_list(
                &non_empty("THUMBNAIL_ALLOWED_CONTENT_TYPES")
                    .unwrap_or_else(|| "image/jpeg,image/png".into()),
            ),
            upload_temp_dir: non_empty("UPLOAD_TEMP_DIR").map(PathBuf::from),
            cleanup_orphaned_objects: parse_bool(lookup("CLEANUP_ORPHANED_OBJECTS"), true),
        };

        Ok(ServiceConfig { base, media })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.base.jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(anyhow::anyhow!(
                "JWT_SECRET must be at least {} characters long",
                MIN_JWT_SECRET_LEN
            ));
        }

        if !self.base.database_url.starts_with("postgresql://")
            && !self.base.database_url.starts_with("postgres://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if self.media.video_allowed_content_types.is_empty() {
            return Err(anyhow::anyhow!(
                "VIDEO_ALLOWED_CONTENT_TYPES must contain at least one type"
            ));
        }

        // Validate storage backend configuration
        match self.media.storage_backend.unwrap_or(StorageBackend::S3) {
            StorageBackend::S3 => {
                if self.media.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.media.s3_region.is_none() && self.media.aws_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.media.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
                if self.media.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_BASE_URL must be set when using local storage backend"
                    ));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, anyhow::Error> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    fn minimal_s3() -> Vec<(&'static str, &'static str)> {
        vec![
            ("JWT_SECRET", SECRET),
            ("DATABASE_URL", "postgres://tubely@localhost/tubely"),
            ("S3_BUCKET", "tubely-media"),
            ("S3_REGION", "us-east-2"),
        ]
    }

    #[test]
    fn defaults_are_applied() {
        let config = config_from(&minimal_s3()).unwrap();
        assert_eq!(config.server_port(), SERVER_PORT);
        assert_eq!(config.ffprobe_path(), "ffprobe");
        assert_eq!(config.ffmpeg_path(), "ffmpeg");
        assert_eq!(config.video_allowed_content_types(), ["video/mp4"]);
        assert_eq!(
            config.thumbnail_allowed_content_types(),
            ["image/jpeg", "image/png"]
        );
        assert_eq!(config.max_video_size_bytes(), 1024 * 1024 * 1024);
        assert_eq!(
            config.media_tool_timeout(),
            Some(Duration::from_secs(MEDIA_TOOL_TIMEOUT_SECS))
        );
        assert!(config.cleanup_orphaned_objects());
        assert!(!config.is_production());
        assert!(!config.log_json());
    }

    #[test]
    fn log_format_json_is_recognized() {
        let mut vars = minimal_s3();
        vars.push(("LOG_FORMAT", "JSON"));
        assert!(config_from(&vars).unwrap().log_json());
    }

    #[test]
    fn zero_timeout_disables_tool_timeout() {
        let mut vars = minimal_s3();
        vars.push(("MEDIA_TOOL_TIMEOUT_SECS", "0"));
        let config = config_from(&vars).unwrap();
        assert_eq!(config.media_tool_timeout(), None);
    }

    #[test]
    fn missing_jwt_secret_is_rejected() {
        let vars: Vec<_> = minimal_s3()
            .into_iter()
            .filter(|(k, _)| *k != "JWT_SECRET")
            .collect();
        assert!(config_from(&vars).is_err());
    }

    #[test]
    fn short_jwt_secret_is_rejected() {
        let mut vars = minimal_s3();
        vars[0] = ("JWT_SECRET", "short");
        let err = config_from(&vars).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn s3_backend_requires_bucket() {
        let vars: Vec<_> = minimal_s3()
            .into_iter()
            .filter(|(k, _)| *k != "S3_BUCKET")
            .collect();
        let err = config_from(&vars).unwrap_err();
        assert!(err.to_string().contains("S3_BUCKET"));
    }

    #[test]
    fn aws_region_is_accepted_in_place_of_s3_region() {
        let mut vars: Vec<_> = minimal_s3()
            .into_iter()
            .filter(|(k, _)| *k != "S3_REGION")
            .collect();
        vars.push(("AWS_REGION", "eu-west-1"));
        let config = config_from(&vars).unwrap();
        assert_eq!(config.aws_region(), Some("eu-west-1"));
    }

    #[test]
    fn local_backend_requires_path_and_url() {
        let vars = vec![
            ("JWT_SECRET", SECRET),
            ("DATABASE_URL", "postgresql://localhost/tubely"),
            ("STORAGE_BACKEND", "local"),
            ("LOCAL_STORAGE_PATH", "/tmp/tubely"),
        ];
        assert!(config_from(&vars).is_err());

        let mut vars = vars;
        vars.push(("LOCAL_STORAGE_BASE_URL", "http://localhost:8091/assets"));
        let config = config_from(&vars).unwrap();
        assert_eq!(config.storage_backend(), Some(StorageBackend::Local));
    }

    #[test]
    fn content_type_lists_are_normalized() {
        let mut vars = minimal_s3();
        vars.push(("VIDEO_ALLOWED_CONTENT_TYPES", " Video/MP4, video/quicktime ,"));
        let config = config_from(&vars).unwrap();
        assert_eq!(
            config.video_allowed_content_types(),
            ["video/mp4", "video/quicktime"]
        );
    }

    #[test]
    fn cleanup_flag_parses_false() {
        let mut vars = minimal_s3();
        vars.push(("CLEANUP_ORPHANED_OBJECTS", "false"));
        let config = config_from(&vars).unwrap();
        assert!(!config.cleanup_orphaned_objects());
    }

    #[test]
    fn production_detection() {
        let mut vars = minimal_s3();
        vars.push(("ENVIRONMENT", "Production"));
        let config = config_from(&vars).unwrap();
        assert!(config.is_production());
    }
}
