//! Tubely Core Library
//!
//! This crate provides core domain models, error types and configuration
//! that are shared across all Tubely components.

pub mod config;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{BaseConfig, Config, MediaConfig, ServiceConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{Video, VideoResponse};
pub use storage_types::StorageBackend;
