//! Database repositories for data access layer
//
// Video records
pub mod video;
//
pub use video::{PgVideoRepository, VideoRepository};
