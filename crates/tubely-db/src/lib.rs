//! Tubely database layer
//!
//! Repository traits and their PostgreSQL implementations.

pub mod db;

pub use db::{PgVideoRepository, VideoRepository};
