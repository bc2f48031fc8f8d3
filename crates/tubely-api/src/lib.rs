//! Tubely API Library
//!
//! HTTP handlers, authentication, middleware and application setup for the
//! video upload service.

mod handlers;
mod middleware;
mod telemetry;

pub mod auth;
pub mod error;
pub mod setup;
pub mod state;

pub use error::{ErrorResponse, HttpAppError};
pub use setup::routes::build_router;
pub use state::AppState;
