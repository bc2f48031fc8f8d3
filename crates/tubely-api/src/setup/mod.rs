//! Application setup and initialization
//!
//! Everything `main` needs to turn a validated [`Config`] into a running router.

pub mod database;
pub mod routes;
pub mod server;
pub mod services;
pub mod storage;

use crate::state::AppState;
use anyhow::{Context, Result};
use std::sync::Arc;
use tubely_core::Config;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    crate::telemetry::init_telemetry(config.log_json())
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    config
        .validate()
        .context("Configuration validation failed")?;
    tracing::info!(
        environment = %config.environment(),
        "Configuration loaded and validated successfully"
    );

    let pool = database::setup_database(&config).await?;
    let storage = storage::setup_storage(&config).await?;
    let state = services::initialize_services(config, pool, storage)?;

    let router = routes::build_router(state.clone());

    Ok((state, router))
}
