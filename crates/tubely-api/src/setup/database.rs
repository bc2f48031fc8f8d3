//! PostgreSQL pool and schema migrations

use anyhow::{Context, Result};
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tubely_core::Config;

const IDLE_TIMEOUT: Duration = Duration::from_secs(600);
const MAX_LIFETIME: Duration = Duration::from_secs(1800);

/// Embedded from the workspace `migrations/` directory at build time.
static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Open the pool and bring the `videos` schema up to date.
pub async fn setup_database(config: &Config) -> Result<PgPool> {
    tracing::info!(
        max_connections = config.db_max_connections(),
        acquire_timeout_secs = config.db_timeout_seconds(),
        "Connecting to database"
    );
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections())
        .acquire_timeout(Duration::from_secs(config.db_timeout_seconds()))
        .idle_timeout(IDLE_TIMEOUT)
        .max_lifetime(MAX_LIFETIME)
        .connect(config.database_url())
        .await
        .context("Failed to connect to database")?;

    MIGRATOR
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!(
        migrations = MIGRATOR.iter().count(),
        "Database ready, migrations applied"
    );

    Ok(pool)
}
