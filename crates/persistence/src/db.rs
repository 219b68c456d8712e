//! Database connection pool management.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::info;

/// Pool sizing and timeouts.
///
/// The connection URL is passed to [`create_pool`] separately so settings can
/// be logged without leaking credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
}

/// Pool options for the bridge.
///
/// Connections are pinged before being handed out.
pub fn pool_options(settings: &PoolSettings) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(settings.acquire_timeout)
        .idle_timeout(settings.idle_timeout)
        .test_before_acquire(true)
}

/// Connects a PostgreSQL pool and logs its bounds.
pub async fn create_pool(url: &str, settings: &PoolSettings) -> Result<PgPool, sqlx::Error> {
    let pool = pool_options(settings).connect(url).await?;

    info!(
        max_connections = settings.max_connections,
        min_connections = settings.min_connections,
        acquire_timeout_secs = settings.acquire_timeout.as_secs(),
        idle_timeout_secs = settings.idle_timeout.as_secs(),
        "Database pool ready"
    );

    Ok(pool)
}
