use crate::config::Config;
use crate::error::AppResult;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

/// Build the process-wide connection pool.
///
/// sqlx has a single ceiling rather than a base+overflow pair, so the
/// configured ceiling is the sum of the two.
pub async fn connect(config: &Config) -> AppResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_pool_size + config.db_max_overflow)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&config.database_url)
        .await?;

    Ok(pool)
}

/// Cheap liveness probe used at boot and by the health endpoint.
pub async fn ping(pool: &PgPool) -> AppResult<()> {
    sqlx::query("SELECT 1").fetch_one(pool).await?;
    Ok(())
}
