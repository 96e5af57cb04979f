use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::errors::AppError;

/// Creates a PostgreSQL connection pool and applies pending migrations.
pub async fn create_pool(database_url: &str, acquire_timeout: Duration) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(acquire_timeout)
        .connect(database_url)
        .await?;

    info!("PostgreSQL connection pool established");

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied");

    Ok(pool)
}

/// Runs `fut` with an upper bound of `limit`; expiry becomes `AppError::Timeout`
/// naming the operation. The inner future is dropped on expiry. An open
/// transaction it held is rolled back, but a COMMIT already sent to the server
/// may still land, so a timed-out commit does not prove the write is absent.
/// Callers that compensate on failure must re-check (see the application store).
pub async fn with_timeout<T, F>(limit: Duration, operation: &str, fut: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Timeout(operation.to_string())),
    }
}
