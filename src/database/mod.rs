use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::ApiError;

pub mod memory;
pub mod postgres;
pub mod repository;
pub mod schema;
pub mod seed;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use repository::{LedgerStore, MeterStore, SessionStore, Store, UserStore};

pub type DatabasePool = Pool<Postgres>;

pub async fn setup_database(config: &Config) -> Result<DatabasePool> {
    info!("Connecting to database");

    if !config.database_url.contains("sslmode=require")
        && !config.database_url.contains("sslmode=verify-ca")
        && !config.database_url.contains("sslmode=verify-full")
    {
        warn!("Database connection does not enforce SSL. Consider adding sslmode=require to connection string");
    }

    // Server-side limits mirror the per-call deadline enforced by `with_timeout`
    let statement_timeout = format!("SET statement_timeout = '{}s'", config.db_timeout_secs);
    let lock_timeout = format!("SET lock_timeout = '{}s'", config.db_timeout_secs);

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(config.db_timeout_secs))
        .idle_timeout(Duration::from_secs(180))
        .max_lifetime(Duration::from_secs(900))
        .test_before_acquire(true)
        .after_connect(move |conn, _meta| {
            let statement_timeout = statement_timeout.clone();
            let lock_timeout = lock_timeout.clone();
            Box::pin(async move {
                sqlx::query("SET timezone = 'UTC'").execute(&mut *conn).await?;
                sqlx::query(&statement_timeout).execute(&mut *conn).await?;
                sqlx::query(&lock_timeout).execute(&mut *conn).await?;
                sqlx::query("SET idle_in_transaction_session_timeout = '10s'")
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await?;

    let start_time = std::time::Instant::now();
    sqlx::query("SELECT 1").execute(&pool).await?;
    info!(
        "✅ Database connection established in {:?} (max connections: {})",
        start_time.elapsed(),
        config.max_connections
    );

    Ok(pool)
}

pub async fn run_migrations(pool: &DatabasePool) -> Result<()> {
    info!("Running database migrations");

    sqlx::migrate!("./migrations").run(pool).await?;

    info!("Database migrations completed successfully");
    Ok(())
}

/// Bound a store call. Expiry surfaces as a persistence error; the call is
/// not retried.
pub async fn with_timeout<T, F>(limit: Duration, operation: &'static str, call: F) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, ApiError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            warn!(operation, timeout_ms = limit.as_millis() as u64, "Store call timed out");
            Err(ApiError::timeout(operation))
        }
    }
}
