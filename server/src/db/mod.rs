//! Database Layer
//!
//! `SQLite` connection pool, migrations and the binding store.
//!
//! The store is opened once at startup, owned by the services that need it,
//! and closed on shutdown. Nothing in the crate reaches it through globals.

mod models;
mod queries;
mod store;


use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
pub use models::*;
pub(crate) use queries::*;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
pub(crate) use store::BindingTx;
pub use store::Store;
use tracing::info;

/// Create `SQLite` connection pool for a database file.
pub(crate) async fn create_pool(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        // Writers queue behind an open binding transaction
        .busy_timeout(Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        // Prevent hanging requests on pool exhaustion
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options)
        .await?;

    info!("Connected to SQLite");
    Ok(pool)
}

/// Create a private in-memory database.
///
/// Every `SQLite` memory connection is its own database, so the pool is pinned
/// to a single connection that is never recycled.
pub(crate) async fn create_memory_pool() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

    let pool = SqlitePoolOptions::new()
        .min_connections(1)
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Run database migrations.
pub(crate) async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations completed");
    Ok(())
}
