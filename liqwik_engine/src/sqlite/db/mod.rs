//! # SQLite database methods
//!
//! This module contains the "low-level" SQLite database interactions.
//!
//! All these interactions are simple functions (rather than stateful structs) that accept a `&mut SqliteConnection`
//! argument. Callers can obtain a connection from a pool, or open a transaction when several statements must commit
//! together, and call through to the functions without any other changes.
//!
//! Timestamps are always bound from Rust, so that every comparison of "now" against a stored time happens in one
//! place with one clock.
use std::{env, str::FromStr, time::Duration};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Error as SqlxError,
    Sqlite,
    SqlitePool,
    Transaction,
};

pub mod assets;
pub mod bids;
pub mod job_locks;
pub mod notifications;
pub mod organizations;
pub mod payments;
pub mod users;

const SQLITE_DB_URL: &str = "sqlite://data/liqwik.db";
/// How long a writer waits for another writer's transaction to finish before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

pub fn db_url() -> String {
    let result = env::var("LQK_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ LQK_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

/// Opens a pool on `url`, creating the database file if it does not exist yet. Foreign keys are enforced.
pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let options =
        SqliteConnectOptions::from_str(url)?.create_if_missing(true).foreign_keys(true).busy_timeout(BUSY_TIMEOUT);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}

/// Opens a transaction that already holds the database write lock, like `BEGIN IMMEDIATE`.
///
/// A plain deferred transaction only asks for the write lock at its first write. If another writer commits between
/// the guard read and that write, SQLite fails the write with `SQLITE_BUSY` instead of waiting, because the reader's
/// snapshot is stale. Taking the lock up front makes racing writers queue behind each other (up to the busy timeout),
/// so each guard sees the committed result of the one before it.
pub async fn begin_write(pool: &SqlitePool) -> Result<Transaction<'static, Sqlite>, SqlxError> {
    let mut tx = pool.begin().await?;
    // An UPDATE takes the write lock even when it matches no rows
    sqlx::query("UPDATE job_locks SET holder = holder WHERE 0").execute(&mut *tx).await?;
    Ok(tx)
}

pub fn is_unique_violation(e: &SqlxError) -> bool {
    matches!(e, SqlxError::Database(db) if db.is_unique_violation())
}

pub fn is_foreign_key_violation(e: &SqlxError) -> bool {
    matches!(e, SqlxError::Database(db) if db.is_foreign_key_violation())
}
