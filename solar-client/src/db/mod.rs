use std::{str::FromStr, time::Duration};

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use time::{format_description::well_known::Rfc3339, OffsetDateTime, UtcOffset};

pub mod reading_queries;
pub mod schema;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),
    #[error("corrupt row: {0}")]
    CorruptRow(String),
}

fn file_options(path: &str) -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(5))
}

fn pool_options(max_connections: u32) -> SqlitePoolOptions {
    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(5))
}

/// Opens the reading store at `path`, creating it if needed.
///
/// The journal runs in WAL mode so queries can read while the collector
/// writes.
pub async fn connect(path: &str, max_connections: u32) -> Result<SqlitePool, StoreError> {
    let pool = pool_options(max_connections).connect_with(file_options(path)).await?;
    schema::ensure_schema(&pool).await?;
    Ok(pool)
}

/// Same store as [`connect`], but nothing is opened until the first query.
/// The caller applies [`schema::ensure_schema`] before its first write.
pub fn connect_lazy(path: &str, max_connections: u32) -> SqlitePool {
    pool_options(max_connections).connect_lazy_with(file_options(path))
}

/// Single-connection in-memory store with the schema applied. Every
/// connection to `:memory:` is its own database, so the pool never recycles
/// its one connection.
pub async fn connect_in_memory() -> Result<SqlitePool, StoreError> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    schema::ensure_schema(&pool).await?;
    Ok(pool)
}

/// Stored timestamp form: RFC 3339 in UTC with second precision, so that
/// lexical order in SQLite equals chronological order.
pub fn format_ts(ts: OffsetDateTime) -> String {
    let utc = ts.to_offset(UtcOffset::UTC);
    let utc = utc.replace_nanosecond(0).unwrap_or(utc);
    utc.format(&Rfc3339).unwrap_or_else(|_| utc.unix_timestamp().to_string())
}

pub fn parse_ts(raw: &str) -> Result<OffsetDateTime, StoreError> {
    OffsetDateTime::parse(raw.trim(), &Rfc3339)
        .map_err(|e| StoreError::CorruptRow(format!("invalid timestamp '{raw}': {e}")))
}
