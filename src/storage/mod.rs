//! SQLite persistence for the usage ledger and per-request history.

pub mod history;
pub mod ledger;

pub use history::{spawn_log_write, AggregateRow, RequestLog};
pub use ledger::{load as load_ledger, save as save_ledger, LedgerRecord, LedgerStore};

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Initialize the SQLite connection pool and create the schema.
///
/// The database file is created automatically if it doesn't exist.
/// WAL journal mode is used for concurrent read/write performance.
pub async fn init_pool(db_path: &str) -> Result<SqlitePool, sqlx::Error> {
    let opts = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path))?
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(opts)
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

async fn create_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS usage_ledger (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            requests_numeric INTEGER NOT NULL,
            requests_reasoning INTEGER NOT NULL,
            total_requests INTEGER NOT NULL,
            total_cost REAL NOT NULL,
            success_rate REAL NOT NULL,
            limit_reached INTEGER NOT NULL,
            last_reset TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS request_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            correlation_id TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            kind TEXT NOT NULL,
            priority TEXT NOT NULL,
            tenant TEXT,
            served_by TEXT,
            cost_estimate REAL,
            latency_ms INTEGER NOT NULL,
            success INTEGER NOT NULL,
            error_message TEXT
        )",
    )
    .execute(pool)
    .await?;

    Ok(())
}
