//! Durable usage-ledger record and its write-behind store.

use sqlx::SqlitePool;
use tokio::sync::mpsc;

/// The persisted shape of the usage ledger. One row, id = 1.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct LedgerRecord {
    pub requests_numeric: i64,
    pub requests_reasoning: i64,
    pub total_requests: i64,
    pub total_cost: f64,
    pub success_rate: f64,
    pub limit_reached: bool,
    /// RFC 3339 timestamp of the start of the current monthly epoch.
    pub last_reset: String,
}

/// Read the persisted ledger record, if any.
pub async fn load(pool: &SqlitePool) -> Result<Option<LedgerRecord>, sqlx::Error> {
    sqlx::query_as::<_, LedgerRecord>(
        "SELECT requests_numeric, requests_reasoning, total_requests,
                total_cost, success_rate, limit_reached, last_reset
         FROM usage_ledger WHERE id = 1",
    )
    .fetch_optional(pool)
    .await
}

/// Overwrite the persisted ledger record.
pub async fn save(pool: &SqlitePool, record: &LedgerRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO usage_ledger (
            id, requests_numeric, requests_reasoning, total_requests,
            total_cost, success_rate, limit_reached, last_reset
        ) VALUES (1, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            requests_numeric = excluded.requests_numeric,
            requests_reasoning = excluded.requests_reasoning,
            total_requests = excluded.total_requests,
            total_cost = excluded.total_cost,
            success_rate = excluded.success_rate,
            limit_reached = excluded.limit_reached,
            last_reset = excluded.last_reset",
    )
    .bind(record.requests_numeric)
    .bind(record.requests_reasoning)
    .bind(record.total_requests)
    .bind(record.total_cost)
    .bind(record.success_rate)
    .bind(record.limit_reached)
    .bind(&record.last_reset)
    .execute(pool)
    .await?;
    Ok(())
}

/// Single-writer queue in front of the ledger table.
///
/// Records are enqueued while the in-memory ledger lock is held, so they
/// arrive in update order; the writer task applies them in that order. A
/// failed write is logged and dropped -- the in-memory ledger stays
/// authoritative until the next write lands.
#[derive(Clone)]
pub struct LedgerStore {
    tx: mpsc::UnboundedSender<LedgerRecord>,
}

impl LedgerStore {
    pub fn spawn(pool: SqlitePool) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<LedgerRecord>();
        tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                if let Err(e) = save(&pool, &record).await {
                    tracing::warn!(error = %e, "failed to persist usage ledger");
                }
            }
        });
        Self { tx }
    }

    pub fn enqueue(&self, record: LedgerRecord) {
        if self.tx.send(record).is_err() {
            tracing::warn!("ledger writer task is gone, dropping usage write");
        }
    }
}
