//! Per-request history: log entries and aggregate queries.

use sqlx::SqlitePool;

/// A completed request ready for history insertion.
///
/// All fields are owned types to satisfy the `tokio::spawn` `'static`
/// requirement.
pub struct RequestLog {
    pub correlation_id: String,
    pub timestamp: String,
    pub kind: String,
    pub priority: String,
    pub tenant: Option<String>,
    pub served_by: Option<String>,
    pub cost_estimate: Option<f64>,
    pub latency_ms: i64,
    pub success: bool,
    pub error_message: Option<String>,
}

impl RequestLog {
    /// Insert this entry into the history table.
    pub async fn insert(&self, pool: &SqlitePool) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO request_log (
                correlation_id, timestamp, kind, priority, tenant,
                served_by, cost_estimate, latency_ms, success, error_message
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&self.correlation_id)
        .bind(&self.timestamp)
        .bind(&self.kind)
        .bind(&self.priority)
        .bind(self.tenant.as_deref())
        .bind(self.served_by.as_deref())
        .bind(self.cost_estimate)
        .bind(self.latency_ms)
        .bind(self.success)
        .bind(self.error_message.as_deref())
        .execute(pool)
        .await?;
        Ok(())
    }
}

/// Spawn a fire-and-forget history write.
///
/// If the write fails, a warning is logged but the error is not propagated;
/// history is observability, not the request path.
pub fn spawn_log_write(pool: &SqlitePool, log: RequestLog) {
    let pool = pool.clone();
    tokio::spawn(async move {
        if let Err(e) = log.insert(&pool).await {
            tracing::warn!(
                correlation_id = %log.correlation_id,
                error = %e,
                "failed to write request history"
            );
        }
    });
}

/// Aggregate history for a time range.
#[derive(Debug, sqlx::FromRow)]
pub struct AggregateRow {
    pub total_requests: i64,
    pub success_count: i64,
    pub error_count: i64,
    pub hybrid_count: i64,
    pub total_cost_estimate: f64,
    pub avg_latency_ms: f64,
}

/// Query aggregate history between two RFC 3339 timestamps.
///
/// Uses `TOTAL()` for the nullable cost column (returns 0.0 instead of NULL)
/// and `COALESCE(AVG(), 0)` for latency to ensure non-null results.
pub async fn query_aggregate(
    pool: &SqlitePool,
    since: &str,
    until: &str,
) -> Result<AggregateRow, sqlx::Error> {
    sqlx::query_as::<_, AggregateRow>(
        "SELECT \
         COUNT(*) as total_requests, \
         COUNT(CASE WHEN success = 1 THEN 1 END) as success_count, \
         COUNT(CASE WHEN success = 0 THEN 1 END) as error_count, \
         COUNT(CASE WHEN served_by = 'hybrid' THEN 1 END) as hybrid_count, \
         TOTAL(cost_estimate) as total_cost_estimate, \
         COALESCE(AVG(latency_ms), 0) as avg_latency_ms \
         FROM request_log WHERE timestamp >= ? AND timestamp <= ?",
    )
    .bind(since)
    .bind(until)
    .fetch_one(pool)
    .await
}
