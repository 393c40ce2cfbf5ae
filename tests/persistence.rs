//! Integration tests for the durable usage ledger.

use std::time::Duration;

use chrono::{Datelike, Months, Utc};

use finroute::ledger::UsageLedger;
use finroute::provider::Provider;
use finroute::storage::{self, LedgerRecord};

async fn temp_pool() -> (tempfile::NamedTempFile, sqlx::SqlitePool) {
    let file = tempfile::NamedTempFile::new().expect("create temp db file");
    let pool = storage::init_pool(file.path().to_str().unwrap())
        .await
        .expect("init pool");
    (file, pool)
}

fn sample_record(last_reset: String) -> LedgerRecord {
    LedgerRecord {
        requests_numeric: 12,
        requests_reasoning: 3,
        total_requests: 16,
        total_cost: 42.5,
        success_rate: 0.9375,
        limit_reached: false,
        last_reset,
    }
}

#[tokio::test]
async fn empty_database_has_no_ledger_record() {
    let (_file, pool) = temp_pool().await;
    assert!(storage::load_ledger(&pool).await.unwrap().is_none());
}

#[tokio::test]
async fn save_then_load_round_trips() {
    let (_file, pool) = temp_pool().await;
    let record = sample_record(Utc::now().to_rfc3339());

    storage::save_ledger(&pool, &record).await.unwrap();
    let loaded = storage::load_ledger(&pool).await.unwrap().unwrap();
    assert_eq!(loaded, record);

    // A second save overwrites the single row rather than adding another.
    let mut updated = record.clone();
    updated.total_requests = 17;
    updated.total_cost = 43.0;
    storage::save_ledger(&pool, &updated).await.unwrap();
    let loaded = storage::load_ledger(&pool).await.unwrap().unwrap();
    assert_eq!(loaded, updated);
}

#[tokio::test]
async fn load_restores_counters_from_a_current_month_record() {
    let (_file, pool) = temp_pool().await;
    storage::save_ledger(&pool, &sample_record(Utc::now().to_rfc3339()))
        .await
        .unwrap();

    let ledger = UsageLedger::load(250.0, pool).await.unwrap();
    let snapshot = ledger.snapshot();

    assert_eq!(snapshot.requests.numeric, 12);
    assert_eq!(snapshot.requests.reasoning, 3);
    assert_eq!(snapshot.total_requests, 16);
    assert!((snapshot.total_cost - 42.5).abs() < 1e-9);
    assert!(!snapshot.limit_reached);
}

#[tokio::test]
async fn load_rolls_over_a_prior_month_record() {
    let (_file, pool) = temp_pool().await;
    let last_month = Utc::now()
        .checked_sub_months(Months::new(1))
        .unwrap()
        .to_rfc3339();
    storage::save_ledger(&pool, &sample_record(last_month))
        .await
        .unwrap();

    let ledger = UsageLedger::load(250.0, pool).await.unwrap();
    let snapshot = ledger.snapshot();

    assert_eq!(snapshot.total_requests, 0);
    assert_eq!(snapshot.requests.numeric, 0);
    assert_eq!(snapshot.total_cost, 0.0);
    assert_eq!(snapshot.success_rate, 1.0);
    assert!(!snapshot.limit_reached);
    let now = Utc::now();
    assert_eq!(
        (snapshot.last_reset.year(), snapshot.last_reset.month()),
        (now.year(), now.month())
    );
}

#[tokio::test]
async fn limit_reached_is_rederived_from_the_ceiling() {
    let (_file, pool) = temp_pool().await;
    // The stored flag says false, but the cost is over this deployment's
    // (lower) ceiling. The flag in storage must lose.
    storage::save_ledger(&pool, &sample_record(Utc::now().to_rfc3339()))
        .await
        .unwrap();

    let ledger = UsageLedger::load(40.0, pool).await.unwrap();
    assert!(ledger.snapshot().limit_reached);
}

#[tokio::test]
async fn corrupt_last_reset_starts_the_ledger_fresh() {
    let (_file, pool) = temp_pool().await;
    storage::save_ledger(&pool, &sample_record("not-a-timestamp".to_string()))
        .await
        .unwrap();

    let ledger = UsageLedger::load(250.0, pool).await.unwrap();
    let snapshot = ledger.snapshot();
    assert_eq!(snapshot.total_requests, 0);
    assert_eq!(snapshot.total_cost, 0.0);
}

#[tokio::test]
async fn updates_reach_the_database_behind_the_lock() {
    let (_file, pool) = temp_pool().await;
    let ledger = UsageLedger::load(250.0, pool.clone()).await.unwrap();

    ledger.record_success(Provider::Numeric, 0.096);
    ledger.record_success(Provider::Reasoning, 0.75);
    ledger.record_total_failure();

    // The write-behind queue is asynchronous; poll until the last update
    // lands or the deadline passes.
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    loop {
        if let Some(record) = storage::load_ledger(&pool).await.unwrap() {
            if record.total_requests == 3 {
                assert_eq!(record.requests_numeric, 1);
                assert_eq!(record.requests_reasoning, 1);
                assert!((record.total_cost - 0.846).abs() < 1e-9);
                assert!(record.success_rate < 1.0);
                assert!(!record.limit_reached);
                break;
            }
        }
        assert!(
            std::time::Instant::now() < deadline,
            "ledger write did not land within 2s"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
