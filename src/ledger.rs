//! In-memory usage ledger with monthly rollover and durable backing.
//!
//! One `UsageLedger` exists per process. It is loaded from storage at
//! startup, mutated exactly once per terminal request outcome, and reset to
//! zero at the first touch of a new calendar month. The rollover check runs
//! under the same lock as every read and update, so a reset can never race
//! an in-flight increment.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::provider::Provider;
use crate::storage::{self, LedgerRecord, LedgerStore};

/// Request counts per provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderCounts {
    pub numeric: u64,
    pub reasoning: u64,
}

impl ProviderCounts {
    fn bump(&mut self, provider: Provider) {
        match provider {
            Provider::Numeric => self.numeric += 1,
            Provider::Reasoning => self.reasoning += 1,
        }
    }
}

/// A consistent read of the ledger, handed to the selection policy and the
/// usage endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerSnapshot {
    #[serde(rename = "requests_by_provider")]
    pub requests: ProviderCounts,
    pub total_requests: u64,
    pub total_cost: f64,
    pub success_rate: f64,
    pub limit_reached: bool,
    pub last_reset: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct LedgerState {
    requests: ProviderCounts,
    total_requests: u64,
    total_cost: f64,
    success_rate: f64,
    limit_reached: bool,
    last_reset: DateTime<Utc>,
}

impl LedgerState {
    fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            requests: ProviderCounts::default(),
            total_requests: 0,
            total_cost: 0.0,
            success_rate: 1.0,
            limit_reached: false,
            last_reset: now,
        }
    }

    fn to_record(&self) -> LedgerRecord {
        LedgerRecord {
            requests_numeric: self.requests.numeric as i64,
            requests_reasoning: self.requests.reasoning as i64,
            total_requests: self.total_requests as i64,
            total_cost: self.total_cost,
            success_rate: self.success_rate,
            limit_reached: self.limit_reached,
            last_reset: self.last_reset.to_rfc3339(),
        }
    }
}

/// Process-wide usage counters with a monthly epoch.
pub struct UsageLedger {
    ceiling: f64,
    inner: Mutex<LedgerState>,
    store: Option<LedgerStore>,
}

impl UsageLedger {
    /// A fresh ledger with no durable backing (first run, or tests).
    pub fn new(ceiling: f64) -> Self {
        Self {
            ceiling,
            inner: Mutex::new(LedgerState::fresh(Utc::now())),
            store: None,
        }
    }

    /// Rebuild a ledger from a persisted record, without durable backing.
    ///
    /// A record whose `last_reset` does not parse is treated as corrupt:
    /// the ledger starts over as a first run.
    pub fn from_record(record: LedgerRecord, ceiling: f64) -> Self {
        let state = match DateTime::parse_from_rfc3339(&record.last_reset) {
            Ok(last_reset) => LedgerState {
                requests: ProviderCounts {
                    numeric: record.requests_numeric.max(0) as u64,
                    reasoning: record.requests_reasoning.max(0) as u64,
                },
                total_requests: record.total_requests.max(0) as u64,
                total_cost: record.total_cost,
                success_rate: record.success_rate.clamp(0.0, 1.0),
                // Derived, never trusted from storage
                limit_reached: record.total_cost >= ceiling,
                last_reset: last_reset.with_timezone(&Utc),
            },
            Err(e) => {
                tracing::warn!(error = %e, "corrupt usage record, starting fresh");
                LedgerState::fresh(Utc::now())
            }
        };

        Self {
            ceiling,
            inner: Mutex::new(state),
            store: None,
        }
    }

    /// Load the ledger from the database and attach the write-behind store.
    ///
    /// A missing record means first run: all counters zero, `last_reset` now.
    pub async fn load(ceiling: f64, pool: SqlitePool) -> Result<Self, sqlx::Error> {
        let mut ledger = match storage::load_ledger(&pool).await? {
            Some(record) => Self::from_record(record, ceiling),
            None => Self::new(ceiling),
        };
        ledger.store = Some(LedgerStore::spawn(pool));
        Ok(ledger)
    }

    /// Lock the state, applying the monthly rollover first if one is due.
    fn locked(&self) -> MutexGuard<'_, LedgerState> {
        let mut state = self.inner.lock().unwrap();
        let now = Utc::now();
        if (state.last_reset.year(), state.last_reset.month()) != (now.year(), now.month()) {
            tracing::info!(
                previous_epoch = %state.last_reset,
                total_cost = state.total_cost,
                total_requests = state.total_requests,
                "monthly usage rollover"
            );
            *state = LedgerState::fresh(now);
            self.persist(&state);
        }
        state
    }

    /// Enqueue a durable write of the current state.
    ///
    /// Called while holding the state lock so writes reach the single-writer
    /// queue in the same order the updates were applied.
    fn persist(&self, state: &LedgerState) {
        if let Some(store) = &self.store {
            store.enqueue(state.to_record());
        }
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        let state = self.locked();
        LedgerSnapshot {
            requests: state.requests,
            total_requests: state.total_requests,
            total_cost: state.total_cost,
            success_rate: state.success_rate,
            limit_reached: state.limit_reached,
            last_reset: state.last_reset,
        }
    }

    /// Count a request served by `provider` at the given estimated cost.
    pub fn record_success(&self, provider: Provider, cost: f64) {
        let mut state = self.locked();
        let n = state.total_requests + 1;
        state.success_rate = (state.success_rate * (n - 1) as f64 + 1.0) / n as f64;
        state.requests.bump(provider);
        state.total_requests = n;
        state.total_cost += cost;
        if !state.limit_reached && state.total_cost >= self.ceiling {
            state.limit_reached = true;
            tracing::warn!(
                total_cost = state.total_cost,
                ceiling = self.ceiling,
                "monthly cost ceiling reached, routing to low-cost fallback"
            );
        }
        self.persist(&state);
    }

    /// Count a request on which both providers failed.
    ///
    /// No provider's count moves; only the success rate and the attempt
    /// total do.
    pub fn record_total_failure(&self) {
        let mut state = self.locked();
        let n = state.total_requests;
        state.success_rate = (state.success_rate * n as f64) / (n + 1) as f64;
        state.total_requests = n + 1;
        self.persist(&state);
    }
}
