//! Request orchestration: select, invoke, fall over once, account.
//!
//! Each request walks a strictly linear path: policy selection against a
//! ledger snapshot, primary invocation, at most one fallback invocation,
//! then exactly one ledger update for the terminal outcome. The two
//! invocations are never concurrent and neither provider is ever retried.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::ledger::UsageLedger;
use crate::provider::{Provider, ProviderInvoker, RawResult};
use crate::router::{CostEstimator, RouteRequest, RouteResponse, SelectionPolicy, ServedBy};

/// Confidence reported to callers when the provider gave none.
const ESTIMATED_CONFIDENCE: f64 = 0.7;

/// The top-level router handed to the service layer.
///
/// Safe to share across concurrent callers; the ledger is the only mutable
/// state and it synchronizes internally.
pub struct RequestRouter {
    policy: SelectionPolicy,
    estimator: CostEstimator,
    invoker: Arc<dyn ProviderInvoker>,
    ledger: Arc<UsageLedger>,
    timeout: Duration,
}

impl RequestRouter {
    pub fn new(
        policy: SelectionPolicy,
        estimator: CostEstimator,
        invoker: Arc<dyn ProviderInvoker>,
        ledger: Arc<UsageLedger>,
        timeout: Duration,
    ) -> Self {
        Self {
            policy,
            estimator,
            invoker,
            ledger,
            timeout,
        }
    }

    /// Route one request and return the normalized response.
    ///
    /// Errors with `AllProvidersFailed` only when both providers failed;
    /// a fallback success is reported as a `hybrid` response, not an error.
    pub async fn submit(&self, request: &RouteRequest) -> Result<RouteResponse> {
        let snapshot = self.ledger.snapshot();
        let primary = self
            .policy
            .select(request.kind, request.priority, &snapshot);
        let fallback = primary.other();

        // Pricing gaps are fatal configuration errors; surface them before
        // any provider call or ledger write happens.
        let primary_cost = self.estimator.estimate(primary, request.kind)?;
        let fallback_cost = self.estimator.estimate(fallback, request.kind)?;

        tracing::debug!(
            kind = %request.kind,
            priority = ?request.priority,
            provider = %primary,
            cost_estimate = primary_cost,
            "selected provider"
        );

        let primary_err = match self.invoker.invoke(primary, request, self.timeout).await {
            Ok(raw) => {
                self.ledger.record_success(primary, primary_cost);
                return Ok(build_response(
                    raw,
                    ServedBy::from(primary),
                    primary_cost,
                    None,
                ));
            }
            Err(err) => err,
        };

        tracing::warn!(
            provider = %primary,
            error = %primary_err,
            "primary provider failed, invoking fallback"
        );

        match self.invoker.invoke(fallback, request, self.timeout).await {
            Ok(raw) => {
                self.ledger.record_success(fallback, fallback_cost);
                Ok(build_response(
                    raw,
                    ServedBy::Hybrid,
                    fallback_cost,
                    Some(primary_err.to_string()),
                ))
            }
            Err(fallback_err) => {
                self.ledger.record_total_failure();
                tracing::error!(
                    primary_error = %primary_err,
                    fallback_error = %fallback_err,
                    "both providers failed"
                );
                Err(Error::AllProvidersFailed {
                    primary: primary_err,
                    fallback: fallback_err,
                })
            }
        }
    }
}

fn build_response(
    raw: RawResult,
    served_by: ServedBy,
    cost_estimate: f64,
    fallback_reason: Option<String>,
) -> RouteResponse {
    RouteResponse {
        result: raw.payload,
        confidence: raw.confidence.unwrap_or(ESTIMATED_CONFIDENCE),
        served_by,
        latency_ms: raw.latency_ms,
        cost_estimate,
        fallback_reason,
    }
}
