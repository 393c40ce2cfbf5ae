//! Provider boundary: the invoker trait, failure taxonomy, and normalized results.
//!
//! Everything past this boundary is an opaque remote call. The rest of the
//! crate never sees provider-specific response shapes or transport errors;
//! they are normalized here into `RawResult` and `ProviderFailure`.

mod http;

pub use http::HttpInvoker;

use std::time::Duration;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::router::RouteRequest;

/// The two inference backends.
///
/// `Numeric` is strong at structured numeric extrapolation (forecasting,
/// bulk categorization); `Reasoning` at natural-language understanding and
/// multi-step reasoning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Numeric,
    Reasoning,
}

impl Provider {
    /// The other provider, used as the single fallback target.
    pub fn other(self) -> Self {
        match self {
            Provider::Numeric => Provider::Reasoning,
            Provider::Reasoning => Provider::Numeric,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Numeric => "numeric",
            Provider::Reasoning => "reasoning",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "numeric" => Ok(Provider::Numeric),
            "reasoning" => Ok(Provider::Reasoning),
            other => Err(format!(
                "unknown provider '{}', expected 'numeric' or 'reasoning'",
                other
            )),
        }
    }
}

/// Normalized outcome of one successful provider call.
#[derive(Debug, Clone)]
pub struct RawResult {
    /// Opaque answer payload, passed through to the caller uninterpreted.
    pub payload: serde_json::Value,
    /// Provider-reported confidence, if the response carried one.
    pub confidence: Option<f64>,
    /// Wall-clock latency of the remote call.
    pub latency_ms: u64,
}

/// A failed provider call.
///
/// Network errors, timeouts, upstream error statuses, and malformed bodies
/// all collapse here; the router treats every variant the same way (one
/// fallback attempt, then `AllProvidersFailed`).
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderFailure {
    #[error("provider '{provider}' unreachable: {detail}")]
    Unreachable { provider: Provider, detail: String },

    #[error("provider '{provider}' timed out after {timeout_ms}ms")]
    Timeout { provider: Provider, timeout_ms: u64 },

    #[error("provider '{provider}' returned status {status}: {detail}")]
    Upstream {
        provider: Provider,
        status: u16,
        detail: String,
    },

    #[error("provider '{provider}' returned a malformed response: {detail}")]
    Malformed { provider: Provider, detail: String },
}

impl ProviderFailure {
    pub fn provider(&self) -> Provider {
        match self {
            ProviderFailure::Unreachable { provider, .. }
            | ProviderFailure::Timeout { provider, .. }
            | ProviderFailure::Upstream { provider, .. }
            | ProviderFailure::Malformed { provider, .. } => *provider,
        }
    }
}

/// Performs the remote call to one provider.
///
/// Object-safe so orchestration can be exercised against scripted fakes.
/// Implementations must not touch any shared state; a failed call leaves
/// nothing behind.
pub trait ProviderInvoker: Send + Sync {
    fn invoke<'a>(
        &'a self,
        provider: Provider,
        request: &'a RouteRequest,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<RawResult, ProviderFailure>>;
}
