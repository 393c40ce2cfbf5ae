//! Request and response types for the routing API.

use serde::{Deserialize, Serialize};

use crate::provider::Provider;

/// What a feature is asking the AI layer to do.
///
/// The kind drives provider affinity; adding a kind forces every match in
/// the policy and pricing tables to be revisited at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Categorization,
    Forecasting,
    Analysis,
    Query,
    Reasoning,
}

impl RequestKind {
    pub const ALL: [RequestKind; 5] = [
        RequestKind::Categorization,
        RequestKind::Forecasting,
        RequestKind::Analysis,
        RequestKind::Query,
        RequestKind::Reasoning,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RequestKind::Categorization => "categorization",
            RequestKind::Forecasting => "forecasting",
            RequestKind::Analysis => "analysis",
            RequestKind::Query => "query",
            RequestKind::Reasoning => "reasoning",
        }
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-declared urgency; only consulted where the policy table says so.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

/// Tenant/session identifiers carried through for logging only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
}

/// One routing request. Immutable once submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRequest {
    pub kind: RequestKind,
    /// Opaque data for the provider; never interpreted by the router.
    pub payload: serde_json::Value,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<RequestContext>,
}

/// Who ended up serving a request.
///
/// `Hybrid` means the selected provider failed and the fallback answered;
/// the caller still got a result, so this is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServedBy {
    Numeric,
    Reasoning,
    Hybrid,
}

impl From<Provider> for ServedBy {
    fn from(provider: Provider) -> Self {
        match provider {
            Provider::Numeric => ServedBy::Numeric,
            Provider::Reasoning => ServedBy::Reasoning,
        }
    }
}

impl ServedBy {
    pub fn as_str(self) -> &'static str {
        match self {
            ServedBy::Numeric => "numeric",
            ServedBy::Reasoning => "reasoning",
            ServedBy::Hybrid => "hybrid",
        }
    }
}

impl std::fmt::Display for ServedBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The normalized answer returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteResponse {
    /// Opaque payload from whichever provider served the request.
    pub result: serde_json::Value,
    /// Provider-reported confidence, or an estimate when the provider gave none.
    pub confidence: f64,
    pub served_by: ServedBy,
    pub latency_ms: u64,
    pub cost_estimate: f64,
    /// Why the primary provider was skipped, on hybrid responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}
