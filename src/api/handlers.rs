//! HTTP request handlers.

use axum::{
    extract::{Extension, Query, State},
    http::{HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use super::server::{AppState, RequestId};
use crate::error::Error;
use crate::provider::Provider;
use crate::router::{model_variant, RequestKind, RouteRequest, ServedBy};
use crate::storage::{self, RequestLog};

/// Response header: correlation ID (UUID v4).
pub const REQUEST_ID_HEADER: &str = "x-finroute-request-id";
/// Response header: who served the request (numeric | reasoning | hybrid).
pub const SERVED_BY_HEADER: &str = "x-finroute-served-by";
/// Response header: wall-clock latency in milliseconds.
pub const LATENCY_MS_HEADER: &str = "x-finroute-latency-ms";

/// Attach finroute metadata headers to a response.
fn attach_headers(
    response: &mut Response,
    request_id: &str,
    latency_ms: i64,
    served_by: Option<ServedBy>,
) {
    let headers = response.headers_mut();

    if let Ok(value) = HeaderValue::from_str(request_id) {
        headers.insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    headers.insert(
        HeaderName::from_static(LATENCY_MS_HEADER),
        HeaderValue::from(latency_ms.max(0) as u64),
    );
    if let Some(served_by) = served_by {
        headers.insert(
            HeaderName::from_static(SERVED_BY_HEADER),
            HeaderValue::from_static(served_by.as_str()),
        );
    }
}

/// Handle POST /v1/route -- submit one AI request.
pub async fn route_request(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<RouteRequest>,
) -> Result<Response, Error> {
    let start = std::time::Instant::now();
    let correlation_id = request_id.0.to_string();

    tracing::info!(
        kind = %request.kind,
        priority = ?request.priority,
        tenant = ?request.context.as_ref().and_then(|c| c.tenant.as_deref()),
        "received route request"
    );

    let result = state.router.submit(&request).await;
    let latency_ms = start.elapsed().as_millis() as i64;

    if state.config.logging.log_requests {
        if let Some(pool) = &state.db {
            let entry = match &result {
                Ok(response) => RequestLog {
                    correlation_id: correlation_id.clone(),
                    timestamp: Utc::now().to_rfc3339(),
                    kind: request.kind.as_str().to_string(),
                    priority: request.priority.as_str().to_string(),
                    tenant: request.context.as_ref().and_then(|c| c.tenant.clone()),
                    served_by: Some(response.served_by.as_str().to_string()),
                    cost_estimate: Some(response.cost_estimate),
                    latency_ms,
                    success: true,
                    error_message: response.fallback_reason.clone(),
                },
                Err(error) => RequestLog {
                    correlation_id: correlation_id.clone(),
                    timestamp: Utc::now().to_rfc3339(),
                    kind: request.kind.as_str().to_string(),
                    priority: request.priority.as_str().to_string(),
                    tenant: request.context.as_ref().and_then(|c| c.tenant.clone()),
                    served_by: None,
                    cost_estimate: None,
                    latency_ms,
                    success: false,
                    error_message: Some(error.to_string()),
                },
            };
            storage::spawn_log_write(pool, entry);
        }
    }

    match result {
        Ok(route_response) => {
            let served_by = route_response.served_by;
            let mut response = Json(route_response).into_response();
            attach_headers(&mut response, &correlation_id, latency_ms, Some(served_by));
            Ok(response)
        }
        Err(error) => {
            let mut response = error.into_response();
            attach_headers(&mut response, &correlation_id, latency_ms, None);
            Ok(response)
        }
    }
}

/// Handle GET /v1/usage -- the current ledger snapshot.
pub async fn usage(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.ledger.snapshot())
}

/// Query parameters for GET /v1/usage/history.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub range: Option<String>,
    pub since: Option<String>,
    pub until: Option<String>,
}

/// Preset time range options.
#[derive(Debug, Clone, Copy)]
pub enum RangePreset {
    Last1h,
    Last24h,
    Last7d,
    Last30d,
}

impl RangePreset {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "last_1h" => Some(Self::Last1h),
            "last_24h" => Some(Self::Last24h),
            "last_7d" => Some(Self::Last7d),
            "last_30d" => Some(Self::Last30d),
            _ => None,
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            Self::Last1h => Duration::hours(1),
            Self::Last24h => Duration::hours(24),
            Self::Last7d => Duration::days(7),
            Self::Last30d => Duration::days(30),
        }
    }
}

/// Resolve the time range from query parameters.
///
/// Explicit `since`/`until` win over a `range` preset; the default window
/// is the last 7 days.
fn resolve_time_range(
    range: Option<&str>,
    since: Option<&str>,
    until: Option<&str>,
) -> Result<(DateTime<Utc>, DateTime<Utc>), Error> {
    let now = Utc::now();

    let since_dt = if let Some(s) = since {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| Error::BadRequest(format!("Invalid 'since' timestamp: {}", e)))?
    } else if let Some(r) = range {
        let preset = RangePreset::parse(r).ok_or_else(|| {
            Error::BadRequest(format!(
                "Invalid range '{}'. Supported: last_1h, last_24h, last_7d, last_30d",
                r
            ))
        })?;
        now - preset.duration()
    } else {
        now - RangePreset::Last7d.duration()
    };

    let until_dt = if let Some(u) = until {
        DateTime::parse_from_rfc3339(u)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| Error::BadRequest(format!("Invalid 'until' timestamp: {}", e)))?
    } else {
        now
    };

    Ok((since_dt, until_dt))
}

/// Handle GET /v1/usage/history -- aggregate request history.
pub async fn usage_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryQuery>,
) -> Result<impl IntoResponse, Error> {
    let pool = state
        .db
        .as_ref()
        .ok_or_else(|| Error::Internal("Database not available".to_string()))?;

    let (since_dt, until_dt) = resolve_time_range(
        params.range.as_deref(),
        params.since.as_deref(),
        params.until.as_deref(),
    )?;
    let since = since_dt.to_rfc3339();
    let until = until_dt.to_rfc3339();

    let row = storage::history::query_aggregate(pool, &since, &until).await?;

    Ok(Json(serde_json::json!({
        "since": since,
        "until": until,
        "counts": {
            "total": row.total_requests,
            "success": row.success_count,
            "error": row.error_count,
            "hybrid": row.hybrid_count,
        },
        "costs": {
            "total_cost_estimate": row.total_cost_estimate,
        },
        "performance": {
            "avg_latency_ms": row.avg_latency_ms,
        },
    })))
}

/// Handle GET /v1/providers -- configured providers, variants, and prices.
pub async fn list_providers(State(state): State<AppState>) -> impl IntoResponse {
    let providers: Vec<serde_json::Value> = [Provider::Numeric, Provider::Reasoning]
        .iter()
        .map(|&provider| {
            let entry = state.config.providers.get(provider);
            let variants: Vec<serde_json::Value> = RequestKind::ALL
                .iter()
                .map(|&kind| {
                    serde_json::json!({
                        "kind": kind.as_str(),
                        "variant": model_variant(provider, kind),
                    })
                })
                .collect();
            serde_json::json!({
                "name": provider.as_str(),
                "url": entry.url,
                "pricing_per_1k_tokens": entry.pricing,
                "variants": variants,
            })
        })
        .collect();

    Json(serde_json::json!({ "providers": providers }))
}

/// Handle GET /health
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "finroute"
    }))
}
