//! End-to-end routing tests against fake HTTP providers.
//!
//! Verifies that:
//! - A healthy primary serves the request and is counted in the ledger
//! - A failing primary triggers exactly one fallback attempt (hybrid)
//! - Both providers failing yields a generic 503 and a ledger failure mark
//! - The cost-ceiling override redirects every kind to the fallback provider

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use http::Request;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use finroute::api::{create_router, AppState, SERVED_BY_HEADER};
use finroute::config::{
    Config, LoggingConfig, ProviderConfig, ProvidersConfig, RoutingConfig, ServerConfig,
};
use finroute::ledger::UsageLedger;
use finroute::provider::HttpInvoker;
use finroute::router::{CostEstimator, RequestRouter, SelectionPolicy};
use finroute::storage::LedgerRecord;

fn numeric_pricing() -> BTreeMap<String, f64> {
    BTreeMap::from([
        ("quant-lite".to_string(), 0.02),
        ("quant-core".to_string(), 0.08),
    ])
}

fn reasoning_pricing() -> BTreeMap<String, f64> {
    BTreeMap::from([
        ("sage-lite".to_string(), 0.05),
        ("sage-core".to_string(), 0.30),
    ])
}

fn test_config(numeric_url: &str, reasoning_url: &str) -> Config {
    Config {
        server: ServerConfig::default(),
        database: None,
        routing: RoutingConfig::default(),
        providers: ProvidersConfig {
            numeric: ProviderConfig {
                url: numeric_url.to_string(),
                api_key: None,
                pricing: numeric_pricing(),
            },
            reasoning: ProviderConfig {
                url: reasoning_url.to_string(),
                api_key: None,
                pricing: reasoning_pricing(),
            },
        },
        logging: LoggingConfig::default(),
    }
}

/// Build the app with a fresh in-memory ledger and no database.
fn build_app(config: Config, ledger: Arc<UsageLedger>) -> axum::Router {
    let invoker = Arc::new(HttpInvoker::new(&config.providers).expect("build invoker"));
    let router = RequestRouter::new(
        SelectionPolicy::new(
            config.routing.low_cost_fallback,
            config.routing.soft_cost_threshold,
        ),
        CostEstimator::from_config(&config.providers),
        invoker,
        ledger.clone(),
        Duration::from_secs(5),
    );
    create_router(AppState {
        router: Arc::new(router),
        ledger,
        config: Arc::new(config),
        db: None,
    })
}

fn route_body(kind: &str, priority: &str) -> Body {
    let body = serde_json::json!({
        "kind": kind,
        "priority": priority,
        "payload": {"transactions": [{"amount": -42.17, "memo": "COFFEE"}]},
        "context": {"tenant": "acme"},
    });
    Body::from(serde_json::to_vec(&body).unwrap())
}

async fn post_route(app: axum::Router, kind: &str, priority: &str) -> (http::StatusCode, serde_json::Value, http::HeaderMap) {
    let request = Request::post("/v1/route")
        .header("content-type", "application/json")
        .body(route_body(kind, priority))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), 1_048_576)
        .await
        .expect("read body");
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap_or_default();
    (status, json, headers)
}

async fn mock_success(server: &MockServer, result: serde_json::Value, confidence: f64) {
    Mock::given(method("POST"))
        .and(path("/v1/infer"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"result": result, "confidence": confidence})),
        )
        .mount(server)
        .await;
}

async fn mock_failure(server: &MockServer, status: u16) {
    Mock::given(method("POST"))
        .and(path("/v1/infer"))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

#[tokio::test]
async fn forecasting_is_served_by_the_numeric_provider() {
    let numeric = MockServer::start().await;
    let reasoning = MockServer::start().await;
    mock_success(&numeric, serde_json::json!({"forecast": [100.0, 104.2]}), 0.93).await;

    let ledger = Arc::new(UsageLedger::new(250.0));
    let app = build_app(test_config(&numeric.uri(), &reasoning.uri()), ledger.clone());

    let (status, json, headers) = post_route(app, "forecasting", "medium").await;

    assert_eq!(status, http::StatusCode::OK);
    assert_eq!(json["served_by"], "numeric");
    assert_eq!(json["confidence"], 0.93);
    assert_eq!(json["result"]["forecast"][1], 104.2);
    assert!(json["cost_estimate"].as_f64().unwrap() > 0.0);
    assert!(json.get("fallback_reason").is_none());
    assert_eq!(headers.get(SERVED_BY_HEADER).unwrap(), "numeric");
    assert!(headers.get("x-finroute-request-id").is_some());

    let snap = ledger.snapshot();
    assert_eq!(snap.requests.numeric, 1);
    assert_eq!(snap.requests.reasoning, 0);
    assert_eq!(snap.total_requests, 1);
    assert!(snap.total_cost > 0.0);
    assert_eq!(snap.success_rate, 1.0);
}

#[tokio::test]
async fn failing_primary_falls_over_to_a_hybrid_response() {
    let numeric = MockServer::start().await;
    let reasoning = MockServer::start().await;
    // reasoning is primary for a reasoning request and is forced to fail
    mock_failure(&reasoning, 500).await;
    mock_success(&numeric, serde_json::json!({"explanation": "seasonal spike"}), 0.74).await;

    let ledger = Arc::new(UsageLedger::new(250.0));
    let app = build_app(test_config(&numeric.uri(), &reasoning.uri()), ledger.clone());

    let (status, json, headers) = post_route(app, "reasoning", "high").await;

    assert_eq!(status, http::StatusCode::OK);
    assert_eq!(json["served_by"], "hybrid");
    assert!(json["fallback_reason"].as_str().unwrap().contains("500"));
    assert_eq!(headers.get(SERVED_BY_HEADER).unwrap(), "hybrid");

    // Counted under the provider that actually served it, still a success.
    let snap = ledger.snapshot();
    assert_eq!(snap.requests.numeric, 1);
    assert_eq!(snap.requests.reasoning, 0);
    assert_eq!(snap.success_rate, 1.0);
}

#[tokio::test]
async fn unreachable_primary_also_falls_over() {
    let reasoning = MockServer::start().await;
    mock_success(&reasoning, serde_json::json!({"answer": "about 3200"}), 0.8).await;

    // Numeric provider points at a closed port; forecasting goes hybrid.
    let ledger = Arc::new(UsageLedger::new(250.0));
    let app = build_app(
        test_config("http://127.0.0.1:9", &reasoning.uri()),
        ledger.clone(),
    );

    let (status, json, _headers) = post_route(app, "forecasting", "medium").await;

    assert_eq!(status, http::StatusCode::OK);
    assert_eq!(json["served_by"], "hybrid");
    assert_eq!(ledger.snapshot().requests.reasoning, 1);
}

#[tokio::test]
async fn both_providers_failing_is_a_generic_503() {
    let numeric = MockServer::start().await;
    let reasoning = MockServer::start().await;
    mock_failure(&numeric, 502).await;
    mock_failure(&reasoning, 500).await;

    let ledger = Arc::new(UsageLedger::new(250.0));
    let app = build_app(test_config(&numeric.uri(), &reasoning.uri()), ledger.clone());

    let (status, json, headers) = post_route(app, "query", "low").await;

    assert_eq!(status, http::StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        json["error"]["message"],
        "AI service temporarily unavailable"
    );
    // No provider jargon reaches the caller.
    assert!(!json["error"]["message"].as_str().unwrap().contains("500"));
    assert!(headers.get(SERVED_BY_HEADER).is_none());

    let snap = ledger.snapshot();
    assert_eq!(snap.total_requests, 1);
    assert_eq!(snap.requests.numeric, 0);
    assert_eq!(snap.requests.reasoning, 0);
    assert!(snap.success_rate < 1.0);
}

#[tokio::test]
async fn malformed_provider_body_counts_as_a_failure() {
    let numeric = MockServer::start().await;
    let reasoning = MockServer::start().await;
    // 200 but no 'result' field
    Mock::given(method("POST"))
        .and(path("/v1/infer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .mount(&numeric)
        .await;
    mock_success(&reasoning, serde_json::json!({"category": "travel"}), 0.66).await;

    let ledger = Arc::new(UsageLedger::new(250.0));
    let app = build_app(test_config(&numeric.uri(), &reasoning.uri()), ledger.clone());

    let (status, json, _headers) = post_route(app, "forecasting", "medium").await;

    assert_eq!(status, http::StatusCode::OK);
    assert_eq!(json["served_by"], "hybrid");
}

#[tokio::test]
async fn ceiling_override_sends_everything_to_the_low_cost_provider() {
    let numeric = MockServer::start().await;
    let reasoning = MockServer::start().await;
    mock_success(&numeric, serde_json::json!({"ok": true}), 0.9).await;
    // The reasoning provider must never be called once the ceiling is hit.
    Mock::given(method("POST"))
        .and(path("/v1/infer"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&reasoning)
        .await;

    let record = LedgerRecord {
        requests_numeric: 900,
        requests_reasoning: 450,
        total_requests: 1360,
        total_cost: 400.0,
        success_rate: 0.99,
        limit_reached: true,
        last_reset: chrono::Utc::now().to_rfc3339(),
    };
    let ledger = Arc::new(UsageLedger::from_record(record, 250.0));
    let app = build_app(test_config(&numeric.uri(), &reasoning.uri()), ledger.clone());

    for kind in ["reasoning", "query", "analysis", "categorization", "forecasting"] {
        let (status, json, _headers) = post_route(app.clone(), kind, "high").await;
        assert_eq!(status, http::StatusCode::OK, "kind {}", kind);
        assert_eq!(json["served_by"], "numeric", "kind {}", kind);
    }

    assert_eq!(ledger.snapshot().requests.reasoning, 450);
}
