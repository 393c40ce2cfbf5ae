//! HTTP-backed provider invoker.
//!
//! Both providers expose the same inference endpoint shape; per-provider
//! differences (base URL, credentials) live in configuration. The response
//! body is normalized here: a JSON object with a required `result` field and
//! an optional `confidence` score.

use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use reqwest::{header, Client};

use super::{Provider, ProviderFailure, ProviderInvoker, RawResult};
use crate::config::{ApiKey, ProvidersConfig};
use crate::router::RouteRequest;

/// One provider's connection details.
#[derive(Clone)]
struct Endpoint {
    url: String,
    api_key: Option<ApiKey>,
}

/// Invoker that reaches both providers over HTTP.
#[derive(Clone)]
pub struct HttpInvoker {
    client: Client,
    numeric: Endpoint,
    reasoning: Endpoint,
}

impl HttpInvoker {
    pub fn new(providers: &ProvidersConfig) -> Result<Self, reqwest::Error> {
        // Per-request timeouts are caller-supplied at invoke time; only the
        // connect timeout is fixed here.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            numeric: Endpoint {
                url: providers.numeric.url.clone(),
                api_key: providers.numeric.api_key.clone(),
            },
            reasoning: Endpoint {
                url: providers.reasoning.url.clone(),
                api_key: providers.reasoning.api_key.clone(),
            },
        })
    }

    fn endpoint(&self, provider: Provider) -> &Endpoint {
        match provider {
            Provider::Numeric => &self.numeric,
            Provider::Reasoning => &self.reasoning,
        }
    }

    async fn call(
        &self,
        provider: Provider,
        request: &RouteRequest,
        timeout: Duration,
    ) -> Result<RawResult, ProviderFailure> {
        let endpoint = self.endpoint(provider);
        let url = format!("{}/v1/infer", endpoint.url.trim_end_matches('/'));

        let body = serde_json::json!({
            "kind": request.kind,
            "priority": request.priority,
            "payload": request.payload,
        });

        let mut upstream = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .timeout(timeout)
            .json(&body);

        if let Some(api_key) = &endpoint.api_key {
            upstream = upstream.header(
                header::AUTHORIZATION,
                format!("Bearer {}", api_key.expose_secret()),
            );
        }

        let start = Instant::now();
        let response = upstream.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderFailure::Timeout {
                    provider,
                    timeout_ms: timeout.as_millis() as u64,
                }
            } else {
                ProviderFailure::Unreachable {
                    provider,
                    detail: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::warn!(provider = %provider, status = %status, "provider returned error");
            return Err(ProviderFailure::Upstream {
                provider,
                status: status.as_u16(),
                detail,
            });
        }

        let parsed: serde_json::Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ProviderFailure::Timeout {
                    provider,
                    timeout_ms: timeout.as_millis() as u64,
                }
            } else {
                ProviderFailure::Malformed {
                    provider,
                    detail: e.to_string(),
                }
            }
        })?;
        let latency_ms = start.elapsed().as_millis() as u64;

        normalize(provider, parsed, latency_ms)
    }
}

impl ProviderInvoker for HttpInvoker {
    fn invoke<'a>(
        &'a self,
        provider: Provider,
        request: &'a RouteRequest,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<RawResult, ProviderFailure>> {
        Box::pin(self.call(provider, request, timeout))
    }
}

/// Normalize a provider's JSON body into a `RawResult`.
///
/// `result` is required; `confidence` is optional and clamped to 0..=1 when
/// present. A missing `result` field counts as a malformed response even on
/// HTTP 200, since the caller would have nothing to work with.
fn normalize(
    provider: Provider,
    mut body: serde_json::Value,
    latency_ms: u64,
) -> Result<RawResult, ProviderFailure> {
    let confidence = body
        .get("confidence")
        .and_then(|v| v.as_f64())
        .map(|c| c.clamp(0.0, 1.0));

    let payload = match body.get_mut("result") {
        Some(result) => result.take(),
        None => {
            return Err(ProviderFailure::Malformed {
                provider,
                detail: "response body has no 'result' field".to_string(),
            })
        }
    };

    Ok(RawResult {
        payload,
        confidence,
        latency_ms,
    })
}
