//! HTTP server setup and shared state.

use std::sync::Arc;

use axum::{
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use super::handlers;
use crate::config::Config;
use crate::ledger::UsageLedger;
use crate::provider::HttpInvoker;
use crate::router::{CostEstimator, RequestRouter, SelectionPolicy};
use crate::storage;

/// Correlation id assigned to every inbound request.
#[derive(Debug, Clone, Copy)]
pub struct RequestId(pub Uuid);

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<RequestRouter>,
    pub ledger: Arc<UsageLedger>,
    pub config: Arc<Config>,
    pub db: Option<SqlitePool>,
}

/// Create the axum router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/route", post(handlers::route_request))
        .route("/v1/usage", get(handlers::usage))
        .route("/v1/usage/history", get(handlers::usage_history))
        .route("/v1/providers", get(handlers::list_providers))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(middleware::from_fn(assign_request_id))
        .layer(TraceLayer::new_for_http())
}

async fn assign_request_id(mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(RequestId(Uuid::new_v4()));
    next.run(request).await
}

/// Run the HTTP server.
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let listen_addr = config.server.listen.clone();
    let ceiling = config.routing.monthly_cost_ceiling;

    let db = match &config.database {
        Some(db_config) => Some(storage::init_pool(&db_config.path).await?),
        None => None,
    };

    // The ledger is loaded exactly once, here; everything downstream gets a
    // handle instead of reaching for ambient state.
    let ledger = match &db {
        Some(pool) => Arc::new(UsageLedger::load(ceiling, pool.clone()).await?),
        None => {
            tracing::warn!("no database configured, usage will not survive restarts");
            Arc::new(UsageLedger::new(ceiling))
        }
    };

    let invoker = Arc::new(HttpInvoker::new(&config.providers)?);
    let router = RequestRouter::new(
        SelectionPolicy::new(
            config.routing.low_cost_fallback,
            config.routing.soft_cost_threshold,
        ),
        CostEstimator::from_config(&config.providers),
        invoker,
        ledger.clone(),
        config.request_timeout(),
    );

    let state = AppState {
        router: Arc::new(router),
        ledger,
        config: Arc::new(config),
        db,
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    tracing::info!(address = %listen_addr, "starting finroute server");

    axum::serve(listener, app).await?;

    Ok(())
}
