//! HTTP service surface.
//!
//! Hosts the routing endpoint consumed by dashboard features plus the
//! usage/observability endpoints.

mod handlers;
mod server;

pub use handlers::{LATENCY_MS_HEADER, REQUEST_ID_HEADER, SERVED_BY_HEADER};
pub use server::{create_router, run_server, AppState, RequestId};
