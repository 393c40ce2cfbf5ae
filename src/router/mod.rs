//! Request routing: types, pricing, the selection policy, and orchestration.
//!
//! The split mirrors the decision process: `policy` decides which provider
//! should serve a request, `pricing` says what that costs, `engine` runs
//! the invoke/fallback state machine and keeps the ledger honest.

mod engine;
mod policy;
mod pricing;
mod types;

pub use engine::RequestRouter;
pub use policy::{KindRoute, SelectionPolicy};
pub use pricing::{base_token_estimate, model_variant, CostEstimator};
pub use types::{Priority, RequestContext, RequestKind, RouteRequest, RouteResponse, ServedBy};
