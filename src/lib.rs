//! finroute - AI request routing and monthly cost governance
//!
//! This library routes AI requests from dashboard features to one of two
//! inference providers, enforcing a monthly cost ceiling, failing over
//! transparently when a provider errors, and persisting usage statistics
//! across restarts.

pub mod api;
pub mod config;
pub mod error;
pub mod ledger;
pub mod provider;
pub mod router;
pub mod storage;

pub use config::Config;
pub use error::{Error, Result};
