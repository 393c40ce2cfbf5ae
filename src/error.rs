//! Error types for finroute.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::provider::{Provider, ProviderFailure};

/// Result type alias for finroute operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for finroute.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Fatal: an unmapped pricing entry would corrupt cost accounting,
    /// so it is never defaulted or retried.
    #[error("No price configured for provider '{provider}' variant '{variant}'")]
    UnknownPricing {
        provider: Provider,
        variant: &'static str,
    },

    /// Both the selected provider and its fallback failed.
    #[error("All providers failed (primary: {primary}; fallback: {fallback})")]
    AllProvidersFailed {
        primary: ProviderFailure,
        fallback: ProviderFailure,
    },

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Callers get one generic message when both providers fail; the
        // underlying causes stay in logs and the request history.
        let (status, message) = match &self {
            Error::AllProvidersFailed { .. } => (
                StatusCode::SERVICE_UNAVAILABLE,
                "AI service temporarily unavailable".to_string(),
            ),
            Error::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            Error::Config(_)
            | Error::UnknownPricing { .. }
            | Error::Database(_)
            | Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };

        let body = serde_json::json!({
            "error": {
                "message": message,
                "type": "finroute_error",
                "code": status.as_u16()
            }
        });

        (status, axum::Json(body)).into_response()
    }
}
