//! Configuration parsing and validation for finroute.

use std::collections::BTreeMap;
use std::path::Path;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::provider::Provider;
use crate::router::{model_variant, RequestKind};

/// Root configuration structure.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: Option<DatabaseConfig>,
    pub routing: RoutingConfig,
    pub providers: ProvidersConfig,
    pub logging: LoggingConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "127.0.0.1:8080")
    #[serde(default = "default_listen")]
    pub listen: String,
}

fn default_listen() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "./finroute.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Routing knobs: the cost ceiling, the categorization soft threshold,
/// the per-request timeout, and the ceiling-override target.
#[derive(Debug, Clone, Deserialize)]
pub struct RoutingConfig {
    /// Monthly spend limit; once crossed, all routing goes to the fallback.
    #[serde(default = "default_ceiling")]
    pub monthly_cost_ceiling: f64,
    /// Cumulative-cost threshold above which categorization moves to the
    /// reasoning provider's cheap sibling variant.
    #[serde(default = "default_soft_threshold")]
    pub soft_cost_threshold: f64,
    /// Per-provider-invocation timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Provider that serves everything once the ceiling is reached.
    #[serde(default = "default_low_cost_fallback")]
    pub low_cost_fallback: Provider,
}

fn default_ceiling() -> f64 {
    250.0
}

fn default_soft_threshold() -> f64 {
    100.0
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_low_cost_fallback() -> Provider {
    Provider::Numeric
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            monthly_cost_ceiling: default_ceiling(),
            soft_cost_threshold: default_soft_threshold(),
            request_timeout_secs: default_timeout_secs(),
            low_cost_fallback: default_low_cost_fallback(),
        }
    }
}

/// API key wrapper that redacts in Debug/Display/Serialize and zeroizes
/// on drop. Only accessible via `.expose_secret()` (grep-auditable).
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl std::fmt::Display for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl Serialize for ApiKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("[REDACTED]")
    }
}

impl<'de> Deserialize<'de> for ApiKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(|s| ApiKey(SecretString::from(s)))
    }
}

impl From<String> for ApiKey {
    fn from(s: String) -> Self {
        ApiKey(SecretString::from(s))
    }
}

impl From<&str> for ApiKey {
    fn from(s: &str) -> Self {
        ApiKey(SecretString::from(s))
    }
}

/// One provider's endpoint and pricing table.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URL for the provider's API
    pub url: String,
    /// Optional API key
    pub api_key: Option<ApiKey>,
    /// Price per 1000 tokens, keyed by model variant
    pub pricing: BTreeMap<String, f64>,
}

/// Both provider entries; the roles are fixed, not discovered.
#[derive(Debug, Clone)]
pub struct ProvidersConfig {
    pub numeric: ProviderConfig,
    pub reasoning: ProviderConfig,
}

impl ProvidersConfig {
    pub fn get(&self, provider: Provider) -> &ProviderConfig {
        match provider {
            Provider::Numeric => &self.numeric,
            Provider::Reasoning => &self.reasoning,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Whether to write per-request history to the database
    #[serde(default = "default_true")]
    pub log_requests: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_requests: true,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable '{var}' not set for provider '{provider}': {message}")]
    EnvVar {
        var: String,
        provider: String,
        message: String,
    },
}

/// Provider entry as deserialized from TOML; `api_key` may still contain
/// `${VAR}` references.
#[derive(Deserialize)]
struct RawProviderConfig {
    url: String,
    api_key: Option<String>,
    #[serde(default)]
    pricing: BTreeMap<String, f64>,
}

#[derive(Deserialize)]
struct RawProvidersConfig {
    numeric: RawProviderConfig,
    reasoning: RawProviderConfig,
}

#[derive(Deserialize)]
struct RawConfig {
    #[serde(default)]
    server: ServerConfig,
    database: Option<DatabaseConfig>,
    #[serde(default)]
    routing: RoutingConfig,
    providers: RawProvidersConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

/// Expand all `${VAR}` references in a string using a custom lookup function.
///
/// The closure-based design makes this testable without touching global env
/// state. Fails on the first missing variable, unclosed `${`, or empty
/// variable name.
fn expand_env_vars_with<F>(input: &str, provider: &str, lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if !input.contains("${") {
        return Ok(input.to_string());
    }

    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let end = after.find('}').ok_or_else(|| ConfigError::EnvVar {
            var: "<unclosed>".to_string(),
            provider: provider.to_string(),
            message: format!("Unclosed '${{' in config value: {}", input),
        })?;

        let var_name = &after[..end];
        if var_name.is_empty() {
            return Err(ConfigError::EnvVar {
                var: String::new(),
                provider: provider.to_string(),
                message: "Empty variable name in '${}' reference".to_string(),
            });
        }

        let value = lookup(var_name).ok_or_else(|| ConfigError::EnvVar {
            var: var_name.to_string(),
            provider: provider.to_string(),
            message: format!("Environment variable '{}' is not set", var_name),
        })?;

        result.push_str(&value);
        rest = &after[end + 1..];
    }

    result.push_str(rest);
    Ok(result)
}

/// Convention-based env var name for a provider role:
/// "numeric" -> "FINROUTE_NUMERIC_API_KEY".
pub fn convention_env_var_name(provider: Provider) -> String {
    format!("FINROUTE_{}_API_KEY", provider.as_str().to_uppercase())
}

/// Resolve one provider entry: expand `${VAR}` keys, fall back to the
/// convention env var when no key is configured.
fn resolve_provider(
    provider: Provider,
    raw: RawProviderConfig,
) -> Result<ProviderConfig, ConfigError> {
    let api_key = match raw.api_key {
        Some(ref key) if key.contains("${") => {
            let expanded =
                expand_env_vars_with(key, provider.as_str(), |name| std::env::var(name).ok())?;
            tracing::debug!(provider = %provider, "API key expanded from environment");
            Some(ApiKey::from(expanded))
        }
        Some(key) => Some(ApiKey::from(key)),
        None => {
            let var_name = convention_env_var_name(provider);
            match std::env::var(&var_name) {
                Ok(value) => {
                    tracing::debug!(provider = %provider, var = %var_name, "API key from convention env var");
                    Some(ApiKey::from(value))
                }
                Err(_) => None,
            }
        }
    };

    Ok(ProviderConfig {
        url: raw.url,
        api_key,
        pricing: raw.pricing,
    })
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;

        Self::parse_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(content)?;

        let config = Config {
            server: raw.server,
            database: raw.database,
            routing: raw.routing,
            providers: ProvidersConfig {
                numeric: resolve_provider(Provider::Numeric, raw.providers.numeric)?,
                reasoning: resolve_provider(Provider::Reasoning, raw.providers.reasoning)?,
            },
            logging: raw.logging,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// Pricing completeness is checked up front: every variant the routing
    /// layer can ever ask for must be priced, so a gap surfaces at startup
    /// instead of mid-request.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.routing.monthly_cost_ceiling <= 0.0 {
            return Err(ConfigError::Validation(
                "monthly_cost_ceiling must be positive".to_string(),
            ));
        }
        if self.routing.soft_cost_threshold < 0.0 {
            return Err(ConfigError::Validation(
                "soft_cost_threshold must not be negative".to_string(),
            ));
        }
        if self.routing.request_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "request_timeout_secs must be positive".to_string(),
            ));
        }

        for provider in [Provider::Numeric, Provider::Reasoning] {
            let entry = self.providers.get(provider);
            if entry.url.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Provider '{}' has empty URL",
                    provider
                )));
            }
            for kind in RequestKind::ALL {
                let variant = model_variant(provider, kind);
                match entry.pricing.get(variant) {
                    Some(price) if *price > 0.0 => {}
                    Some(_) => {
                        return Err(ConfigError::Validation(format!(
                            "Provider '{}' variant '{}' has a non-positive price",
                            provider, variant
                        )))
                    }
                    None => {
                        return Err(ConfigError::Validation(format!(
                            "Provider '{}' is missing a price for variant '{}' (needed by '{}' requests)",
                            provider, variant, kind
                        )))
                    }
                }
            }
        }

        Ok(())
    }

    /// Get database config with defaults.
    pub fn database(&self) -> DatabaseConfig {
        self.database.clone().unwrap_or_default()
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.routing.request_timeout_secs)
    }
}
