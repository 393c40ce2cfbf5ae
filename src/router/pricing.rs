//! Cost estimation from static pricing tables.
//!
//! `estimate` is pure: the same `(provider, kind)` always yields the same
//! number. There is no "unknown price" default; a variant missing from the
//! pricing table is a configuration bug that would silently corrupt cost
//! accounting, so it fails fast instead.

use std::collections::BTreeMap;

use crate::config::ProvidersConfig;
use crate::error::{Error, Result};
use crate::provider::Provider;
use crate::router::RequestKind;

/// Map a request kind to the priced model variant within a provider.
///
/// High-volume categorization runs on each provider's cheap variant; the
/// reasoning provider's top variant is reserved for the kinds that need it.
pub fn model_variant(provider: Provider, kind: RequestKind) -> &'static str {
    match (provider, kind) {
        (Provider::Numeric, RequestKind::Categorization) => "quant-lite",
        (Provider::Numeric, _) => "quant-core",
        (Provider::Reasoning, RequestKind::Categorization) => "sage-lite",
        (Provider::Reasoning, _) => "sage-core",
    }
}

/// Rough token volume per request kind, used to turn per-1k-token prices
/// into a per-request estimate.
pub fn base_token_estimate(kind: RequestKind) -> u32 {
    match kind {
        RequestKind::Categorization => 400,
        RequestKind::Query => 900,
        RequestKind::Forecasting => 1200,
        RequestKind::Analysis => 1500,
        RequestKind::Reasoning => 2500,
    }
}

/// Pure estimator over the configured per-variant pricing tables.
#[derive(Debug, Clone)]
pub struct CostEstimator {
    numeric: BTreeMap<String, f64>,
    reasoning: BTreeMap<String, f64>,
}

impl CostEstimator {
    pub fn new(numeric: BTreeMap<String, f64>, reasoning: BTreeMap<String, f64>) -> Self {
        Self { numeric, reasoning }
    }

    pub fn from_config(providers: &ProvidersConfig) -> Self {
        Self::new(
            providers.numeric.pricing.clone(),
            providers.reasoning.pricing.clone(),
        )
    }

    fn prices(&self, provider: Provider) -> &BTreeMap<String, f64> {
        match provider {
            Provider::Numeric => &self.numeric,
            Provider::Reasoning => &self.reasoning,
        }
    }

    /// Estimated cost of serving `kind` on `provider`, in account currency.
    pub fn estimate(&self, provider: Provider, kind: RequestKind) -> Result<f64> {
        let variant = model_variant(provider, kind);
        let price_per_1k = self
            .prices(provider)
            .get(variant)
            .copied()
            .ok_or(Error::UnknownPricing { provider, variant })?;
        Ok(f64::from(base_token_estimate(kind)) / 1000.0 * price_per_1k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_estimator() -> CostEstimator {
        let numeric = BTreeMap::from([
            ("quant-lite".to_string(), 0.02),
            ("quant-core".to_string(), 0.08),
        ]);
        let reasoning = BTreeMap::from([
            ("sage-lite".to_string(), 0.05),
            ("sage-core".to_string(), 0.30),
        ]);
        CostEstimator::new(numeric, reasoning)
    }

    #[test]
    fn estimate_uses_base_tokens_and_variant_price() {
        let estimator = test_estimator();
        // forecasting on numeric: 1200 tokens at 0.08 per 1k
        let cost = estimator
            .estimate(Provider::Numeric, RequestKind::Forecasting)
            .unwrap();
        assert!((cost - 0.096).abs() < 1e-9);
    }

    #[test]
    fn categorization_uses_the_cheap_variant() {
        let estimator = test_estimator();
        let cheap = estimator
            .estimate(Provider::Numeric, RequestKind::Categorization)
            .unwrap();
        let standard = estimator
            .estimate(Provider::Numeric, RequestKind::Analysis)
            .unwrap();
        assert!(cheap < standard);

        let sibling = estimator
            .estimate(Provider::Reasoning, RequestKind::Categorization)
            .unwrap();
        let full = estimator
            .estimate(Provider::Reasoning, RequestKind::Reasoning)
            .unwrap();
        assert!(sibling < full);
    }

    #[test]
    fn estimate_is_deterministic_over_all_pairs() {
        let estimator = test_estimator();
        for provider in [Provider::Numeric, Provider::Reasoning] {
            for kind in RequestKind::ALL {
                let first = estimator.estimate(provider, kind).unwrap();
                let second = estimator.estimate(provider, kind).unwrap();
                assert_eq!(first, second);
                assert!(first > 0.0);
            }
        }
    }

    #[test]
    fn missing_variant_price_fails_fast() {
        let estimator = CostEstimator::new(BTreeMap::new(), BTreeMap::new());
        let err = estimator
            .estimate(Provider::Numeric, RequestKind::Forecasting)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownPricing {
                provider: Provider::Numeric,
                variant: "quant-core"
            }
        ));
    }
}
