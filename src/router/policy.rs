//! Provider selection policy.
//!
//! The decision table is held as data so it can be inspected, swapped, and
//! unit-tested without touching orchestration. `select` is deterministic:
//! the same `(kind, priority, snapshot)` always picks the same provider.

use crate::ledger::LedgerSnapshot;
use crate::provider::Provider;
use crate::router::{Priority, RequestKind};

/// How one request kind routes while the monthly ceiling has not been hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KindRoute {
    /// Always this provider.
    Fixed(Provider),
    /// Flip to `above` once cumulative cost passes the soft threshold.
    CostSensitive { below: Provider, above: Provider },
    /// `high` priority gets one provider, everything else the other.
    PriorityGated { high: Provider, otherwise: Provider },
}

/// The routing decision table plus its two knobs.
#[derive(Debug, Clone)]
pub struct SelectionPolicy {
    /// Where everything goes once the monthly ceiling is crossed.
    low_cost_fallback: Provider,
    /// Cumulative-cost threshold for cost-sensitive kinds.
    soft_cost_threshold: f64,
    table: Vec<(RequestKind, KindRoute)>,
    default_route: Provider,
}

impl SelectionPolicy {
    /// The standard table: forecasting on the numeric provider, reasoning
    /// and query on the reasoning provider, categorization cost-sensitive,
    /// analysis priority-gated.
    pub fn new(low_cost_fallback: Provider, soft_cost_threshold: f64) -> Self {
        let table = RequestKind::ALL
            .iter()
            .map(|&kind| (kind, standard_route(kind)))
            .collect();

        Self {
            low_cost_fallback,
            soft_cost_threshold,
            table,
            default_route: Provider::Reasoning,
        }
    }

    /// Pick the provider for one request.
    ///
    /// Rules are evaluated top to bottom; the ceiling override beats
    /// everything else.
    pub fn select(
        &self,
        kind: RequestKind,
        priority: Priority,
        snapshot: &LedgerSnapshot,
    ) -> Provider {
        if snapshot.limit_reached {
            return self.low_cost_fallback;
        }

        let route = self
            .table
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, route)| *route);

        match route {
            Some(KindRoute::Fixed(provider)) => provider,
            Some(KindRoute::CostSensitive { below, above }) => {
                if snapshot.total_cost > self.soft_cost_threshold {
                    above
                } else {
                    below
                }
            }
            Some(KindRoute::PriorityGated { high, otherwise }) => {
                if priority == Priority::High {
                    high
                } else {
                    otherwise
                }
            }
            None => self.default_route,
        }
    }
}

fn standard_route(kind: RequestKind) -> KindRoute {
    match kind {
        RequestKind::Forecasting => KindRoute::Fixed(Provider::Numeric),
        RequestKind::Reasoning | RequestKind::Query => KindRoute::Fixed(Provider::Reasoning),
        RequestKind::Categorization => KindRoute::CostSensitive {
            below: Provider::Numeric,
            above: Provider::Reasoning,
        },
        RequestKind::Analysis => KindRoute::PriorityGated {
            high: Provider::Reasoning,
            otherwise: Provider::Numeric,
        },
    }
}
