//! Spending-policy evaluation for a proposed purchase.
//!
//! Pure: no I/O, never blocks. A `manual` decision is a distinct outcome the
//! caller resolves through an approval gateway, not a silent block.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use merx_core::mandate::IntentMandate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SpendingPolicy {
    /// Maximum tolerated relative deviation from the standard price,
    /// e.g. 0.15 for 15%.
    pub max_variance: f64,
    /// Purchases at or below this total cost (minor units) auto-approve
    /// regardless of variance.
    pub auto_approve_limit: i64,
    /// How long a drafted intent stays valid.
    pub intent_ttl_minutes: i64,
}

impl Default for SpendingPolicy {
    fn default() -> Self {
        Self {
            max_variance: 0.15,
            auto_approve_limit: 100_000,
            intent_ttl_minutes: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    Auto,
    Manual,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GovernanceDecision {
    pub approved: bool,
    pub kind: DecisionKind,
    /// Relative deviation of the offered price from the standard price.
    pub variance: f64,
    /// Offered unit price times quantity, minor units.
    pub total_cost: i64,
    pub intent: IntentMandate,
}

/// Evaluate a quote against policy. Auto-approved when the total cost is
/// within the auto-approve limit or the price variance is within tolerance;
/// otherwise the decision requires manual sign-off.
pub fn evaluate(
    item_id: &str,
    unit_price: i64,
    standard_price: i64,
    quantity: u32,
    policy: &SpendingPolicy,
) -> GovernanceDecision {
    let variance = if standard_price > 0 {
        (unit_price - standard_price) as f64 / standard_price as f64
    } else {
        f64::INFINITY
    };
    let total_cost = unit_price * i64::from(quantity);

    let auto = total_cost <= policy.auto_approve_limit || variance <= policy.max_variance;

    let intent = IntentMandate {
        natural_language_description: format!(
            "Purchase {quantity} x {item_id} for supply continuity"
        ),
        cart_confirmation_required: !auto,
        intent_expiry: Utc::now() + Duration::minutes(policy.intent_ttl_minutes),
    };

    tracing::debug!(
        item_id,
        unit_price,
        standard_price,
        variance,
        total_cost,
        auto,
        "governance evaluated"
    );

    GovernanceDecision {
        approved: auto,
        kind: if auto {
            DecisionKind::Auto
        } else {
            DecisionKind::Manual
        },
        variance,
        total_cost,
        intent,
    }
}
