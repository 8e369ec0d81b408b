//! Trust-mandate artifacts exchanged between buyer and merchant.
//!
//! Mandates are opaque authorization tokens wrapped in a small typed
//! envelope. No cryptographic verification happens here; tokens are passed
//! through and checked for presence and shape only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Declared purchase intent, drafted by governance before any merchant call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IntentMandate {
    /// Human-readable description of what the agent intends to buy and why.
    pub natural_language_description: String,
    /// Whether a human must confirm the cart before payment.
    pub cart_confirmation_required: bool,
    /// The intent is void after this instant.
    pub intent_expiry: DateTime<Utc>,
}

/// Monetary amount bound into a payment mandate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MandateAmount {
    pub currency: String,
    /// Minor currency units.
    pub value: i64,
}

/// Payment authorization bound to one checkout session and one exact amount.
///
/// The amount must be the merchant's sealed final total, never the buyer's
/// local estimate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentMandate {
    pub mandate_id: String,
    /// The checkout session this mandate authorizes.
    pub checkout_id: String,
    pub amount: MandateAmount,
    pub merchant_agent: String,
    /// Opaque signed token proving buyer consent.
    pub user_authorization: String,
}

impl PaymentMandate {
    pub fn new(
        checkout_id: impl Into<String>,
        currency: impl Into<String>,
        value: i64,
        merchant_agent: impl Into<String>,
        user_authorization: impl Into<String>,
    ) -> Self {
        Self {
            mandate_id: merx_shared::new_id("pm"),
            checkout_id: checkout_id.into(),
            amount: MandateAmount {
                currency: currency.into(),
                value,
            },
            merchant_agent: merchant_agent.into(),
            user_authorization: user_authorization.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mandate_binds_amount_and_session() {
        let m = PaymentMandate::new("chk_1", "GBP", 528_300, "supplier_b", "tok.abc");
        assert_eq!(m.checkout_id, "chk_1");
        assert_eq!(m.amount.value, 528_300);
        assert!(m.mandate_id.starts_with("pm_"));
    }
}
