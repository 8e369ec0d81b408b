//! Request/response schemas for the checkout sub-resource protocol.
//!
//! Shapes follow the negotiation protocol: a core set of strongly-typed
//! required fields plus one flattened `extra` map for forward-compatible
//! vendor extensions. Both the merchant engine and the buyer agent speak
//! these types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::totals::Total;

/// Header carrying the buyer agent identity.
pub const HEADER_AGENT: &str = "merx-agent";
/// Header carrying the opaque request signature.
pub const HEADER_SIGNATURE: &str = "request-signature";
/// Header carrying the idempotency key for mutating calls.
pub const HEADER_IDEMPOTENCY_KEY: &str = "idempotency-key";

fn extra_is_empty(m: &Map<String, Value>) -> bool {
    m.is_empty()
}

/// Lifecycle status of a checkout session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Incomplete,
    ReadyForComplete,
    Completed,
    Cancelled,
}

impl SessionStatus {
    /// Terminal sessions accept no further mutations.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Cancelled)
    }
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemRef {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineItemCreateRequest {
    pub quantity: u32,
    pub item: ItemRef,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BuyerInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(flatten, default, skip_serializing_if = "extra_is_empty")]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiscountsRequest {
    pub codes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DestinationRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub postal_code: String,
    pub address_country: String,
    #[serde(flatten, default, skip_serializing_if = "extra_is_empty")]
    pub extra: Map<String, Value>,
}

/// Buyer-side selection of one fulfillment option within a group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupSelectionRequest {
    pub id: String,
    pub selected_option_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FulfillmentMethodRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub method_type: String,
    #[serde(default)]
    pub line_item_ids: Vec<String>,
    #[serde(default)]
    pub destinations: Vec<DestinationRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_destination_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<GroupSelectionRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FulfillmentRequest {
    pub methods: Vec<FulfillmentMethodRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckoutCreateRequest {
    pub currency: String,
    pub line_items: Vec<LineItemCreateRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buyer: Option<BuyerInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discounts: Option<DiscountsRequest>,
    #[serde(flatten, default, skip_serializing_if = "extra_is_empty")]
    pub extra: Map<String, Value>,
}

/// Partial-merge update: absent fields leave the session untouched,
/// present fields win wholesale (last-write-wins per field).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CheckoutUpdateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buyer: Option<BuyerInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discounts: Option<DiscountsRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fulfillment: Option<FulfillmentRequest>,
    #[serde(flatten, default, skip_serializing_if = "extra_is_empty")]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credential {
    #[serde(rename = "type")]
    pub kind: String,
    pub token: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentData {
    pub credential: Option<Credential>,
}

/// Buyer-side trust envelope attached to `complete`: an opaque,
/// amount-bound mandate token. Passed through and presence-checked only.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrustCompleteRequest {
    pub checkout_mandate: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CompleteRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_data: Option<PaymentData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trust: Option<TrustCompleteRequest>,
    #[serde(flatten, default, skip_serializing_if = "extra_is_empty")]
    pub extra: Map<String, Value>,
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemResponse {
    pub id: String,
    pub title: String,
    /// Unit price in minor currency units.
    pub price: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineItemResponse {
    pub id: String,
    pub item: ItemResponse,
    pub quantity: u32,
    pub totals: Vec<Total>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppliedDiscount {
    pub code: String,
    pub title: String,
    pub amount: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiscountsResponse {
    pub codes: Vec<String>,
    pub applied: Vec<AppliedDiscount>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FulfillmentOptionResponse {
    pub id: String,
    pub title: String,
    /// Flat fee in minor units added to the order total when selected.
    pub fee: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FulfillmentGroupResponse {
    pub id: String,
    pub line_item_ids: Vec<String>,
    pub options: Vec<FulfillmentOptionResponse>,
    pub selected_option_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DestinationResponse {
    pub id: String,
    pub postal_code: String,
    pub address_country: String,
    #[serde(flatten, default, skip_serializing_if = "extra_is_empty")]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FulfillmentMethodResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub method_type: String,
    pub line_item_ids: Vec<String>,
    pub destinations: Vec<DestinationResponse>,
    pub selected_destination_id: Option<String>,
    pub groups: Vec<FulfillmentGroupResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FulfillmentResponse {
    pub methods: Vec<FulfillmentMethodResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderRef {
    pub id: String,
    pub permalink_url: String,
}

/// Merchant-side trust envelope: an opaque authorization token attached
/// once a total is sealed (status `ready_for_complete` or later).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrustResponse {
    pub merchant_authorization: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckoutResponse {
    pub id: String,
    pub status: SessionStatus,
    pub currency: String,
    pub line_items: Vec<LineItemResponse>,
    pub totals: Vec<Total>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buyer: Option<BuyerInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discounts: Option<DiscountsResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fulfillment: Option<FulfillmentResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trust: Option<TrustResponse>,
    #[serde(flatten, default, skip_serializing_if = "extra_is_empty")]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_snake_case() {
        let v = serde_json::to_value(SessionStatus::ReadyForComplete).unwrap();
        assert_eq!(v, "ready_for_complete");
    }

    #[test]
    fn test_terminal_states() {
        assert!(SessionStatus::Completed.is_terminal());
        assert!(SessionStatus::Cancelled.is_terminal());
        assert!(!SessionStatus::Incomplete.is_terminal());
        assert!(!SessionStatus::ReadyForComplete.is_terminal());
    }

    #[test]
    fn test_extra_map_round_trips_unknown_fields() {
        let raw = serde_json::json!({
            "currency": "GBP",
            "line_items": [{"quantity": 2, "item": {"id": "widget-x"}}],
            "vendor_hint": "keep-me"
        });
        let req: CheckoutCreateRequest = serde_json::from_value(raw).unwrap();
        assert_eq!(req.extra["vendor_hint"], "keep-me");
        let back = serde_json::to_value(&req).unwrap();
        assert_eq!(back["vendor_hint"], "keep-me");
    }

    #[test]
    fn test_update_request_fields_default_absent() {
        let req: CheckoutUpdateRequest = serde_json::from_str("{}").unwrap();
        assert!(req.buyer.is_none());
        assert!(req.discounts.is_none());
        assert!(req.fulfillment.is_none());
    }
}
