use chrono::{DateTime, Utc};
use merx_core::catalog::CatalogItem;
use merx_shared::new_id;
use merx_shared::totals::{Total, TotalKind};
use merx_shared::wire::{
    AppliedDiscount, BuyerInfo, CheckoutResponse, DestinationResponse, DiscountsResponse,
    FulfillmentGroupResponse, FulfillmentMethodResponse, FulfillmentOptionResponse,
    FulfillmentResponse, ItemResponse, LineItemResponse, OrderRef, SessionStatus, TrustResponse,
};
use serde::{Deserialize, Serialize};

/// One negotiated line of a checkout. Quantity is fixed at creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineItem {
    pub id: String,
    pub item: CatalogItem,
    pub quantity: u32,
    pub totals: Vec<Total>,
}

impl LineItem {
    pub fn new(item: CatalogItem, quantity: u32) -> Self {
        let line_total = item.price * i64::from(quantity);
        Self {
            id: new_id("li"),
            item,
            quantity,
            totals: vec![
                Total::new(TotalKind::Subtotal, line_total),
                Total::new(TotalKind::Total, line_total),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Destination {
    pub id: String,
    pub postal_code: String,
    pub address_country: String,
}

/// A selectable fulfillment option with a flat fee in minor units.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FulfillmentOption {
    pub id: String,
    pub title: String,
    pub fee: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptionGroup {
    pub id: String,
    pub line_item_ids: Vec<String>,
    pub options: Vec<FulfillmentOption>,
    pub selected_option_id: Option<String>,
}

impl OptionGroup {
    pub fn selected_option(&self) -> Option<&FulfillmentOption> {
        let id = self.selected_option_id.as_deref()?;
        self.options.iter().find(|o| o.id == id)
    }
}

/// Groups line items under one delivery type with candidate destinations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FulfillmentMethod {
    pub id: String,
    pub method_type: String,
    pub line_item_ids: Vec<String>,
    pub destinations: Vec<Destination>,
    pub selected_destination_id: Option<String>,
    pub groups: Vec<OptionGroup>,
}

impl FulfillmentMethod {
    pub fn selected_destination(&self) -> Option<&Destination> {
        let id = self.selected_destination_id.as_deref()?;
        self.destinations.iter().find(|d| d.id == id)
    }

    /// Completion requires exactly one selected destination and exactly one
    /// selected option across all groups of the method.
    pub fn is_ready(&self) -> bool {
        self.selected_destination().is_some()
            && !self.groups.is_empty()
            && self.groups.iter().all(|g| g.selected_option().is_some())
    }

    pub fn selected_fee(&self) -> i64 {
        self.groups
            .iter()
            .filter_map(|g| g.selected_option())
            .map(|o| o.fee)
            .sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Fulfillment {
    pub methods: Vec<FulfillmentMethod>,
}

/// The mutable negotiation record, owned exclusively by the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckoutSession {
    pub id: String,
    pub status: SessionStatus,
    pub currency: String,
    pub line_items: Vec<LineItem>,
    pub buyer: Option<BuyerInfo>,
    pub discount_codes: Vec<String>,
    pub applied_discounts: Vec<AppliedDiscount>,
    pub fulfillment: Option<Fulfillment>,
    pub totals: Vec<Total>,
    pub order: Option<OrderRef>,
    /// Opaque merchant token attached once a total is sealed.
    pub merchant_authorization: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CheckoutSession {
    /// True when every fulfillment method on the session is fully selected.
    /// A session with no fulfillment yet is not ready.
    pub fn fulfillment_ready(&self) -> bool {
        match &self.fulfillment {
            Some(f) => !f.methods.is_empty() && f.methods.iter().all(|m| m.is_ready()),
            None => false,
        }
    }

    pub fn selected_fulfillment_fee(&self) -> i64 {
        self.fulfillment
            .as_ref()
            .map(|f| f.methods.iter().map(|m| m.selected_fee()).sum())
            .unwrap_or(0)
    }

    pub fn to_response(&self) -> CheckoutResponse {
        CheckoutResponse {
            id: self.id.clone(),
            status: self.status,
            currency: self.currency.clone(),
            line_items: self.line_items.iter().map(line_item_response).collect(),
            totals: self.totals.clone(),
            buyer: self.buyer.clone(),
            discounts: Some(DiscountsResponse {
                codes: self.discount_codes.clone(),
                applied: self.applied_discounts.clone(),
            }),
            fulfillment: self.fulfillment.as_ref().map(fulfillment_response),
            order: self.order.clone(),
            trust: self.merchant_authorization.as_ref().map(|token| TrustResponse {
                merchant_authorization: Some(token.clone()),
            }),
            extra: Default::default(),
        }
    }
}

fn line_item_response(li: &LineItem) -> LineItemResponse {
    LineItemResponse {
        id: li.id.clone(),
        item: ItemResponse {
            id: li.item.id.clone(),
            title: li.item.title.clone(),
            price: li.item.price,
            image_url: li.item.image_url.clone(),
        },
        quantity: li.quantity,
        totals: li.totals.clone(),
    }
}

fn fulfillment_response(f: &Fulfillment) -> FulfillmentResponse {
    FulfillmentResponse {
        methods: f
            .methods
            .iter()
            .map(|m| FulfillmentMethodResponse {
                id: m.id.clone(),
                method_type: m.method_type.clone(),
                line_item_ids: m.line_item_ids.clone(),
                destinations: m
                    .destinations
                    .iter()
                    .map(|d| DestinationResponse {
                        id: d.id.clone(),
                        postal_code: d.postal_code.clone(),
                        address_country: d.address_country.clone(),
                        extra: Default::default(),
                    })
                    .collect(),
                selected_destination_id: m.selected_destination_id.clone(),
                groups: m
                    .groups
                    .iter()
                    .map(|g| FulfillmentGroupResponse {
                        id: g.id.clone(),
                        line_item_ids: g.line_item_ids.clone(),
                        options: g
                            .options
                            .iter()
                            .map(|o| FulfillmentOptionResponse {
                                id: o.id.clone(),
                                title: o.title.clone(),
                                fee: o.fee,
                            })
                            .collect(),
                        selected_option_id: g.selected_option_id.clone(),
                    })
                    .collect(),
            })
            .collect(),
    }
}

// ============================================================================
// Order snapshot
// ============================================================================

/// Per-line fulfillment progress, zeroed at order creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuantityProgress {
    pub total: u32,
    pub fulfilled: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderLineItem {
    pub id: String,
    pub item: CatalogItem,
    pub quantity: QuantityProgress,
    pub totals: Vec<Total>,
}

/// What the merchant promised: chosen method, destination, option.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FulfillmentExpectation {
    pub id: String,
    pub method_type: String,
    pub destination: Option<Destination>,
    pub description: String,
}

/// Immutable snapshot created at completion. Never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: String,
    pub checkout_id: String,
    pub permalink_url: String,
    pub line_items: Vec<OrderLineItem>,
    pub expectations: Vec<FulfillmentExpectation>,
    pub totals: Vec<Total>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> CatalogItem {
        CatalogItem {
            id: "widget-x".into(),
            title: "Industrial Widget X".into(),
            price: 55_000,
            in_stock: true,
            image_url: None,
        }
    }

    #[test]
    fn test_line_item_totals() {
        let li = LineItem::new(item(), 100);
        assert_eq!(
            merx_shared::totals::total_of(&li.totals, TotalKind::Subtotal),
            Some(5_500_000)
        );
        assert_eq!(
            merx_shared::totals::total_of(&li.totals, TotalKind::Total),
            Some(5_500_000)
        );
    }

    #[test]
    fn test_method_readiness_requires_both_selections() {
        let mut method = FulfillmentMethod {
            id: "fm_1".into(),
            method_type: "shipping".into(),
            line_item_ids: vec!["li_1".into()],
            destinations: vec![Destination {
                id: "dest_1".into(),
                postal_code: "SW1A 1AA".into(),
                address_country: "GB".into(),
            }],
            selected_destination_id: None,
            groups: vec![OptionGroup {
                id: "grp_1".into(),
                line_item_ids: vec!["li_1".into()],
                options: vec![FulfillmentOption {
                    id: "std-ship".into(),
                    title: "Standard Shipping".into(),
                    fee: 0,
                }],
                selected_option_id: None,
            }],
        };

        assert!(!method.is_ready());
        method.selected_destination_id = Some("dest_1".into());
        assert!(!method.is_ready());
        method.groups[0].selected_option_id = Some("std-ship".into());
        assert!(method.is_ready());
        // A selected id pointing at no known destination does not count.
        method.selected_destination_id = Some("dest_missing".into());
        assert!(!method.is_ready());
    }
}
