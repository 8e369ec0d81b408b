//! Buyer-side purchase orchestration.
//!
//! Drives one purchase attempt end to end: discover a viable supplier,
//! evaluate spending governance (suspending for manual sign-off when
//! required), then negotiate the checkout to completion. Every mutating call
//! gets a fresh idempotency key. The payment mandate is bound to the
//! merchant's final sealed total, never to the locally estimated price.

use std::sync::Arc;

use merx_core::mandate::PaymentMandate;
use merx_discovery::{SupplierDiscoveryResolver, SupplierQuote};
use merx_shared::error_body::ErrorBody;
use merx_shared::new_id;
use merx_shared::totals::{total_of, TotalKind};
use merx_shared::wire::{
    CheckoutCreateRequest, CheckoutResponse, CheckoutUpdateRequest, CompleteRequest, Credential,
    DestinationRequest, DiscountsRequest, FulfillmentMethodRequest, FulfillmentRequest,
    GroupSelectionRequest, ItemRef, LineItemCreateRequest, OrderRef, PaymentData, SessionStatus,
    TrustCompleteRequest,
};

use crate::approval::{ApprovalGateway, ApprovalRequest, ApprovalVerdict};
use crate::client::{HttpMerchantClient, MerchantClient};
use crate::governance::{evaluate, GovernanceDecision, SpendingPolicy};

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Merchant error {status}: {} ({})", body.detail, body.code)]
    Merchant { status: u16, body: ErrorBody },

    #[error("No viable supplier offered the item")]
    NoViableSupplier,

    #[error("Manual approval was denied or timed out")]
    ApprovalDenied,

    #[error("Expected checkout status {expected}, merchant reported {actual}")]
    UnexpectedStatus {
        expected: &'static str,
        actual: String,
    },

    #[error("Protocol violation: {0}")]
    Protocol(String),
}

/// Builds a protocol client for a discovered endpoint. Seam for tests to
/// run the negotiation in-process.
pub trait MerchantConnector: Send + Sync {
    fn connect(&self, api_endpoint: &str) -> Arc<dyn MerchantClient>;
}

pub struct HttpConnector {
    pub agent_identity: String,
}

impl MerchantConnector for HttpConnector {
    fn connect(&self, api_endpoint: &str) -> Arc<dyn MerchantClient> {
        Arc::new(HttpMerchantClient::new(api_endpoint, &self.agent_identity))
    }
}

/// One purchase attempt, as known before any merchant contact.
#[derive(Debug, Clone)]
pub struct PurchaseRequest {
    pub item_id: String,
    pub quantity: u32,
    /// Reference price per unit, minor units.
    pub standard_price: i64,
    pub currency: String,
    pub discount_codes: Vec<String>,
    pub ship_to_postal_code: String,
    pub ship_to_country: String,
    /// Fulfillment option to select when offered; falls back to the first.
    pub preferred_option_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PurchaseOutcome {
    pub checkout_id: String,
    pub order: OrderRef,
    pub supplier: SupplierQuote,
    pub decision: GovernanceDecision,
    pub mandate: PaymentMandate,
    /// The merchant's sealed final total the mandate was bound to.
    pub final_total: i64,
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub capability: String,
    /// Credential token presented at completion.
    pub payment_token: String,
    /// Opaque buyer authorization embedded in the payment mandate.
    pub user_authorization: String,
    pub merchant_agent_label: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            capability: merx_shared::CHECKOUT_CAPABILITY.to_string(),
            payment_token: "success_token".into(),
            user_authorization: new_id("usr_auth"),
            merchant_agent_label: "supplier".into(),
        }
    }
}

pub struct TransactionOrchestrator {
    resolver: SupplierDiscoveryResolver,
    connector: Arc<dyn MerchantConnector>,
    approvals: Arc<dyn ApprovalGateway>,
    policy: SpendingPolicy,
    config: AgentConfig,
}

impl TransactionOrchestrator {
    pub fn new(
        resolver: SupplierDiscoveryResolver,
        connector: Arc<dyn MerchantConnector>,
        approvals: Arc<dyn ApprovalGateway>,
        policy: SpendingPolicy,
        config: AgentConfig,
    ) -> Self {
        Self {
            resolver,
            connector,
            approvals,
            policy,
            config,
        }
    }

    /// Run one purchase attempt against the best candidate supplier.
    pub async fn execute(
        &self,
        request: &PurchaseRequest,
        candidate_endpoints: &[String],
    ) -> Result<PurchaseOutcome, AgentError> {
        let supplier = self.pick_supplier(request, candidate_endpoints).await?;
        tracing::info!(
            endpoint = %supplier.api_endpoint,
            unit_price = supplier.unit_price,
            "supplier selected"
        );

        let decision = evaluate(
            &request.item_id,
            supplier.unit_price,
            request.standard_price,
            request.quantity,
            &self.policy,
        );
        if !decision.approved {
            tracing::info!(
                variance = decision.variance,
                total_cost = decision.total_cost,
                "policy requires manual sign-off, suspending"
            );
            let verdict = self
                .approvals
                .request_approval(ApprovalRequest {
                    item_id: request.item_id.clone(),
                    quantity: request.quantity,
                    unit_price: supplier.unit_price,
                    decision: decision.clone(),
                })
                .await;
            if verdict != ApprovalVerdict::Approved {
                return Err(AgentError::ApprovalDenied);
            }
        }

        let client = self.connector.connect(&supplier.api_endpoint);
        let checkout = self.negotiate(client.as_ref(), request).await?;

        if checkout.status != SessionStatus::ReadyForComplete {
            return Err(AgentError::UnexpectedStatus {
                expected: "ready_for_complete",
                actual: status_label(checkout.status),
            });
        }

        // Bind the mandate to the merchant's sealed total from the last
        // response, not to any local estimate.
        let final_total = total_of(&checkout.totals, TotalKind::Total)
            .ok_or_else(|| AgentError::Protocol("response carried no total entry".into()))?;
        let mandate = PaymentMandate::new(
            &checkout.id,
            &checkout.currency,
            final_total,
            &self.config.merchant_agent_label,
            &self.config.user_authorization,
        );
        tracing::info!(checkout_id = %checkout.id, final_total, "mandate bound to sealed total");

        let completed = client
            .complete_checkout(
                &new_id("idem"),
                &checkout.id,
                &CompleteRequest {
                    payment_data: Some(PaymentData {
                        credential: Some(Credential {
                            kind: "token".into(),
                            token: self.config.payment_token.clone(),
                        }),
                    }),
                    trust: Some(TrustCompleteRequest {
                        checkout_mandate: Some(mandate.user_authorization.clone()),
                    }),
                    extra: Default::default(),
                },
            )
            .await?;

        if completed.status != SessionStatus::Completed {
            return Err(AgentError::UnexpectedStatus {
                expected: "completed",
                actual: status_label(completed.status),
            });
        }
        let order = completed
            .order
            .ok_or_else(|| AgentError::Protocol("completed checkout carried no order".into()))?;

        tracing::info!(order_id = %order.id, "purchase completed");
        Ok(PurchaseOutcome {
            checkout_id: completed.id,
            order,
            supplier,
            decision,
            mandate,
            final_total,
        })
    }

    async fn pick_supplier(
        &self,
        request: &PurchaseRequest,
        candidate_endpoints: &[String],
    ) -> Result<SupplierQuote, AgentError> {
        let mut quotes = self
            .resolver
            .discover(candidate_endpoints, &self.config.capability, &request.item_id)
            .await;
        quotes.retain(|q| q.in_stock);
        // Ranking is the buyer's concern: cheapest first.
        quotes.sort_by_key(|q| q.unit_price);
        quotes.into_iter().next().ok_or(AgentError::NoViableSupplier)
    }

    /// Create the session and supply whatever negotiation input the merchant
    /// still needs until it reports `ready_for_complete` (or stops making
    /// progress).
    async fn negotiate(
        &self,
        client: &dyn MerchantClient,
        request: &PurchaseRequest,
    ) -> Result<CheckoutResponse, AgentError> {
        let mut checkout = client
            .create_checkout(
                &new_id("idem"),
                &CheckoutCreateRequest {
                    currency: request.currency.clone(),
                    line_items: vec![LineItemCreateRequest {
                        quantity: request.quantity,
                        item: ItemRef {
                            id: request.item_id.clone(),
                        },
                    }],
                    buyer: None,
                    discounts: Some(DiscountsRequest {
                        codes: request.discount_codes.clone(),
                    }),
                    extra: Default::default(),
                },
            )
            .await?;

        if checkout.status == SessionStatus::Incomplete {
            tracing::info!(checkout_id = %checkout.id, "incomplete, supplying destination");
            checkout = client
                .update_checkout(
                    &new_id("idem"),
                    &checkout.id,
                    &self.destination_update(request, &checkout),
                )
                .await?;
        }

        if checkout.status == SessionStatus::Incomplete {
            tracing::info!(checkout_id = %checkout.id, "incomplete, selecting fulfillment option");
            let update = self.selection_update(request, &checkout)?;
            checkout = client
                .update_checkout(&new_id("idem"), &checkout.id, &update)
                .await?;
        }

        Ok(checkout)
    }

    fn destination_update(
        &self,
        request: &PurchaseRequest,
        checkout: &CheckoutResponse,
    ) -> CheckoutUpdateRequest {
        CheckoutUpdateRequest {
            fulfillment: Some(FulfillmentRequest {
                methods: vec![FulfillmentMethodRequest {
                    id: None,
                    method_type: "shipping".into(),
                    line_item_ids: checkout.line_items.iter().map(|li| li.id.clone()).collect(),
                    destinations: vec![DestinationRequest {
                        id: None,
                        postal_code: request.ship_to_postal_code.clone(),
                        address_country: request.ship_to_country.clone(),
                        extra: Default::default(),
                    }],
                    selected_destination_id: None,
                    groups: vec![],
                }],
            }),
            ..Default::default()
        }
    }

    /// Select the first destination and one option per group, preferring the
    /// configured option id when the merchant offers it.
    fn selection_update(
        &self,
        request: &PurchaseRequest,
        checkout: &CheckoutResponse,
    ) -> Result<CheckoutUpdateRequest, AgentError> {
        let fulfillment = checkout
            .fulfillment
            .as_ref()
            .ok_or_else(|| AgentError::Protocol("incomplete checkout without fulfillment".into()))?;

        let mut methods = Vec::with_capacity(fulfillment.methods.len());
        for method in &fulfillment.methods {
            let destination = method
                .destinations
                .first()
                .ok_or_else(|| AgentError::Protocol("method offered no destinations".into()))?;

            let mut groups = Vec::with_capacity(method.groups.len());
            for group in &method.groups {
                let option = request
                    .preferred_option_id
                    .as_ref()
                    .and_then(|id| group.options.iter().find(|o| o.id == *id))
                    .or_else(|| group.options.first())
                    .ok_or_else(|| AgentError::Protocol("option group offered no options".into()))?;
                groups.push(GroupSelectionRequest {
                    id: group.id.clone(),
                    selected_option_id: Some(option.id.clone()),
                });
            }

            methods.push(FulfillmentMethodRequest {
                id: Some(method.id.clone()),
                method_type: method.method_type.clone(),
                line_item_ids: method.line_item_ids.clone(),
                destinations: method
                    .destinations
                    .iter()
                    .map(|d| DestinationRequest {
                        id: Some(d.id.clone()),
                        postal_code: d.postal_code.clone(),
                        address_country: d.address_country.clone(),
                        extra: Default::default(),
                    })
                    .collect(),
                selected_destination_id: Some(destination.id.clone()),
                groups,
            });
        }

        Ok(CheckoutUpdateRequest {
            fulfillment: Some(FulfillmentRequest { methods }),
            ..Default::default()
        })
    }
}

fn status_label(status: SessionStatus) -> String {
    serde_json::to_value(status)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| format!("{status:?}"))
}
