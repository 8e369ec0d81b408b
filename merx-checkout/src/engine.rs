//! The merchant-side checkout negotiation state machine.
//!
//! States: `incomplete -> ready_for_complete -> completed`, with `cancelled`
//! reachable from either non-terminal state. Every mutation re-runs the
//! totals pipeline. Mutations on one session are serialized through a
//! per-session lock, and writes go through the store's compare-and-swap.

use std::collections::HashMap;
use std::sync::Arc;

use merx_core::catalog::CatalogProvider;
use merx_core::{CoreError, CoreResult};
use merx_shared::new_id;
use merx_shared::wire::{
    CheckoutCreateRequest, CheckoutUpdateRequest, CompleteRequest, FulfillmentRequest, OrderRef,
    SessionStatus,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use merx_store::{DocumentStore, Versioned};

use crate::models::{
    CheckoutSession, Destination, Fulfillment, FulfillmentExpectation, FulfillmentMethod,
    FulfillmentOption, LineItem, OptionGroup, Order, OrderLineItem, QuantityProgress,
};
use crate::totals::{compute_totals, DiscountRule, TaxPolicy};

/// One configurable fulfillment option offered in synthesized groups.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OptionConfig {
    pub id: String,
    pub title: String,
    pub fee: i64,
}

/// Merchant policy for the negotiation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutConfig {
    /// When true, a fresh checkout that needs no fulfillment input starts
    /// `ready_for_complete` instead of `incomplete`. Default is the
    /// incomplete-first policy (the buyer follows up with an update).
    pub ready_on_create: bool,
    /// Stand-in for a real authorization check: the only accepted
    /// payment-credential token.
    pub accepted_token: String,
    pub discount_rules: Vec<DiscountRule>,
    pub tax: TaxPolicy,
    /// Options synthesized into a group once a destination is known.
    pub standard_option: OptionConfig,
    pub express_option: OptionConfig,
    /// Base URL for order permalinks.
    pub order_base_url: String,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            ready_on_create: false,
            accepted_token: "success_token".into(),
            discount_rules: vec![DiscountRule {
                code: "PARTNER_20".into(),
                title: "Partner 20% Off".into(),
                percent_off: 20,
            }],
            tax: TaxPolicy { rate: 0.2 },
            standard_option: OptionConfig {
                id: "std-ship".into(),
                title: "Standard Shipping (Free)".into(),
                fee: 0,
            },
            express_option: OptionConfig {
                id: "exp-ship".into(),
                title: "Express Shipping".into(),
                fee: 2_500,
            },
            order_base_url: "http://localhost:8183".into(),
        }
    }
}

pub struct CheckoutNegotiationEngine {
    catalog: Arc<dyn CatalogProvider>,
    sessions: Arc<dyn DocumentStore<CheckoutSession>>,
    orders: Arc<dyn DocumentStore<Order>>,
    config: CheckoutConfig,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl CheckoutNegotiationEngine {
    pub fn new(
        catalog: Arc<dyn CatalogProvider>,
        sessions: Arc<dyn DocumentStore<CheckoutSession>>,
        orders: Arc<dyn DocumentStore<Order>>,
        config: CheckoutConfig,
    ) -> Self {
        Self {
            catalog,
            sessions,
            orders,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &CheckoutConfig {
        &self.config
    }

    /// Create a session from line-item specs, resolving each item against
    /// the catalog collaborator.
    pub async fn create(&self, req: &CheckoutCreateRequest) -> CoreResult<CheckoutSession> {
        if req.currency.trim().is_empty() {
            return Err(CoreError::Validation("currency is required".into()));
        }
        if req.line_items.is_empty() {
            return Err(CoreError::Validation(
                "at least one line item is required".into(),
            ));
        }

        let mut line_items = Vec::with_capacity(req.line_items.len());
        for spec in &req.line_items {
            if spec.quantity == 0 {
                return Err(CoreError::Validation(format!(
                    "quantity must be >= 1 for item {}",
                    spec.item.id
                )));
            }
            let item = self
                .catalog
                .item(&spec.item.id)
                .await?
                .ok_or_else(|| CoreError::UnknownItem(spec.item.id.clone()))?;
            line_items.push(LineItem::new(item, spec.quantity));
        }

        let now = chrono::Utc::now();
        let mut session = CheckoutSession {
            id: new_id("chk"),
            status: SessionStatus::Incomplete,
            currency: req.currency.clone(),
            line_items,
            buyer: req.buyer.clone(),
            discount_codes: req
                .discounts
                .as_ref()
                .map(|d| d.codes.clone())
                .unwrap_or_default(),
            applied_discounts: Vec::new(),
            fulfillment: None,
            totals: Vec::new(),
            order: None,
            merchant_authorization: None,
            created_at: now,
            updated_at: now,
        };

        self.recompute(&mut session);
        self.sessions.put(&session.id, session.clone()).await;
        tracing::info!(session_id = %session.id, status = ?session.status, "checkout created");
        Ok(session)
    }

    /// Merge partial negotiation input and re-run the totals pipeline.
    /// Last-write-wins per supplied field; absent fields are untouched.
    pub async fn update(
        &self,
        session_id: &str,
        req: &CheckoutUpdateRequest,
    ) -> CoreResult<CheckoutSession> {
        let lock = self.session_lock(session_id).await;
        let _guard = lock.lock().await;

        let Versioned { version, value: mut session } = self.load(session_id).await?;
        if session.status.is_terminal() {
            return Err(CoreError::InvalidState(
                status_name(session.status),
                "session no longer accepts updates".into(),
            ));
        }

        if let Some(buyer) = &req.buyer {
            session.buyer = Some(buyer.clone());
        }
        if let Some(discounts) = &req.discounts {
            session.discount_codes = discounts.codes.clone();
        }
        if let Some(fulfillment) = &req.fulfillment {
            session.fulfillment = Some(self.merge_fulfillment(&session, fulfillment)?);
        }

        self.recompute(&mut session);
        session.updated_at = chrono::Utc::now();
        self.write(session_id, version, session.clone()).await?;
        tracing::info!(session_id, status = ?session.status, "checkout updated");
        Ok(session)
    }

    /// Finalize the session: verify the credential and trust mandate, snapshot
    /// an immutable order, and atomically link it while marking the session
    /// completed.
    pub async fn complete(
        &self,
        session_id: &str,
        req: &CompleteRequest,
    ) -> CoreResult<CheckoutSession> {
        let lock = self.session_lock(session_id).await;
        let _guard = lock.lock().await;

        let Versioned { version, value: mut session } = self.load(session_id).await?;
        if session.status != SessionStatus::ReadyForComplete {
            return Err(CoreError::InvalidState(
                status_name(session.status),
                "fulfillment destination and option must be selected before completion".into(),
            ));
        }

        let credential = req
            .payment_data
            .as_ref()
            .and_then(|p| p.credential.as_ref())
            .ok_or(CoreError::MissingCredential)?;
        if credential.kind != "token" {
            return Err(CoreError::MissingCredential);
        }
        if credential.token != self.config.accepted_token {
            return Err(CoreError::PaymentDeclined(
                "credential token rejected".into(),
            ));
        }
        if req
            .trust
            .as_ref()
            .and_then(|t| t.checkout_mandate.as_deref())
            .map(str::is_empty)
            .unwrap_or(true)
        {
            return Err(CoreError::PaymentDeclined("trust mandate missing".into()));
        }

        let order = self.snapshot_order(&session);
        self.orders.put(&order.id, order.clone()).await;

        session.status = SessionStatus::Completed;
        session.order = Some(OrderRef {
            id: order.id.clone(),
            permalink_url: order.permalink_url.clone(),
        });
        session.updated_at = chrono::Utc::now();
        self.write(session_id, version, session.clone()).await?;
        tracing::info!(session_id, order_id = %order.id, "checkout completed");
        Ok(session)
    }

    /// Cancel a non-terminal session.
    pub async fn cancel(&self, session_id: &str) -> CoreResult<CheckoutSession> {
        let lock = self.session_lock(session_id).await;
        let _guard = lock.lock().await;

        let Versioned { version, value: mut session } = self.load(session_id).await?;
        if session.status.is_terminal() {
            return Err(CoreError::InvalidState(
                status_name(session.status),
                "session is already terminal".into(),
            ));
        }
        session.status = SessionStatus::Cancelled;
        session.updated_at = chrono::Utc::now();
        self.write(session_id, version, session.clone()).await?;
        tracing::info!(session_id, "checkout cancelled");
        Ok(session)
    }

    pub async fn get(&self, session_id: &str) -> CoreResult<CheckoutSession> {
        Ok(self.load(session_id).await?.value)
    }

    pub async fn get_order(&self, order_id: &str) -> CoreResult<Order> {
        self.orders
            .get(order_id)
            .await
            .map(|v| v.value)
            .ok_or_else(|| CoreError::NotFound("order", order_id.to_string()))
    }

    // ------------------------------------------------------------------

    async fn load(&self, session_id: &str) -> CoreResult<Versioned<CheckoutSession>> {
        self.sessions
            .get(session_id)
            .await
            .ok_or_else(|| CoreError::NotFound("checkout", session_id.to_string()))
    }

    async fn write(
        &self,
        session_id: &str,
        expected_version: u64,
        session: CheckoutSession,
    ) -> CoreResult<()> {
        // Under the per-session lock this can only fail if something wrote
        // around the engine.
        if self
            .sessions
            .compare_and_swap(session_id, expected_version, session)
            .await
        {
            Ok(())
        } else {
            Err(CoreError::Internal(format!(
                "concurrent modification of session {session_id}"
            )))
        }
    }

    async fn session_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Re-run the totals pipeline and re-derive status and the sealed-total
    /// authorization token.
    fn recompute(&self, session: &mut CheckoutSession) {
        let fee = session.selected_fulfillment_fee();
        let (totals, applied) = compute_totals(
            &session.line_items,
            &session.discount_codes,
            fee,
            &self.config.discount_rules,
            &self.config.tax,
        );
        session.totals = totals;
        session.applied_discounts = applied;

        if session.status.is_terminal() {
            return;
        }
        let ready = session.fulfillment_ready()
            || (self.config.ready_on_create && session.fulfillment.is_none());
        session.status = if ready {
            SessionStatus::ReadyForComplete
        } else {
            SessionStatus::Incomplete
        };
        // The token vouches for a sealed total; it must not survive a
        // mutation that unseals the session.
        if ready {
            if session.merchant_authorization.is_none() {
                session.merchant_authorization = Some(new_id("mrc_auth"));
            }
        } else {
            session.merchant_authorization = None;
        }
    }

    /// Build the session's fulfillment from an update request, assigning ids,
    /// synthesizing option groups, and validating selections.
    fn merge_fulfillment(
        &self,
        session: &CheckoutSession,
        req: &FulfillmentRequest,
    ) -> CoreResult<Fulfillment> {
        let mut methods = Vec::with_capacity(req.methods.len());
        for m in &req.methods {
            let line_item_ids = if m.line_item_ids.is_empty() {
                session.line_items.iter().map(|li| li.id.clone()).collect()
            } else {
                for id in &m.line_item_ids {
                    if !session.line_items.iter().any(|li| li.id == *id) {
                        return Err(CoreError::Validation(format!("unknown line item: {id}")));
                    }
                }
                m.line_item_ids.clone()
            };

            let destinations: Vec<Destination> = m
                .destinations
                .iter()
                .map(|d| Destination {
                    id: d.id.clone().unwrap_or_else(|| new_id("dest")),
                    postal_code: d.postal_code.clone(),
                    address_country: d.address_country.clone(),
                })
                .collect();

            // Carry forward groups from the previous round of this method so
            // option ids stay stable across updates.
            let previous = session.fulfillment.as_ref().and_then(|f| {
                f.methods
                    .iter()
                    .find(|prev| Some(&prev.id) == m.id.as_ref())
            });
            let mut groups = previous.map(|p| p.groups.clone()).unwrap_or_default();
            if groups.is_empty() && !destinations.is_empty() {
                groups = vec![self.default_group(&line_item_ids)];
            }

            for selection in &m.groups {
                let group = groups
                    .iter_mut()
                    .find(|g| g.id == selection.id)
                    .ok_or_else(|| {
                        CoreError::Validation(format!("unknown option group: {}", selection.id))
                    })?;
                if let Some(option_id) = &selection.selected_option_id {
                    if !group.options.iter().any(|o| o.id == *option_id) {
                        return Err(CoreError::Validation(format!(
                            "unknown fulfillment option: {option_id}"
                        )));
                    }
                }
                group.selected_option_id = selection.selected_option_id.clone();
            }

            if let Some(dest_id) = &m.selected_destination_id {
                if !destinations.iter().any(|d| d.id == *dest_id) {
                    return Err(CoreError::Validation(format!(
                        "unknown destination: {dest_id}"
                    )));
                }
            }

            methods.push(FulfillmentMethod {
                id: m.id.clone().unwrap_or_else(|| new_id("fm")),
                method_type: m.method_type.clone(),
                line_item_ids,
                destinations,
                selected_destination_id: m.selected_destination_id.clone(),
                groups,
            });
        }
        Ok(Fulfillment { methods })
    }

    fn default_group(&self, line_item_ids: &[String]) -> OptionGroup {
        let to_option = |cfg: &OptionConfig| FulfillmentOption {
            id: cfg.id.clone(),
            title: cfg.title.clone(),
            fee: cfg.fee,
        };
        OptionGroup {
            id: new_id("grp"),
            line_item_ids: line_item_ids.to_vec(),
            options: vec![
                to_option(&self.config.standard_option),
                to_option(&self.config.express_option),
            ],
            selected_option_id: None,
        }
    }

    fn snapshot_order(&self, session: &CheckoutSession) -> Order {
        let order_id = new_id("ord");
        let expectations = session
            .fulfillment
            .as_ref()
            .map(|f| {
                f.methods
                    .iter()
                    .map(|m| FulfillmentExpectation {
                        id: new_id("exp"),
                        method_type: m.method_type.clone(),
                        destination: m.selected_destination().cloned(),
                        description: m
                            .groups
                            .iter()
                            .filter_map(|g| g.selected_option())
                            .map(|o| o.title.clone())
                            .collect::<Vec<_>>()
                            .join(", "),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Order {
            id: order_id.clone(),
            checkout_id: session.id.clone(),
            permalink_url: format!("{}/orders/{}", self.config.order_base_url, order_id),
            line_items: session
                .line_items
                .iter()
                .map(|li| OrderLineItem {
                    id: li.id.clone(),
                    item: li.item.clone(),
                    quantity: QuantityProgress {
                        total: li.quantity,
                        fulfilled: 0,
                    },
                    totals: li.totals.clone(),
                })
                .collect(),
            expectations,
            totals: session.totals.clone(),
            created_at: chrono::Utc::now(),
        }
    }
}

fn status_name(status: SessionStatus) -> String {
    // snake_case, matching the wire representation.
    serde_json::to_value(status)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| format!("{status:?}"))
}
