use std::sync::Arc;

use merx_checkout::{CheckoutConfig, CheckoutNegotiationEngine, CheckoutService};
use merx_core::catalog::{CatalogItem, StaticCatalog};
use merx_core::CoreError;
use merx_shared::totals::{total_of, TotalKind};
use merx_shared::wire::{
    CheckoutCreateRequest, CheckoutUpdateRequest, CompleteRequest, Credential, DestinationRequest,
    DiscountsRequest, FulfillmentMethodRequest, FulfillmentRequest, GroupSelectionRequest, ItemRef,
    LineItemCreateRequest, PaymentData, SessionStatus, TrustCompleteRequest,
};
use merx_store::InMemoryDocumentStore;

fn engine_with(config: CheckoutConfig) -> CheckoutNegotiationEngine {
    let catalog = StaticCatalog::new(vec![CatalogItem {
        id: "widget-x".into(),
        title: "Industrial Widget X".into(),
        price: 55_000,
        in_stock: true,
        image_url: None,
    }]);
    CheckoutNegotiationEngine::new(
        Arc::new(catalog),
        Arc::new(InMemoryDocumentStore::new()),
        Arc::new(InMemoryDocumentStore::new()),
        config,
    )
}

fn engine() -> CheckoutNegotiationEngine {
    engine_with(CheckoutConfig::default())
}

fn create_request() -> CheckoutCreateRequest {
    CheckoutCreateRequest {
        currency: "GBP".into(),
        line_items: vec![LineItemCreateRequest {
            quantity: 100,
            item: ItemRef {
                id: "widget-x".into(),
            },
        }],
        buyer: None,
        discounts: Some(DiscountsRequest {
            codes: vec!["PARTNER_20".into()],
        }),
        extra: Default::default(),
    }
}

fn destination_update() -> CheckoutUpdateRequest {
    CheckoutUpdateRequest {
        fulfillment: Some(FulfillmentRequest {
            methods: vec![FulfillmentMethodRequest {
                id: None,
                method_type: "shipping".into(),
                line_item_ids: vec![],
                destinations: vec![DestinationRequest {
                    id: None,
                    postal_code: "SW1A 1AA".into(),
                    address_country: "GB".into(),
                    extra: Default::default(),
                }],
                selected_destination_id: None,
                groups: vec![],
            }],
        }),
        ..Default::default()
    }
}

/// Build the follow-up update that selects the destination and an option,
/// reading ids from the previous engine response.
fn selection_update(
    session: &merx_checkout::CheckoutSession,
    option_id: &str,
) -> CheckoutUpdateRequest {
    let method = &session.fulfillment.as_ref().unwrap().methods[0];
    CheckoutUpdateRequest {
        fulfillment: Some(FulfillmentRequest {
            methods: vec![FulfillmentMethodRequest {
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
                selected_destination_id: Some(method.destinations[0].id.clone()),
                groups: vec![GroupSelectionRequest {
                    id: method.groups[0].id.clone(),
                    selected_option_id: Some(option_id.into()),
                }],
            }],
        }),
        ..Default::default()
    }
}

fn complete_request() -> CompleteRequest {
    CompleteRequest {
        payment_data: Some(PaymentData {
            credential: Some(Credential {
                kind: "token".into(),
                token: "success_token".into(),
            }),
        }),
        trust: Some(TrustCompleteRequest {
            checkout_mandate: Some("opaque.mandate.token".into()),
        }),
        extra: Default::default(),
    }
}

async fn negotiate_to_ready(engine: &CheckoutNegotiationEngine) -> merx_checkout::CheckoutSession {
    let session = engine.create(&create_request()).await.unwrap();
    let session = engine
        .update(&session.id, &destination_update())
        .await
        .unwrap();
    engine
        .update(&session.id, &selection_update(&session, "exp-ship"))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_create_starts_incomplete_by_default() {
    let engine = engine();
    let session = engine.create(&create_request()).await.unwrap();
    assert_eq!(session.status, SessionStatus::Incomplete);
    assert!(session.merchant_authorization.is_none());
    assert_eq!(total_of(&session.totals, TotalKind::Subtotal), Some(5_500_000));
    // 20% off applies from creation.
    assert_eq!(total_of(&session.totals, TotalKind::Discount), Some(1_100_000));
}

#[tokio::test]
async fn test_ready_on_create_policy() {
    let engine = engine_with(CheckoutConfig {
        ready_on_create: true,
        ..CheckoutConfig::default()
    });
    let session = engine.create(&create_request()).await.unwrap();
    assert_eq!(session.status, SessionStatus::ReadyForComplete);
    assert!(session.merchant_authorization.is_some());
}

#[tokio::test]
async fn test_create_rejects_unknown_item() {
    let engine = engine();
    let mut req = create_request();
    req.line_items[0].item.id = "no-such-item".into();
    match engine.create(&req).await {
        Err(CoreError::UnknownItem(id)) => assert_eq!(id, "no-such-item"),
        other => panic!("expected UnknownItem, got {other:?}"),
    }
}

#[tokio::test]
async fn test_create_rejects_zero_quantity() {
    let engine = engine();
    let mut req = create_request();
    req.line_items[0].quantity = 0;
    assert!(matches!(
        engine.create(&req).await,
        Err(CoreError::Validation(_))
    ));
}

#[tokio::test]
async fn test_destination_synthesizes_option_groups() {
    let engine = engine();
    let session = engine.create(&create_request()).await.unwrap();
    let session = engine
        .update(&session.id, &destination_update())
        .await
        .unwrap();

    // Destination known, option not yet chosen: still incomplete.
    assert_eq!(session.status, SessionStatus::Incomplete);
    let method = &session.fulfillment.as_ref().unwrap().methods[0];
    assert_eq!(method.groups.len(), 1);
    let ids: Vec<&str> = method.groups[0].options.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec!["std-ship", "exp-ship"]);
}

#[tokio::test]
async fn test_full_selection_reaches_ready_and_seals_total() {
    let engine = engine();
    let session = negotiate_to_ready(&engine).await;

    assert_eq!(session.status, SessionStatus::ReadyForComplete);
    assert!(session.merchant_authorization.is_some());
    assert_eq!(total_of(&session.totals, TotalKind::Fulfillment), Some(2_500));
    // 5,500,000 - 1,100,000 + 2,500 = 4,402,500; 20% tax = 880,500.
    assert_eq!(total_of(&session.totals, TotalKind::Tax), Some(880_500));
    assert_eq!(total_of(&session.totals, TotalKind::Total), Some(5_283_000));
}

#[tokio::test]
async fn test_deselection_revokes_merchant_authorization() {
    let engine = engine();
    let session = negotiate_to_ready(&engine).await;
    let sealed_token = session.merchant_authorization.clone().unwrap();

    // Dropping the option selection unseals the total.
    let mut update = selection_update(&session, "exp-ship");
    update.fulfillment.as_mut().unwrap().methods[0].groups[0].selected_option_id = None;
    let session = engine.update(&session.id, &update).await.unwrap();

    assert_eq!(session.status, SessionStatus::Incomplete);
    assert!(session.merchant_authorization.is_none());

    // Re-selecting seals a new total under a fresh token.
    let session = engine
        .update(&session.id, &selection_update(&session, "std-ship"))
        .await
        .unwrap();
    assert_eq!(session.status, SessionStatus::ReadyForComplete);
    assert_ne!(
        session.merchant_authorization.as_deref(),
        Some(sealed_token.as_str())
    );
}

#[tokio::test]
async fn test_update_unknown_session_is_not_found() {
    let engine = engine();
    assert!(matches!(
        engine.update("chk_missing", &destination_update()).await,
        Err(CoreError::NotFound("checkout", _))
    ));
}

#[tokio::test]
async fn test_complete_gated_on_selection() {
    let engine = engine();
    let session = engine.create(&create_request()).await.unwrap();
    // No fulfillment at all.
    assert!(matches!(
        engine.complete(&session.id, &complete_request()).await,
        Err(CoreError::InvalidState(..))
    ));

    // Destination set but option group unselected: still rejected.
    let session = engine
        .update(&session.id, &destination_update())
        .await
        .unwrap();
    assert!(matches!(
        engine.complete(&session.id, &complete_request()).await,
        Err(CoreError::InvalidState(..))
    ));
}

#[tokio::test]
async fn test_complete_requires_credential_and_mandate() {
    let engine = engine();
    let session = negotiate_to_ready(&engine).await;

    let mut no_credential = complete_request();
    no_credential.payment_data = None;
    assert!(matches!(
        engine.complete(&session.id, &no_credential).await,
        Err(CoreError::MissingCredential)
    ));

    let mut bad_token = complete_request();
    bad_token.payment_data.as_mut().unwrap().credential.as_mut().unwrap().token =
        "declined".into();
    assert!(matches!(
        engine.complete(&session.id, &bad_token).await,
        Err(CoreError::PaymentDeclined(_))
    ));

    let mut no_mandate = complete_request();
    no_mandate.trust = None;
    assert!(matches!(
        engine.complete(&session.id, &no_mandate).await,
        Err(CoreError::PaymentDeclined(_))
    ));

    // Payment failures leave the session untouched and non-terminal.
    let session = engine.get(&session.id).await.unwrap();
    assert_eq!(session.status, SessionStatus::ReadyForComplete);
    assert!(session.order.is_none());
}

#[tokio::test]
async fn test_complete_snapshots_order_and_links_it() {
    let engine = engine();
    let session = negotiate_to_ready(&engine).await;
    let completed = engine
        .complete(&session.id, &complete_request())
        .await
        .unwrap();

    assert_eq!(completed.status, SessionStatus::Completed);
    let order_ref = completed.order.as_ref().unwrap();
    let order = engine.get_order(&order_ref.id).await.unwrap();

    assert_eq!(order.checkout_id, session.id);
    assert_eq!(order.totals, completed.totals);
    assert_eq!(order.line_items[0].quantity.total, 100);
    assert_eq!(order.line_items[0].quantity.fulfilled, 0);
    assert_eq!(order.expectations.len(), 1);
    assert!(order.permalink_url.ends_with(&order.id));

    // Terminal: further updates and completes are re-sequencing errors.
    assert!(matches!(
        engine.update(&session.id, &destination_update()).await,
        Err(CoreError::InvalidState(..))
    ));
    assert!(matches!(
        engine.complete(&session.id, &complete_request()).await,
        Err(CoreError::InvalidState(..))
    ));
}

#[tokio::test]
async fn test_cancel_rules() {
    let engine = engine();
    let session = engine.create(&create_request()).await.unwrap();
    let cancelled = engine.cancel(&session.id).await.unwrap();
    assert_eq!(cancelled.status, SessionStatus::Cancelled);
    assert!(matches!(
        engine.cancel(&session.id).await,
        Err(CoreError::InvalidState(..))
    ));
}

// ============================================================================
// Service-level idempotency
// ============================================================================

#[tokio::test]
async fn test_service_replays_identical_create() {
    let service = CheckoutService::new(engine());
    let req = create_request();

    let first = service.create("key-1", &req).await.unwrap();
    let second = service.create("key-1", &req).await.unwrap();
    assert_eq!(first, second);

    // The replayed call produced no second session.
    let other = service.create("key-2", &req).await.unwrap();
    assert_ne!(first["id"], other["id"]);
}

#[tokio::test]
async fn test_service_conflict_leaves_original_untouched() {
    let service = CheckoutService::new(engine());
    let req = create_request();
    let first = service.create("key-1", &req).await.unwrap();

    let mut different = req.clone();
    different.line_items[0].quantity = 5;
    assert!(matches!(
        service.create("key-1", &different).await,
        Err(CoreError::IdempotencyConflict)
    ));

    let stored = service.get(first["id"].as_str().unwrap()).await.unwrap();
    assert_eq!(stored["line_items"][0]["quantity"], 100);
}

#[tokio::test]
async fn test_service_failed_mutation_releases_key() {
    let service = CheckoutService::new(engine());
    let mut bad = create_request();
    bad.line_items[0].item.id = "no-such-item".into();
    assert!(service.create("key-1", &bad).await.is_err());

    // The key is free for the corrected retry.
    let ok = service.create("key-1", &create_request()).await.unwrap();
    assert_eq!(ok["status"], "incomplete");
}

#[tokio::test]
async fn test_service_same_key_different_operation_conflicts() {
    let service = CheckoutService::new(engine());
    let created = service.create("key-1", &create_request()).await.unwrap();
    let id = created["id"].as_str().unwrap();

    assert!(matches!(
        service.update("key-1", id, &destination_update()).await,
        Err(CoreError::IdempotencyConflict)
    ));
}
