//! The well-known discovery endpoint.

use std::collections::HashMap;

use axum::{extract::State, routing::get, Json, Router};

use merx_core::catalog::CatalogItem;
use merx_discovery::{
    CapabilityEntry, DiscoveryProfile, InventoryEntry, ProfileEnvelope, RestBinding, ServiceEntry,
};
use merx_shared::{CHECKOUT_CAPABILITY, DISCOVERY_PATH, PROTOCOL_VERSION};

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route(DISCOVERY_PATH, get(get_profile))
}

async fn get_profile(State(state): State<AppState>) -> Json<DiscoveryProfile> {
    Json(state.profile.as_ref().clone())
}

/// Assemble the profile advertised to buyer agents. The checkout capability
/// hangs off the shopping service family, and the inventory map mirrors the
/// catalog so agents can source without opening a session.
pub fn build_profile(public_base_url: &str, items: &[CatalogItem]) -> DiscoveryProfile {
    let service_family = CHECKOUT_CAPABILITY
        .rsplit_once('.')
        .map(|(family, _)| family)
        .unwrap_or(CHECKOUT_CAPABILITY);

    let mut services = HashMap::new();
    services.insert(
        service_family.to_string(),
        ServiceEntry {
            version: PROTOCOL_VERSION.to_string(),
            spec: None,
            rest: RestBinding {
                endpoint: public_base_url.trim_end_matches('/').to_string(),
                schema: None,
            },
        },
    );

    let inventory = items
        .iter()
        .map(|item| {
            (
                item.id.clone(),
                InventoryEntry {
                    in_stock: item.in_stock,
                    price: item.price,
                },
            )
        })
        .collect();

    DiscoveryProfile {
        merx: ProfileEnvelope {
            version: PROTOCOL_VERSION.to_string(),
            services,
            capabilities: vec![CapabilityEntry {
                name: CHECKOUT_CAPABILITY.to_string(),
                version: PROTOCOL_VERSION.to_string(),
                extends: None,
            }],
        },
        inventory,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_advertises_checkout_capability() {
        let items = vec![CatalogItem {
            id: "widget-x".into(),
            title: "Widget".into(),
            price: 55_000,
            in_stock: true,
            image_url: None,
        }];
        let profile = build_profile("http://localhost:8182/", &items);

        assert_eq!(
            profile.capability_endpoint(CHECKOUT_CAPABILITY),
            Some("http://localhost:8182")
        );
        assert_eq!(
            profile.inventory.get("widget-x"),
            Some(&InventoryEntry {
                in_stock: true,
                price: 55_000
            })
        );
    }
}
