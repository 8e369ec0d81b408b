//! Discovery-profile document served under the well-known path.
//!
//! A machine-readable advertisement of a merchant's capabilities and their
//! transport endpoints, plus a small inventory map for capability-aware
//! sourcing.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RestBinding {
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceEntry {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec: Option<String>,
    pub rest: RestBinding,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CapabilityEntry {
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfileEnvelope {
    pub version: String,
    /// Capability map keyed by service name.
    pub services: HashMap<String, ServiceEntry>,
    #[serde(default)]
    pub capabilities: Vec<CapabilityEntry>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct InventoryEntry {
    pub in_stock: bool,
    /// Unit price in minor currency units.
    pub price: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscoveryProfile {
    pub merx: ProfileEnvelope,
    /// Inventory keyed by item id.
    #[serde(default)]
    pub inventory: HashMap<String, InventoryEntry>,
}

impl DiscoveryProfile {
    /// Endpoint of the service advertising `capability`, if any. The
    /// capability must be listed and a service of the same family must carry
    /// a REST binding.
    pub fn capability_endpoint(&self, capability: &str) -> Option<&str> {
        self.merx
            .capabilities
            .iter()
            .find(|c| c.name == capability)?;
        self.merx
            .services
            .iter()
            .find(|(name, _)| capability.starts_with(name.as_str()))
            .map(|(_, entry)| entry.rest.endpoint.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> DiscoveryProfile {
        serde_json::from_value(serde_json::json!({
            "merx": {
                "version": "2026-01-11",
                "services": {
                    "dev.merx.shopping": {
                        "version": "2026-01-11",
                        "spec": "https://merx.dev/specs/shopping",
                        "rest": {"endpoint": "http://supplier-b/api/v1"}
                    }
                },
                "capabilities": [
                    {"name": "dev.merx.shopping.checkout", "version": "2026-01-11"}
                ]
            },
            "inventory": {
                "widget-x": {"in_stock": true, "price": 55000}
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_capability_endpoint_resolution() {
        let p = profile();
        assert_eq!(
            p.capability_endpoint("dev.merx.shopping.checkout"),
            Some("http://supplier-b/api/v1")
        );
        assert_eq!(p.capability_endpoint("dev.merx.shopping.returns"), None);
    }

    #[test]
    fn test_inventory_parsing() {
        let p = profile();
        let entry = p.inventory.get("widget-x").unwrap();
        assert!(entry.in_stock);
        assert_eq!(entry.price, 55_000);
    }
}
