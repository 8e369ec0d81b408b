use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::CoreResult;

/// A sellable item as known to the merchant's catalog collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogItem {
    pub id: String,
    pub title: String,
    /// Unit price in minor currency units.
    pub price: i64,
    pub in_stock: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Seam to the external catalog. The negotiation engine resolves every line
/// item through this trait; listings themselves are out of scope.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Look up one item by id. `Ok(None)` means the item does not exist.
    async fn item(&self, id: &str) -> CoreResult<Option<CatalogItem>>;
}

/// Fixed in-memory catalog, used by the demo merchant and tests.
#[derive(Debug, Default)]
pub struct StaticCatalog {
    items: HashMap<String, CatalogItem>,
}

impl StaticCatalog {
    pub fn new(items: Vec<CatalogItem>) -> Self {
        Self {
            items: items.into_iter().map(|i| (i.id.clone(), i)).collect(),
        }
    }
}

#[async_trait]
impl CatalogProvider for StaticCatalog {
    async fn item(&self, id: &str) -> CoreResult<Option<CatalogItem>> {
        Ok(self.items.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_catalog_lookup() {
        let catalog = StaticCatalog::new(vec![CatalogItem {
            id: "widget-x".into(),
            title: "Industrial Widget X".into(),
            price: 55_000,
            in_stock: true,
            image_url: None,
        }]);

        let hit = catalog.item("widget-x").await.unwrap();
        assert_eq!(hit.unwrap().price, 55_000);
        assert!(catalog.item("missing").await.unwrap().is_none());
    }
}
