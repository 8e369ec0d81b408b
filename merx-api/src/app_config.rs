//! Layered file + environment configuration.

use std::env;

use serde::Deserialize;

use merx_checkout::{CheckoutConfig, DiscountRule, OptionConfig, TaxPolicy};
use merx_core::catalog::CatalogItem;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub checkout: CheckoutPolicy,
    pub catalog: Vec<CatalogSeed>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Externally reachable base URL, advertised in the discovery profile
    /// and used for order permalinks.
    pub public_base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CheckoutPolicy {
    #[serde(default)]
    pub ready_on_create: bool,
    pub accepted_token: String,
    pub tax_rate: f64,
    #[serde(default)]
    pub discounts: Vec<DiscountRule>,
    pub standard_shipping: ShippingOption,
    pub express_shipping: ShippingOption,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ShippingOption {
    pub id: String,
    pub title: String,
    pub fee: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogSeed {
    pub id: String,
    pub title: String,
    pub price: i64,
    #[serde(default = "default_in_stock")]
    pub in_stock: bool,
    pub image_url: Option<String>,
}

fn default_in_stock() -> bool {
    true
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("MERX").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    pub fn checkout_config(&self) -> CheckoutConfig {
        CheckoutConfig {
            ready_on_create: self.checkout.ready_on_create,
            accepted_token: self.checkout.accepted_token.clone(),
            discount_rules: self.checkout.discounts.clone(),
            tax: TaxPolicy {
                rate: self.checkout.tax_rate,
            },
            standard_option: option_config(&self.checkout.standard_shipping),
            express_option: option_config(&self.checkout.express_shipping),
            order_base_url: self.server.public_base_url.clone(),
        }
    }

    pub fn catalog_items(&self) -> Vec<CatalogItem> {
        self.catalog
            .iter()
            .map(|seed| CatalogItem {
                id: seed.id.clone(),
                title: seed.title.clone(),
                price: seed.price,
                in_stock: seed.in_stock,
                image_url: seed.image_url.clone(),
            })
            .collect()
    }
}

fn option_config(opt: &ShippingOption) -> OptionConfig {
    OptionConfig {
        id: opt.id.clone(),
        title: opt.title.clone(),
        fee: opt.fee,
    }
}
