pub mod engine;
pub mod models;
pub mod service;
pub mod totals;

pub use engine::{CheckoutConfig, CheckoutNegotiationEngine, OptionConfig};
pub use models::{CheckoutSession, LineItem, Order};
pub use service::CheckoutService;
pub use totals::{compute_totals, DiscountRule, TaxPolicy};
