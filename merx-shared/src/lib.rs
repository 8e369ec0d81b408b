pub mod error_body;
pub mod totals;
pub mod wire;

/// Protocol version advertised in discovery profiles and response envelopes.
pub const PROTOCOL_VERSION: &str = "2026-01-11";

/// Capability name for the checkout negotiation service.
pub const CHECKOUT_CAPABILITY: &str = "dev.merx.shopping.checkout";

/// Capability name for mandate-carrying completion.
pub const MANDATE_CAPABILITY: &str = "dev.merx.shopping.trust_mandate";

/// Well-known path where a merchant serves its discovery profile.
pub const DISCOVERY_PATH: &str = "/.well-known/merx";

/// Generate a prefixed opaque identifier, e.g. `chk_4f9d…`.
pub fn new_id(prefix: &str) -> String {
    format!("{}_{}", prefix, uuid::Uuid::new_v4().simple())
}
