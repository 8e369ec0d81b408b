use std::sync::Arc;

use merx_checkout::CheckoutService;
use merx_discovery::DiscoveryProfile;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<CheckoutService>,
    /// Static profile document served under the well-known path.
    pub profile: Arc<DiscoveryProfile>,
}
