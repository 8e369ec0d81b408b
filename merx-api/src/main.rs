use std::net::SocketAddr;
use std::sync::Arc;

use merx_api::{app, discovery, AppState};
use merx_checkout::{CheckoutNegotiationEngine, CheckoutService};
use merx_core::catalog::StaticCatalog;
use merx_store::InMemoryDocumentStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "merx_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = merx_api::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Merx API on port {}", config.server.port);

    let items = config.catalog_items();
    let profile = discovery::build_profile(&config.server.public_base_url, &items);

    let engine = CheckoutNegotiationEngine::new(
        Arc::new(StaticCatalog::new(items)),
        Arc::new(InMemoryDocumentStore::new()),
        Arc::new(InMemoryDocumentStore::new()),
        config.checkout_config(),
    );

    let state = AppState {
        service: Arc::new(CheckoutService::new(engine)),
        profile: Arc::new(profile),
    };

    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
