use std::net::SocketAddr;
use std::sync::Arc;

use feira_api::{
    app,
    state::{AppState, AuthConfig},
};
use feira_catalog::pricing::{PricingConfig, PricingEngine};
use feira_core::payment::MockGateway;
use feira_order::checkout::CheckoutService;
use feira_order::tracking::PlainFormatter;
use feira_order::workflow::DeliveryWorkflow;
use feira_store::{DbClient, PgCatalog, PgDirectory, PgOrderStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "feira_api=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = feira_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Feira API on port {}", config.server.port);

    let db = DbClient::new(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");
    db.migrate().await.expect("Failed to run migrations");

    let catalog = Arc::new(PgCatalog::new(db.pool.clone()));
    let directory = Arc::new(PgDirectory::new(db.pool.clone()));
    let orders = Arc::new(PgOrderStore::new(db.pool.clone()));
    // Payment provider stand-in; checkout against it always yields a preference.
    let gateway = Arc::new(MockGateway::new());

    let pricing = Arc::new(PricingEngine::new(PricingConfig {
        fallback_shipping_fee: config.business_rules.default_shipping_fee,
    }));

    let checkout = Arc::new(CheckoutService::new(
        catalog.clone(),
        directory.clone(),
        gateway,
        orders.clone(),
        pricing.clone(),
        config.business_rules.marketplace_fee_rate,
        config.business_rules.code_retry_attempts,
    ));
    let workflow = Arc::new(DeliveryWorkflow::new(
        orders,
        catalog.clone(),
        Arc::new(PlainFormatter),
        config.business_rules.marketplace_fee_rate,
    ));

    let app_state = AppState {
        catalog,
        directory,
        pricing,
        checkout,
        workflow,
        business_rules: config.business_rules.clone(),
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
