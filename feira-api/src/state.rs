use feira_catalog::pricing::PricingEngine;
use feira_catalog::product::CatalogReader;
use feira_core::identity::PartyDirectory;
use feira_order::checkout::CheckoutService;
use feira_order::workflow::DeliveryWorkflow;
use feira_store::app_config::BusinessRules;
use std::sync::Arc;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn CatalogReader>,
    pub directory: Arc<dyn PartyDirectory>,
    pub pricing: Arc<PricingEngine>,
    pub checkout: Arc<CheckoutService>,
    pub workflow: Arc<DeliveryWorkflow>,
    pub business_rules: BusinessRules,
    pub auth: AuthConfig,
}
