use crate::{CoreError, CoreResult};
use async_trait::async_trait;
use feira_shared::pii::Masked;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What the gateway needs to open a checkout session for one order.
///
/// The preference is created on the seller's own provider account (their
/// credential), with the platform cut declared as `marketplace_fee` so the
/// provider splits the money at capture time.
#[derive(Debug, Clone, Serialize)]
pub struct PreferenceRequest {
    pub order_id: Uuid,
    pub title: String,
    pub total_amount: Decimal,
    pub marketplace_fee: Decimal,
    pub payer_email: Option<String>,
    /// The seller's provider token. Serializes as the plain value for the
    /// provider call; Debug output masks it.
    pub seller_credential: Masked<String>,
}

/// The provider's answer: an id to reconcile webhooks against and the URL
/// the buyer is redirected to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentPreference {
    pub preference_id: String,
    pub init_point: String,
}

/// External payment provider seam.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_preference(&self, request: &PreferenceRequest) -> CoreResult<PaymentPreference>;
}

/// Gateway double for tests and local runs. Echoes deterministic ids and can
/// be told to fail so checkout rollback paths are exercisable.
pub struct MockGateway {
    fail: bool,
}

impl MockGateway {
    pub fn new() -> Self {
        Self { fail: false }
    }

    pub fn failing() -> Self {
        Self { fail: true }
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_preference(&self, request: &PreferenceRequest) -> CoreResult<PaymentPreference> {
        if self.fail {
            return Err(CoreError::Upstream(
                "payment provider rejected the preference".into(),
            ));
        }
        tracing::info!(
            order_id = %request.order_id,
            total = %request.total_amount,
            fee = %request.marketplace_fee,
            "creating mock payment preference"
        );
        Ok(PaymentPreference {
            preference_id: format!("mock_pref_{}", request.order_id.simple()),
            init_point: format!("https://pay.example.test/checkout/{}", request.order_id.simple()),
        })
    }
}
