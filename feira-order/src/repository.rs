use crate::models::{Delivery, DeliveryMethod, DeliveryStatus, Order, OrderStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feira_core::identity::AddressSnapshot;
use feira_core::{CoreError, CoreResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Everything needed to materialize an order, its items and its stock
/// reservations in one transaction.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub order_id: Uuid,
    pub buyer_id: Uuid,
    pub store_id: Uuid,
    pub total_amount: Decimal,
    pub initial_status: OrderStatus,
    /// Placeholder reference written at insert time; replaced at commit.
    pub payment_reference: String,
    pub delivery_code: String,
    pub pickup_code: String,
    pub address: AddressSnapshot,
    pub items: Vec<DraftItem>,
}

#[derive(Debug, Clone)]
pub struct DraftItem {
    pub product_id: Uuid,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub selected_options: serde_json::Value,
}

/// Why an order could not be staged.
#[derive(Debug, thiserror::Error)]
pub enum BeginOrderError {
    /// One of the confirmation codes is already taken; the caller should
    /// regenerate and retry.
    #[error("confirmation code already in use")]
    CodeCollision,
    #[error("insufficient stock for {product_name}: requested {requested}, available {available}")]
    InsufficientStock {
        product_name: String,
        requested: i32,
        available: i32,
    },
    #[error(transparent)]
    Store(#[from] CoreError),
}

/// An order staged inside an open transaction.
///
/// Nothing is visible to anyone else until `commit`; dropping the handle or
/// calling `abort` rolls back the order, its items and every stock
/// reservation as one unit. The gap between begin and commit is where the
/// payment provider is called, so a provider failure leaves no trace.
#[async_trait]
pub trait PendingOrder: Send {
    /// Replace the placeholder payment reference and make the order real.
    async fn commit(self: Box<Self>, payment_reference: &str) -> CoreResult<()>;

    /// Discard the staged order entirely.
    async fn abort(self: Box<Self>) -> CoreResult<()>;
}

/// Outcome of the seller's delivery decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartDelivery {
    Started,
    /// The contracted courier lost the availability race.
    CourierBusy,
    /// The order left `Processing` between the check and the update.
    NotPending,
}

/// Outcome of a courier trying to claim an open job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcceptDelivery {
    Accepted { pickup_code: String },
    /// Another courier claimed the job first, or it was never open.
    SlotTaken,
    /// The courier lost the availability race.
    CourierBusy,
}

/// A job a courier can claim: enough to judge the trip, none of the codes.
#[derive(Debug, Clone, Serialize)]
pub struct JobPreview {
    pub order_id: Uuid,
    pub total_amount: Decimal,
    pub store_name: String,
    pub buyer_name: String,
    pub created_at: DateTime<Utc>,
}

/// The courier's active delivery, with everything needed to run it.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveJob {
    pub order_id: Uuid,
    pub total_amount: Decimal,
    pub store_name: String,
    pub store_address: String,
    pub buyer_name: String,
    pub delivery_address: String,
    pub buyer_whatsapp: Option<String>,
    pub pickup_code: String,
    pub delivery_status: DeliveryStatus,
    pub items: Vec<JobItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobItem {
    pub product_name: String,
    pub quantity: i32,
    pub selected_options: serde_json::Value,
}

/// One order in a buyer's or store's history, joined with its delivery.
#[derive(Debug, Clone, Serialize)]
pub struct OrderHistoryEntry {
    pub order_id: Uuid,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub delivery_method: Option<DeliveryMethod>,
    pub created_at: DateTime<Utc>,
    /// Never serialized here: buyer-facing views copy it out explicitly, and
    /// no other audience may see it.
    #[serde(skip_serializing)]
    pub delivery_code: String,
    pub store_name: String,
    pub buyer_name: String,
    pub courier_name: Option<String>,
    pub delivery_status: Option<DeliveryStatus>,
    pub packing_started_at: Option<DateTime<Utc>>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub address: AddressSnapshot,
    pub items: Vec<JobItem>,
}

/// Persistence seam for orders, deliveries and the settlement ledger.
///
/// Every mutating method is one transaction; the guarded updates return
/// whether they won so callers can translate a lost race without ever
/// seeing partial state.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Stage an order (items + stock reservations) without committing it.
    async fn begin_order(&self, draft: OrderDraft) -> Result<Box<dyn PendingOrder>, BeginOrderError>;

    async fn load_order(&self, id: Uuid) -> CoreResult<Option<Order>>;

    /// Look up the order carrying this delivery code; the code is the
    /// lookup key for confirmation, the claimed order id only corroborates.
    async fn find_by_delivery_code(&self, delivery_code: &str) -> CoreResult<Option<Order>>;

    async fn load_delivery(&self, order_id: Uuid) -> CoreResult<Option<Delivery>>;

    /// Move the order matching this payment reference from `Pending Payment`
    /// to `Processing`. Returns false when no order was in that state.
    async fn confirm_payment(&self, payment_reference: &str) -> CoreResult<bool>;

    /// Record the seller's delivery decision: claim the courier (when one is
    /// named), move the order to `Delivering` and create the delivery record.
    async fn start_delivery(
        &self,
        order_id: Uuid,
        method: DeliveryMethod,
        courier_id: Option<Uuid>,
    ) -> CoreResult<StartDelivery>;

    /// Atomically claim an open marketplace job for this courier.
    async fn accept_delivery(&self, order_id: Uuid, courier_id: Uuid)
        -> CoreResult<AcceptDelivery>;

    /// `Accepted` to `PickedUp`; false when the delivery was not `Accepted`.
    async fn confirm_pickup(&self, order_id: Uuid) -> CoreResult<bool>;

    /// Complete the order and pay out in one transaction: order to
    /// `Completed` (guarded on `Delivering` so it can only ever happen once),
    /// credit the seller, release the courier, close the delivery record.
    /// Returns false when the guard lost, with nothing applied.
    async fn settle_delivery(
        &self,
        order_id: Uuid,
        seller_id: Uuid,
        seller_earnings: Decimal,
        release_courier: Option<Uuid>,
    ) -> CoreResult<bool>;

    /// Flip a courier back to available (reconciliation path).
    async fn release_courier(&self, courier_id: Uuid) -> CoreResult<()>;

    /// Unclaimed marketplace jobs, oldest first.
    async fn available_jobs(&self) -> CoreResult<Vec<JobPreview>>;

    async fn current_delivery_for_courier(&self, courier_id: Uuid)
        -> CoreResult<Option<ActiveJob>>;

    async fn orders_for_buyer(&self, buyer_id: Uuid) -> CoreResult<Vec<OrderHistoryEntry>>;

    async fn orders_for_store(&self, store_id: Uuid) -> CoreResult<Vec<OrderHistoryEntry>>;
}
