use crate::models::{DeliveryMethod, DeliveryStatus, Order, OrderStatus};
use crate::repository::{
    AcceptDelivery, ActiveJob, JobPreview, OrderHistoryEntry, OrderStore, StartDelivery,
};
use crate::settlement::{self, Settlement};
use crate::tracking::TrackingFormatter;
use feira_catalog::product::{CatalogReader, StorefrontInfo};
use feira_core::identity::CallerProfile;
use feira_core::{CoreError, CoreResult};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Wording shared by every path that must not reveal whether a delivery code
/// exists, belongs to someone else, or was already used.
const OPAQUE_CONFIRM: &str = "Invalid code or order.";

/// What a courier asking for work gets back.
#[derive(Debug)]
pub enum AvailableJobs {
    /// The courier already carries a delivery; no listing for them.
    Busy,
    Open(Vec<JobPreview>),
}

/// A courier's current situation.
#[derive(Debug)]
pub enum CurrentDelivery {
    Idle,
    /// The courier was flagged busy but no delivery backs it up; the flag
    /// has been cleared.
    Reconciled,
    Active(Box<ActiveJob>),
}

/// One order in the buyer's history, with the progress line the client shows.
#[derive(Debug, Clone, Serialize)]
pub struct BuyerOrderView {
    #[serde(flatten)]
    pub entry: OrderHistoryEntry,
    pub delivery_code: String,
    pub tracking_message: String,
}

/// The buyer-facing answer to "where is my order?".
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub delivery_code: String,
    pub delivery_status: Option<DeliveryStatus>,
    pub tracking_message: String,
}

/// Result of a successful delivery confirmation.
#[derive(Debug, Clone, Serialize)]
pub struct ConfirmedDelivery {
    pub order_id: Uuid,
    pub settlement: Settlement,
}

/// Drives an order from `Processing` to `Completed`.
///
/// Every transition delegates its guard to the store's conditional updates;
/// this layer adds ownership checks, code verification and the error wording
/// clients rely on.
pub struct DeliveryWorkflow {
    orders: Arc<dyn OrderStore>,
    catalog: Arc<dyn CatalogReader>,
    tracker: Arc<dyn TrackingFormatter>,
    fee_rate: Decimal,
}

impl DeliveryWorkflow {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        catalog: Arc<dyn CatalogReader>,
        tracker: Arc<dyn TrackingFormatter>,
        fee_rate: Decimal,
    ) -> Self {
        Self {
            orders,
            catalog,
            tracker,
            fee_rate,
        }
    }

    /// Seller picks who delivers a `Processing` order: an open marketplace
    /// job or their contracted courier. Seller-run delivery goes through
    /// [`DeliveryWorkflow::dispatch`] instead.
    pub async fn decide(
        &self,
        seller: &CallerProfile,
        order_id: Uuid,
        method: DeliveryMethod,
    ) -> CoreResult<()> {
        if !method.uses_courier() {
            return Err(CoreError::Validation("Invalid delivery method.".into()));
        }

        let order = self
            .orders
            .load_order(order_id)
            .await?
            .ok_or_else(|| CoreError::NotFound("Order not found.".into()))?;
        let store = self.storefront_of(&order).await?;
        if store.seller_id != seller.id {
            return Err(CoreError::Permission("Access denied.".into()));
        }
        if order.status != OrderStatus::Processing {
            return Err(CoreError::Validation(
                "Order is not awaiting fulfillment.".into(),
            ));
        }

        let courier_id = match method {
            DeliveryMethod::Contracted => Some(store.contracted_courier_id.ok_or_else(|| {
                CoreError::Validation("Store has no contracted courier.".into())
            })?),
            _ => None,
        };

        match self.orders.start_delivery(order_id, method, courier_id).await? {
            StartDelivery::Started => {
                tracing::info!(%order_id, method = %method, "delivery requested");
                Ok(())
            }
            StartDelivery::CourierBusy => Err(CoreError::Conflict(
                "Contracted courier is already on a delivery.".into(),
            )),
            StartDelivery::NotPending => Err(CoreError::Conflict(
                "Order is no longer awaiting fulfillment.".into(),
            )),
        }
    }

    /// Seller takes a `Processing` order out for delivery themselves.
    pub async fn dispatch(&self, seller: &CallerProfile, order_id: Uuid) -> CoreResult<()> {
        let not_ready = || CoreError::NotFound("Order not found or not ready for dispatch.".into());

        let order = self.orders.load_order(order_id).await?.ok_or_else(not_ready)?;
        let store = self.storefront_of(&order).await?;
        if store.seller_id != seller.id {
            return Err(CoreError::Permission("Access denied.".into()));
        }
        if order.status != OrderStatus::Processing {
            return Err(not_ready());
        }

        match self
            .orders
            .start_delivery(order_id, DeliveryMethod::Seller, None)
            .await?
        {
            StartDelivery::Started => {
                tracing::info!(%order_id, "seller dispatched order");
                Ok(())
            }
            StartDelivery::NotPending => Err(not_ready()),
            StartDelivery::CourierBusy => Err(CoreError::Integrity(
                "courier claim reported for a courier-less dispatch".into(),
            )),
        }
    }

    /// Courier claims an open marketplace job. Returns the pickup code they
    /// will present at the store; this is the only place it is handed out.
    pub async fn accept(&self, courier: &CallerProfile, order_id: Uuid) -> CoreResult<String> {
        match self.orders.accept_delivery(order_id, courier.id).await? {
            AcceptDelivery::Accepted { pickup_code } => {
                tracing::info!(%order_id, courier_id = %courier.id, "delivery accepted");
                Ok(pickup_code)
            }
            AcceptDelivery::CourierBusy => Err(CoreError::Validation(
                "You already have a pending delivery.".into(),
            )),
            AcceptDelivery::SlotTaken => Err(CoreError::NotFound(
                "Order is no longer available.".into(),
            )),
        }
    }

    /// Seller verifies the courier's pickup code and hands the package over.
    /// A wrong code changes nothing.
    pub async fn confirm_pickup(
        &self,
        seller: &CallerProfile,
        order_id: Uuid,
        code: &str,
    ) -> CoreResult<()> {
        let order = self
            .orders
            .load_order(order_id)
            .await?
            .ok_or_else(|| CoreError::NotFound("Order not found.".into()))?;
        let store = self.storefront_of(&order).await?;
        if store.seller_id != seller.id {
            return Err(CoreError::Permission("Access denied.".into()));
        }
        if order.status != OrderStatus::Delivering {
            return Err(CoreError::Validation(
                "Order is not out for fulfillment.".into(),
            ));
        }

        let delivery = self.orders.load_delivery(order_id).await?;
        let has_courier = delivery.as_ref().is_some_and(|d| d.courier_id.is_some());
        if !has_courier {
            return Err(CoreError::Validation(
                "Order has no courier to hand off to.".into(),
            ));
        }

        if normalize_code(code) != order.pickup_code {
            return Err(CoreError::Validation("Invalid pickup code.".into()));
        }

        if self.orders.confirm_pickup(order_id).await? {
            tracing::info!(%order_id, "package picked up");
            Ok(())
        } else {
            Err(CoreError::Conflict("Package already picked up.".into()))
        }
    }

    /// Whoever delivered presents the buyer's delivery code; a match settles
    /// the order: completed, seller credited, courier freed, all at once.
    ///
    /// Failures are deliberately indistinguishable so the code cannot be
    /// probed.
    pub async fn confirm_delivery(
        &self,
        caller: &CallerProfile,
        order_id: Uuid,
        code: &str,
    ) -> CoreResult<ConfirmedDelivery> {
        let opaque = || CoreError::NotFound(OPAQUE_CONFIRM.into());

        let code = normalize_code(code);
        if code.len() != feira_shared::codes::DELIVERY_CODE_LEN {
            return Err(opaque());
        }

        let order = self
            .orders
            .find_by_delivery_code(&code)
            .await?
            .ok_or_else(opaque)?;
        // the code names the order; a claimed id that disagrees gets the
        // same answer as a bad code
        if order.id != order_id {
            return Err(opaque());
        }
        if order.status != OrderStatus::Delivering {
            return Err(opaque());
        }

        let delivery = self.orders.load_delivery(order.id).await?.ok_or_else(opaque)?;
        let store = self.storefront_of(&order).await?;

        let is_assigned_courier = delivery.courier_id == Some(caller.id);
        let is_dispatching_seller =
            delivery.method == DeliveryMethod::Seller && store.seller_id == caller.id;
        if !is_assigned_courier && !is_dispatching_seller {
            return Err(CoreError::Permission(
                "Only the assigned courier or the seller can confirm.".into(),
            ));
        }

        let settlement = settlement::split(order.total_amount, self.fee_rate);
        let release_courier = if delivery.method.uses_courier() {
            delivery.courier_id
        } else {
            None
        };

        let settled = self
            .orders
            .settle_delivery(order.id, store.seller_id, settlement.seller_earnings, release_courier)
            .await?;
        if !settled {
            // lost the completion race; someone else settled it first
            return Err(opaque());
        }

        tracing::info!(
            order_id = %order.id,
            earnings = %settlement.seller_earnings,
            fee = %settlement.marketplace_fee,
            "delivery confirmed and settled"
        );
        Ok(ConfirmedDelivery {
            order_id: order.id,
            settlement,
        })
    }

    /// Jobs a courier could claim. A courier already carrying a delivery
    /// sees none, with the reason instead of an error.
    pub async fn available_jobs(&self, courier: &CallerProfile) -> CoreResult<AvailableJobs> {
        if !courier.is_available {
            return Ok(AvailableJobs::Busy);
        }
        Ok(AvailableJobs::Open(self.orders.available_jobs().await?))
    }

    /// The courier's delivery in flight. A busy flag without a matching
    /// delivery is stale state from an interrupted run; clear it here so the
    /// courier is not locked out of work.
    pub async fn current(&self, courier: &CallerProfile) -> CoreResult<CurrentDelivery> {
        if let Some(job) = self.orders.current_delivery_for_courier(courier.id).await? {
            return Ok(CurrentDelivery::Active(Box::new(job)));
        }
        if !courier.is_available {
            tracing::warn!(
                courier_id = %courier.id,
                "courier flagged busy with no active delivery, releasing"
            );
            self.orders.release_courier(courier.id).await?;
            return Ok(CurrentDelivery::Reconciled);
        }
        Ok(CurrentDelivery::Idle)
    }

    /// The buyer's order history, newest first, each with its progress line
    /// and the delivery code they hand over at the door.
    pub async fn orders_for_buyer(&self, buyer: &CallerProfile) -> CoreResult<Vec<BuyerOrderView>> {
        let entries = self.orders.orders_for_buyer(buyer.id).await?;
        Ok(entries
            .into_iter()
            .map(|entry| {
                let tracking_message = self.tracker.buyer_message(
                    entry.status,
                    entry.delivery_status,
                    entry.courier_name.as_deref(),
                );
                let delivery_code = entry.delivery_code.clone();
                BuyerOrderView {
                    entry,
                    delivery_code,
                    tracking_message,
                }
            })
            .collect())
    }

    /// A store's order history for its owner. Confirmation codes stay out:
    /// a seller who can read them could close orders without delivering.
    pub async fn orders_for_store(
        &self,
        seller: &CallerProfile,
        store_id: Uuid,
    ) -> CoreResult<Vec<OrderHistoryEntry>> {
        let store = self
            .catalog
            .storefront(store_id)
            .await?
            .ok_or_else(|| CoreError::NotFound("Store not found.".into()))?;
        if store.seller_id != seller.id {
            return Err(CoreError::Permission("Access denied.".into()));
        }
        self.orders.orders_for_store(store_id).await
    }

    /// One order's live status for its buyer.
    pub async fn order_status(
        &self,
        buyer: &CallerProfile,
        order_id: Uuid,
    ) -> CoreResult<StatusSnapshot> {
        let order = self
            .orders
            .load_order(order_id)
            .await?
            .filter(|o| o.buyer_id == buyer.id)
            .ok_or_else(|| CoreError::NotFound("Order not found.".into()))?;
        let delivery_status = self
            .orders
            .load_delivery(order_id)
            .await?
            .map(|d| d.status);
        let tracking_message = self
            .tracker
            .buyer_message(order.status, delivery_status, None);
        Ok(StatusSnapshot {
            order_id,
            status: order.status,
            delivery_code: order.delivery_code,
            delivery_status,
            tracking_message,
        })
    }

    async fn storefront_of(&self, order: &Order) -> CoreResult<StorefrontInfo> {
        self.catalog
            .storefront(order.store_id)
            .await?
            .ok_or_else(|| CoreError::Integrity("order references an unknown store".into()))
    }
}

fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Delivery;
    use crate::repository::{BeginOrderError, OrderDraft, PendingOrder};
    use crate::tracking::PlainFormatter;
    use async_trait::async_trait;
    use chrono::Utc;
    use feira_catalog::product::ProductSnapshot;
    use feira_core::identity::{AddressSnapshot, Role};
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    #[derive(Default)]
    struct StubStore {
        order: Option<Order>,
        delivery: Option<Delivery>,
        start_outcome: Option<StartDelivery>,
        accept_outcome: Option<AcceptDelivery>,
        confirm_pickup_result: bool,
        settle_result: bool,
        current_job: Option<ActiveJob>,
        history: Vec<OrderHistoryEntry>,
        settle_calls: Mutex<Vec<(Uuid, Uuid, Decimal, Option<Uuid>)>>,
        released: Mutex<Vec<Uuid>>,
    }

    #[async_trait]
    impl OrderStore for StubStore {
        async fn begin_order(
            &self,
            _draft: OrderDraft,
        ) -> Result<Box<dyn PendingOrder>, BeginOrderError> {
            unreachable!()
        }
        async fn load_order(&self, id: Uuid) -> CoreResult<Option<Order>> {
            Ok(self.order.clone().filter(|o| o.id == id))
        }
        async fn find_by_delivery_code(&self, delivery_code: &str) -> CoreResult<Option<Order>> {
            Ok(self.order.clone().filter(|o| o.delivery_code == delivery_code))
        }
        async fn load_delivery(&self, _order_id: Uuid) -> CoreResult<Option<Delivery>> {
            Ok(self.delivery.clone())
        }
        async fn confirm_payment(&self, _payment_reference: &str) -> CoreResult<bool> {
            unreachable!()
        }
        async fn start_delivery(
            &self,
            _order_id: Uuid,
            _method: DeliveryMethod,
            _courier_id: Option<Uuid>,
        ) -> CoreResult<StartDelivery> {
            Ok(self.start_outcome.clone().unwrap_or(StartDelivery::Started))
        }
        async fn accept_delivery(
            &self,
            _order_id: Uuid,
            _courier_id: Uuid,
        ) -> CoreResult<AcceptDelivery> {
            Ok(self.accept_outcome.clone().unwrap_or(AcceptDelivery::SlotTaken))
        }
        async fn confirm_pickup(&self, _order_id: Uuid) -> CoreResult<bool> {
            Ok(self.confirm_pickup_result)
        }
        async fn settle_delivery(
            &self,
            order_id: Uuid,
            seller_id: Uuid,
            seller_earnings: Decimal,
            release_courier: Option<Uuid>,
        ) -> CoreResult<bool> {
            self.settle_calls.lock().unwrap().push((
                order_id,
                seller_id,
                seller_earnings,
                release_courier,
            ));
            Ok(self.settle_result)
        }
        async fn release_courier(&self, courier_id: Uuid) -> CoreResult<()> {
            self.released.lock().unwrap().push(courier_id);
            Ok(())
        }
        async fn available_jobs(&self) -> CoreResult<Vec<JobPreview>> {
            Ok(Vec::new())
        }
        async fn current_delivery_for_courier(
            &self,
            _courier_id: Uuid,
        ) -> CoreResult<Option<ActiveJob>> {
            Ok(self.current_job.clone())
        }
        async fn orders_for_buyer(&self, _buyer_id: Uuid) -> CoreResult<Vec<OrderHistoryEntry>> {
            Ok(self.history.clone())
        }
        async fn orders_for_store(&self, _store_id: Uuid) -> CoreResult<Vec<OrderHistoryEntry>> {
            Ok(self.history.clone())
        }
    }

    struct StubCatalog {
        store: Option<StorefrontInfo>,
    }

    #[async_trait]
    impl CatalogReader for StubCatalog {
        async fn products_for_cart(&self, _ids: &[Uuid]) -> CoreResult<Vec<ProductSnapshot>> {
            unreachable!()
        }
        async fn storefront(&self, _store_id: Uuid) -> CoreResult<Option<StorefrontInfo>> {
            Ok(self.store.clone())
        }
    }

    fn profile(role: Role, available: bool) -> CallerProfile {
        CallerProfile {
            id: Uuid::new_v4(),
            role,
            full_name: "Test Person".to_string(),
            email: None,
            city_id: Some(1),
            district_id: None,
            street: Some("Rua A".to_string()),
            number: Some("1".to_string()),
            landmark: None,
            whatsapp: None,
            is_available: available,
            pending_balance: dec!(0),
            payment_token: None,
        }
    }

    fn address() -> AddressSnapshot {
        AddressSnapshot {
            city_id: 1,
            district_id: None,
            street: "Rua A".to_string(),
            number: "1".to_string(),
            landmark: None,
            whatsapp: None,
        }
    }

    fn order(status: OrderStatus, store_id: Uuid) -> Order {
        Order {
            id: Uuid::new_v4(),
            buyer_id: Uuid::new_v4(),
            store_id,
            total_amount: dec!(25.00),
            status,
            delivery_method: None,
            payment_reference: "mock_pref_1".to_string(),
            delivery_code: "XYZ12A".to_string(),
            pickup_code: "AB12C".to_string(),
            address: address(),
            items: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn storefront(seller_id: Uuid, contracted: Option<Uuid>) -> StorefrontInfo {
        StorefrontInfo {
            id: Uuid::new_v4(),
            seller_id,
            name: "Dona Rosa".to_string(),
            street: Some("Rua B".to_string()),
            number: Some("2".to_string()),
            contracted_courier_id: contracted,
        }
    }

    fn delivery(order_id: Uuid, method: DeliveryMethod, courier: Option<Uuid>) -> Delivery {
        Delivery {
            id: Uuid::new_v4(),
            order_id,
            courier_id: courier,
            status: DeliveryStatus::PickedUp,
            method,
            packing_started_at: Some(Utc::now()),
            picked_up_at: Some(Utc::now()),
            delivered_at: None,
            buyer_confirmed_at: None,
            created_at: Utc::now(),
        }
    }

    fn workflow(store: StubStore, catalog: StubCatalog) -> DeliveryWorkflow {
        DeliveryWorkflow::new(
            Arc::new(store),
            Arc::new(catalog),
            Arc::new(PlainFormatter),
            dec!(0.08),
        )
    }

    #[tokio::test]
    async fn test_decide_rejects_seller_method() {
        let wf = workflow(StubStore::default(), StubCatalog { store: None });
        let err = wf
            .decide(&profile(Role::Seller, false), Uuid::new_v4(), DeliveryMethod::Seller)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn test_decide_requires_ownership() {
        let seller = profile(Role::Seller, false);
        let store_id = Uuid::new_v4();
        let o = order(OrderStatus::Processing, store_id);
        let order_id = o.id;
        let wf = workflow(
            StubStore { order: Some(o), ..Default::default() },
            StubCatalog { store: Some(storefront(Uuid::new_v4(), None)) },
        );
        let err = wf
            .decide(&seller, order_id, DeliveryMethod::Marketplace)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Permission(_)));
    }

    #[tokio::test]
    async fn test_decide_requires_processing_status() {
        let seller = profile(Role::Seller, false);
        let o = order(OrderStatus::PendingPayment, Uuid::new_v4());
        let order_id = o.id;
        let wf = workflow(
            StubStore { order: Some(o), ..Default::default() },
            StubCatalog { store: Some(storefront(seller.id, None)) },
        );
        let err = wf
            .decide(&seller, order_id, DeliveryMethod::Marketplace)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(msg) if msg.contains("awaiting fulfillment")));
    }

    #[tokio::test]
    async fn test_decide_contracted_needs_a_courier_on_file() {
        let seller = profile(Role::Seller, false);
        let o = order(OrderStatus::Processing, Uuid::new_v4());
        let order_id = o.id;
        let wf = workflow(
            StubStore { order: Some(o), ..Default::default() },
            StubCatalog { store: Some(storefront(seller.id, None)) },
        );
        let err = wf
            .decide(&seller, order_id, DeliveryMethod::Contracted)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(msg) if msg.contains("contracted courier")));
    }

    #[tokio::test]
    async fn test_decide_busy_contracted_courier_conflicts() {
        let seller = profile(Role::Seller, false);
        let o = order(OrderStatus::Processing, Uuid::new_v4());
        let order_id = o.id;
        let wf = workflow(
            StubStore {
                order: Some(o),
                start_outcome: Some(StartDelivery::CourierBusy),
                ..Default::default()
            },
            StubCatalog { store: Some(storefront(seller.id, Some(Uuid::new_v4()))) },
        );
        let err = wf
            .decide(&seller, order_id, DeliveryMethod::Contracted)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_dispatch_hides_non_processing_orders() {
        let seller = profile(Role::Seller, false);
        let o = order(OrderStatus::Delivering, Uuid::new_v4());
        let order_id = o.id;
        let wf = workflow(
            StubStore { order: Some(o), ..Default::default() },
            StubCatalog { store: Some(storefront(seller.id, None)) },
        );
        let err = wf.dispatch(&seller, order_id).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(msg) if msg.contains("dispatch")));
    }

    #[tokio::test]
    async fn test_accept_busy_courier_rejected() {
        let wf = workflow(
            StubStore {
                accept_outcome: Some(AcceptDelivery::CourierBusy),
                ..Default::default()
            },
            StubCatalog { store: None },
        );
        let err = wf
            .accept(&profile(Role::Courier, false), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(msg) if msg.contains("pending delivery")));
    }

    #[tokio::test]
    async fn test_accept_lost_race_reads_as_gone() {
        let wf = workflow(StubStore::default(), StubCatalog { store: None });
        let err = wf
            .accept(&profile(Role::Courier, true), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_accept_returns_pickup_code() {
        let wf = workflow(
            StubStore {
                accept_outcome: Some(AcceptDelivery::Accepted {
                    pickup_code: "AB12C".to_string(),
                }),
                ..Default::default()
            },
            StubCatalog { store: None },
        );
        let code = wf
            .accept(&profile(Role::Courier, true), Uuid::new_v4())
            .await
            .unwrap();
        assert_eq!(code, "AB12C");
    }

    #[tokio::test]
    async fn test_confirm_pickup_rejects_wrong_code() {
        let seller = profile(Role::Seller, false);
        let o = order(OrderStatus::Delivering, Uuid::new_v4());
        let order_id = o.id;
        let wf = workflow(
            StubStore {
                delivery: Some(delivery(order_id, DeliveryMethod::Marketplace, Some(Uuid::new_v4()))),
                order: Some(o),
                ..Default::default()
            },
            StubCatalog { store: Some(storefront(seller.id, None)) },
        );
        let err = wf
            .confirm_pickup(&seller, order_id, "WRONG")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(msg) if msg.contains("pickup code")));
    }

    #[tokio::test]
    async fn test_confirm_pickup_accepts_lowercase_code() {
        let seller = profile(Role::Seller, false);
        let o = order(OrderStatus::Delivering, Uuid::new_v4());
        let order_id = o.id;
        let wf = workflow(
            StubStore {
                delivery: Some(delivery(order_id, DeliveryMethod::Marketplace, Some(Uuid::new_v4()))),
                order: Some(o),
                confirm_pickup_result: true,
                ..Default::default()
            },
            StubCatalog { store: Some(storefront(seller.id, None)) },
        );
        wf.confirm_pickup(&seller, order_id, " ab12c ").await.unwrap();
    }

    #[tokio::test]
    async fn test_confirm_delivery_is_opaque_for_wrong_status() {
        let caller = profile(Role::Courier, false);
        let o = order(OrderStatus::Processing, Uuid::new_v4());
        let order_id = o.id;
        let wf = workflow(
            StubStore { order: Some(o), ..Default::default() },
            StubCatalog { store: None },
        );
        let err = wf
            .confirm_delivery(&caller, order_id, "XYZ12A")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(msg) if msg == OPAQUE_CONFIRM));
    }

    #[tokio::test]
    async fn test_confirm_delivery_is_opaque_for_mismatched_order() {
        let caller = profile(Role::Courier, false);
        let o = order(OrderStatus::Delivering, Uuid::new_v4());
        let wf = workflow(
            StubStore { order: Some(o), ..Default::default() },
            StubCatalog { store: None },
        );
        // right code, somebody else's order id
        let err = wf
            .confirm_delivery(&caller, Uuid::new_v4(), "XYZ12A")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(msg) if msg == OPAQUE_CONFIRM));
    }

    #[tokio::test]
    async fn test_confirm_delivery_requires_assignment() {
        let stranger = profile(Role::Courier, false);
        let o = order(OrderStatus::Delivering, Uuid::new_v4());
        let order_id = o.id;
        let wf = workflow(
            StubStore {
                delivery: Some(delivery(order_id, DeliveryMethod::Marketplace, Some(Uuid::new_v4()))),
                order: Some(o),
                settle_result: true,
                ..Default::default()
            },
            StubCatalog { store: Some(storefront(Uuid::new_v4(), None)) },
        );
        let err = wf
            .confirm_delivery(&stranger, order_id, "XYZ12A")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Permission(_)));
    }

    #[tokio::test]
    async fn test_confirm_delivery_settles_and_releases_courier() {
        let courier = profile(Role::Courier, false);
        let seller_id = Uuid::new_v4();
        let o = order(OrderStatus::Delivering, Uuid::new_v4());
        let order_id = o.id;
        let store = StubStore {
            delivery: Some(delivery(order_id, DeliveryMethod::Marketplace, Some(courier.id))),
            order: Some(o),
            settle_result: true,
            ..Default::default()
        };
        let wf = workflow(store, StubCatalog { store: Some(storefront(seller_id, None)) });

        let confirmed = wf
            .confirm_delivery(&courier, order_id, "xyz12a")
            .await
            .unwrap();

        assert_eq!(confirmed.order_id, order_id);
        assert_eq!(confirmed.settlement.marketplace_fee, dec!(2.00));
        assert_eq!(confirmed.settlement.seller_earnings, dec!(23.00));
    }

    #[tokio::test]
    async fn test_confirm_delivery_settle_arguments() {
        let courier = profile(Role::Courier, false);
        let seller_id = Uuid::new_v4();
        let o = order(OrderStatus::Delivering, Uuid::new_v4());
        let order_id = o.id;
        let store = Arc::new(StubStore {
            delivery: Some(delivery(order_id, DeliveryMethod::Marketplace, Some(courier.id))),
            order: Some(o),
            settle_result: true,
            ..Default::default()
        });
        let wf = DeliveryWorkflow::new(
            store.clone(),
            Arc::new(StubCatalog { store: Some(storefront(seller_id, None)) }),
            Arc::new(PlainFormatter),
            dec!(0.08),
        );

        wf.confirm_delivery(&courier, order_id, "XYZ12A").await.unwrap();

        let calls = store.settle_calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (called_order, called_seller, earnings, released) = calls[0];
        assert_eq!(called_order, order_id);
        assert_eq!(called_seller, seller_id);
        assert_eq!(earnings, dec!(23.00));
        assert_eq!(released, Some(courier.id));
    }

    #[tokio::test]
    async fn test_seller_confirms_own_dispatch_without_release() {
        let seller = profile(Role::Seller, false);
        let o = order(OrderStatus::Delivering, Uuid::new_v4());
        let order_id = o.id;
        let store = Arc::new(StubStore {
            delivery: Some(delivery(order_id, DeliveryMethod::Seller, None)),
            order: Some(o),
            settle_result: true,
            ..Default::default()
        });
        let wf = DeliveryWorkflow::new(
            store.clone(),
            Arc::new(StubCatalog { store: Some(storefront(seller.id, None)) }),
            Arc::new(PlainFormatter),
            dec!(0.08),
        );

        wf.confirm_delivery(&seller, order_id, "XYZ12A").await.unwrap();

        let calls = store.settle_calls.lock().unwrap();
        assert_eq!(calls[0].3, None);
    }

    #[tokio::test]
    async fn test_busy_courier_sees_no_job_listing() {
        let wf = workflow(StubStore::default(), StubCatalog { store: None });
        let jobs = wf.available_jobs(&profile(Role::Courier, false)).await.unwrap();
        assert!(matches!(jobs, AvailableJobs::Busy));
    }

    #[tokio::test]
    async fn test_current_reconciles_stale_busy_flag() {
        let courier = profile(Role::Courier, false);
        let store = Arc::new(StubStore::default());
        let wf = DeliveryWorkflow::new(
            store.clone(),
            Arc::new(StubCatalog { store: None }),
            Arc::new(PlainFormatter),
            dec!(0.08),
        );

        let current = wf.current(&courier).await.unwrap();

        assert!(matches!(current, CurrentDelivery::Reconciled));
        assert_eq!(store.released.lock().unwrap().as_slice(), &[courier.id]);
    }

    #[tokio::test]
    async fn test_buyer_history_carries_tracking_line() {
        let buyer = profile(Role::Buyer, false);
        let entry = OrderHistoryEntry {
            order_id: Uuid::new_v4(),
            total_amount: dec!(25.00),
            status: OrderStatus::Processing,
            delivery_method: None,
            created_at: Utc::now(),
            delivery_code: "XYZ12A".to_string(),
            store_name: "Dona Rosa".to_string(),
            buyer_name: "Ana".to_string(),
            courier_name: None,
            delivery_status: None,
            packing_started_at: None,
            picked_up_at: None,
            address: address(),
            items: Vec::new(),
        };
        let wf = workflow(
            StubStore { history: vec![entry], ..Default::default() },
            StubCatalog { store: None },
        );

        let views = wf.orders_for_buyer(&buyer).await.unwrap();

        assert_eq!(views.len(), 1);
        assert!(views[0].tracking_message.contains("preparing"));
        assert_eq!(views[0].delivery_code, "XYZ12A");
    }
}
