use crate::order_repo::{format_address, format_store_address};
use async_trait::async_trait;
use chrono::Utc;
use feira_catalog::product::{CatalogReader, ProductSnapshot, StorefrontInfo};
use feira_core::identity::{CallerProfile, PartyDirectory};
use feira_core::{CoreError, CoreResult};
use feira_order::models::{
    Delivery, DeliveryMethod, DeliveryStatus, Order, OrderItem, OrderStatus,
};
use feira_order::repository::{
    AcceptDelivery, ActiveJob, BeginOrderError, JobItem, JobPreview, OrderDraft,
    OrderHistoryEntry, OrderStore, PendingOrder, StartDelivery,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Debug, Clone)]
struct MemProduct {
    snapshot: ProductSnapshot,
    stock: i32,
}

#[derive(Debug, Clone, Default)]
struct MemState {
    products: HashMap<Uuid, MemProduct>,
    stores: HashMap<Uuid, StorefrontInfo>,
    users: HashMap<Uuid, CallerProfile>,
    orders: HashMap<Uuid, Order>,
    // keyed by order id; one delivery per order
    deliveries: HashMap<Uuid, Delivery>,
}

/// Everything-in-one-mutex rendition of the storage seams, with the same
/// guarded-update semantics as the Postgres implementation. Backs the
/// integration tests and database-free local runs.
pub struct MemStore {
    state: Arc<Mutex<MemState>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemState::default())),
        }
    }

    pub async fn seed_user(&self, profile: CallerProfile) {
        self.state.lock().await.users.insert(profile.id, profile);
    }

    pub async fn seed_store(&self, store: StorefrontInfo) {
        self.state.lock().await.stores.insert(store.id, store);
    }

    pub async fn seed_product(&self, snapshot: ProductSnapshot, stock: i32) {
        self.state
            .lock()
            .await
            .products
            .insert(snapshot.id, MemProduct { snapshot, stock });
    }

    pub async fn stock_of(&self, product_id: Uuid) -> Option<i32> {
        self.state
            .lock()
            .await
            .products
            .get(&product_id)
            .map(|p| p.stock)
    }

    pub async fn balance_of(&self, user_id: Uuid) -> Option<Decimal> {
        self.state
            .lock()
            .await
            .users
            .get(&user_id)
            .map(|u| u.pending_balance)
    }

    pub async fn courier_available(&self, user_id: Uuid) -> Option<bool> {
        self.state
            .lock()
            .await
            .users
            .get(&user_id)
            .map(|u| u.is_available)
    }

    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CatalogReader for MemStore {
    async fn products_for_cart(&self, ids: &[Uuid]) -> CoreResult<Vec<ProductSnapshot>> {
        let state = self.state.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.products.get(id))
            .map(|p| p.snapshot.clone())
            .collect())
    }

    async fn storefront(&self, store_id: Uuid) -> CoreResult<Option<StorefrontInfo>> {
        Ok(self.state.lock().await.stores.get(&store_id).cloned())
    }
}

#[async_trait]
impl PartyDirectory for MemStore {
    async fn load_caller(&self, id: Uuid) -> CoreResult<Option<CallerProfile>> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }
}

/// Holds the whole-store lock between begin and commit, which serializes
/// checkouts exactly the way a single-row lock would not; good enough for
/// what this store is for.
struct MemPendingOrder {
    order_id: Uuid,
    // present until commit; Drop restores it, so an un-committed order
    // vanishes just like a dropped database transaction
    rollback: Option<MemState>,
    guard: OwnedMutexGuard<MemState>,
}

#[async_trait]
impl PendingOrder for MemPendingOrder {
    async fn commit(mut self: Box<Self>, payment_reference: &str) -> CoreResult<()> {
        self.rollback = None;
        if let Some(order) = self.guard.orders.get_mut(&self.order_id) {
            order.payment_reference = payment_reference.to_string();
            order.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn abort(self: Box<Self>) -> CoreResult<()> {
        // Drop puts the snapshot back
        Ok(())
    }
}

impl Drop for MemPendingOrder {
    fn drop(&mut self) {
        if let Some(snapshot) = self.rollback.take() {
            *self.guard = snapshot;
        }
    }
}

#[async_trait]
impl OrderStore for MemStore {
    async fn begin_order(
        &self,
        draft: OrderDraft,
    ) -> Result<Box<dyn PendingOrder>, BeginOrderError> {
        let mut guard = Arc::clone(&self.state).lock_owned().await;
        let snapshot = guard.clone();

        let collision = guard.orders.values().any(|o| {
            o.delivery_code == draft.delivery_code || o.pickup_code == draft.pickup_code
        });
        if collision {
            return Err(BeginOrderError::CodeCollision);
        }

        for item in &draft.items {
            let Some(product) = guard.products.get_mut(&item.product_id) else {
                *guard = snapshot;
                return Err(BeginOrderError::Store(CoreError::Integrity(
                    "draft references an unknown product".into(),
                )));
            };
            if product.stock < item.quantity {
                let available = product.stock;
                *guard = snapshot;
                return Err(BeginOrderError::InsufficientStock {
                    product_name: item.product_name.clone(),
                    requested: item.quantity,
                    available,
                });
            }
            product.stock -= item.quantity;
        }

        let now = Utc::now();
        let items: Vec<OrderItem> = draft
            .items
            .iter()
            .map(|item| OrderItem {
                id: Uuid::new_v4(),
                order_id: draft.order_id,
                product_id: item.product_id,
                product_name: item.product_name.clone(),
                unit_price: item.unit_price,
                quantity: item.quantity,
                selected_options: item.selected_options.clone(),
                created_at: now,
            })
            .collect();

        guard.orders.insert(
            draft.order_id,
            Order {
                id: draft.order_id,
                buyer_id: draft.buyer_id,
                store_id: draft.store_id,
                total_amount: draft.total_amount,
                status: draft.initial_status,
                delivery_method: None,
                payment_reference: draft.payment_reference.clone(),
                delivery_code: draft.delivery_code.clone(),
                pickup_code: draft.pickup_code.clone(),
                address: draft.address.clone(),
                items,
                created_at: now,
                updated_at: now,
            },
        );

        Ok(Box::new(MemPendingOrder {
            order_id: draft.order_id,
            rollback: Some(snapshot),
            guard,
        }))
    }

    async fn load_order(&self, id: Uuid) -> CoreResult<Option<Order>> {
        Ok(self.state.lock().await.orders.get(&id).cloned())
    }

    async fn find_by_delivery_code(&self, delivery_code: &str) -> CoreResult<Option<Order>> {
        Ok(self
            .state
            .lock()
            .await
            .orders
            .values()
            .find(|o| o.delivery_code == delivery_code)
            .cloned())
    }

    async fn load_delivery(&self, order_id: Uuid) -> CoreResult<Option<Delivery>> {
        Ok(self.state.lock().await.deliveries.get(&order_id).cloned())
    }

    async fn confirm_payment(&self, payment_reference: &str) -> CoreResult<bool> {
        let mut state = self.state.lock().await;
        let order = state.orders.values_mut().find(|o| {
            o.payment_reference == payment_reference && o.status == OrderStatus::PendingPayment
        });
        match order {
            Some(order) => {
                order.status = OrderStatus::Processing;
                order.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn start_delivery(
        &self,
        order_id: Uuid,
        method: DeliveryMethod,
        courier_id: Option<Uuid>,
    ) -> CoreResult<StartDelivery> {
        let mut state = self.state.lock().await;

        if let Some(courier) = courier_id {
            let free = state
                .users
                .get(&courier)
                .map(|u| u.is_available)
                .unwrap_or(false);
            if !free {
                return Ok(StartDelivery::CourierBusy);
            }
        }

        match state.orders.get(&order_id) {
            Some(order) if order.status == OrderStatus::Processing => {}
            _ => return Ok(StartDelivery::NotPending),
        }

        let now = Utc::now();
        if let Some(order) = state.orders.get_mut(&order_id) {
            order.status = OrderStatus::Delivering;
            order.delivery_method = Some(method);
            order.updated_at = now;
        }
        if let Some(courier) = courier_id {
            if let Some(user) = state.users.get_mut(&courier) {
                user.is_available = false;
            }
        }

        let (status, packing_started_at) = match method {
            DeliveryMethod::Marketplace => (DeliveryStatus::Requested, None),
            DeliveryMethod::Contracted => (DeliveryStatus::Accepted, None),
            DeliveryMethod::Seller => (DeliveryStatus::Accepted, Some(now)),
        };
        state.deliveries.insert(
            order_id,
            Delivery {
                id: Uuid::new_v4(),
                order_id,
                courier_id,
                status,
                method,
                packing_started_at,
                picked_up_at: None,
                delivered_at: None,
                buyer_confirmed_at: None,
                created_at: now,
            },
        );

        Ok(StartDelivery::Started)
    }

    async fn accept_delivery(
        &self,
        order_id: Uuid,
        courier_id: Uuid,
    ) -> CoreResult<AcceptDelivery> {
        let mut state = self.state.lock().await;

        let free = state
            .users
            .get(&courier_id)
            .map(|u| u.is_available)
            .unwrap_or(false);
        if !free {
            return Ok(AcceptDelivery::CourierBusy);
        }

        let open = state
            .deliveries
            .get(&order_id)
            .map(|d| d.status == DeliveryStatus::Requested && d.courier_id.is_none())
            .unwrap_or(false);
        if !open {
            return Ok(AcceptDelivery::SlotTaken);
        }

        let Some(pickup_code) = state.orders.get(&order_id).map(|o| o.pickup_code.clone())
        else {
            return Err(CoreError::Integrity("delivery without its order".into()));
        };

        if let Some(user) = state.users.get_mut(&courier_id) {
            user.is_available = false;
        }
        if let Some(delivery) = state.deliveries.get_mut(&order_id) {
            delivery.courier_id = Some(courier_id);
            delivery.status = DeliveryStatus::Accepted;
        }

        Ok(AcceptDelivery::Accepted { pickup_code })
    }

    async fn confirm_pickup(&self, order_id: Uuid) -> CoreResult<bool> {
        let mut state = self.state.lock().await;
        if let Some(delivery) = state.deliveries.get_mut(&order_id) {
            if delivery.status == DeliveryStatus::Accepted {
                let now = Utc::now();
                delivery.status = DeliveryStatus::PickedUp;
                delivery.packing_started_at = Some(now);
                delivery.picked_up_at = Some(now);
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn settle_delivery(
        &self,
        order_id: Uuid,
        seller_id: Uuid,
        seller_earnings: Decimal,
        release_courier: Option<Uuid>,
    ) -> CoreResult<bool> {
        let mut state = self.state.lock().await;

        match state.orders.get(&order_id) {
            Some(order) if order.status == OrderStatus::Delivering => {}
            _ => return Ok(false),
        }

        let now = Utc::now();
        if let Some(order) = state.orders.get_mut(&order_id) {
            order.status = OrderStatus::Completed;
            order.updated_at = now;
        }
        if let Some(delivery) = state.deliveries.get_mut(&order_id) {
            delivery.status = DeliveryStatus::DeliveredConfirmed;
            delivery.delivered_at = Some(now);
            delivery.buyer_confirmed_at = Some(now);
        }
        if let Some(seller) = state.users.get_mut(&seller_id) {
            seller.pending_balance += seller_earnings;
        }
        if let Some(courier) = release_courier {
            if let Some(user) = state.users.get_mut(&courier) {
                user.is_available = true;
            }
        }

        Ok(true)
    }

    async fn release_courier(&self, courier_id: Uuid) -> CoreResult<()> {
        if let Some(user) = self.state.lock().await.users.get_mut(&courier_id) {
            user.is_available = true;
        }
        Ok(())
    }

    async fn available_jobs(&self) -> CoreResult<Vec<JobPreview>> {
        let state = self.state.lock().await;
        let mut jobs: Vec<JobPreview> = state
            .deliveries
            .values()
            .filter(|d| {
                d.status == DeliveryStatus::Requested
                    && d.courier_id.is_none()
                    && d.method == DeliveryMethod::Marketplace
            })
            .filter_map(|d| state.orders.get(&d.order_id))
            .map(|order| JobPreview {
                order_id: order.id,
                total_amount: order.total_amount,
                store_name: store_name(&state, order.store_id),
                buyer_name: user_name(&state, order.buyer_id),
                created_at: order.created_at,
            })
            .collect();
        jobs.sort_by_key(|job| job.created_at);
        Ok(jobs)
    }

    async fn current_delivery_for_courier(
        &self,
        courier_id: Uuid,
    ) -> CoreResult<Option<ActiveJob>> {
        let state = self.state.lock().await;
        let Some(delivery) = state.deliveries.values().find(|d| {
            d.courier_id == Some(courier_id)
                && matches!(d.status, DeliveryStatus::Accepted | DeliveryStatus::PickedUp)
        }) else {
            return Ok(None);
        };
        let Some(order) = state.orders.get(&delivery.order_id) else {
            return Ok(None);
        };
        let store = state.stores.get(&order.store_id);

        Ok(Some(ActiveJob {
            order_id: order.id,
            total_amount: order.total_amount,
            store_name: store.map(|s| s.name.clone()).unwrap_or_default(),
            store_address: format_store_address(
                store.and_then(|s| s.street.as_deref()),
                store.and_then(|s| s.number.as_deref()),
            ),
            buyer_name: user_name(&state, order.buyer_id),
            delivery_address: format_address(
                &order.address.street,
                &order.address.number,
                order.address.landmark.as_deref(),
            ),
            buyer_whatsapp: order.address.whatsapp.clone(),
            pickup_code: order.pickup_code.clone(),
            delivery_status: delivery.status,
            items: order
                .items
                .iter()
                .map(|item| JobItem {
                    product_name: item.product_name.clone(),
                    quantity: item.quantity,
                    selected_options: item.selected_options.clone(),
                })
                .collect(),
        }))
    }

    async fn orders_for_buyer(&self, buyer_id: Uuid) -> CoreResult<Vec<OrderHistoryEntry>> {
        let state = self.state.lock().await;
        let mut entries: Vec<OrderHistoryEntry> = state
            .orders
            .values()
            .filter(|o| o.buyer_id == buyer_id)
            .map(|o| history_entry(&state, o))
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }

    async fn orders_for_store(&self, store_id: Uuid) -> CoreResult<Vec<OrderHistoryEntry>> {
        let state = self.state.lock().await;
        let mut entries: Vec<OrderHistoryEntry> = state
            .orders
            .values()
            .filter(|o| o.store_id == store_id)
            .map(|o| history_entry(&state, o))
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }
}

fn store_name(state: &MemState, store_id: Uuid) -> String {
    state
        .stores
        .get(&store_id)
        .map(|s| s.name.clone())
        .unwrap_or_default()
}

fn user_name(state: &MemState, user_id: Uuid) -> String {
    state
        .users
        .get(&user_id)
        .map(|u| u.full_name.clone())
        .unwrap_or_default()
}

fn history_entry(state: &MemState, order: &Order) -> OrderHistoryEntry {
    let delivery = state.deliveries.get(&order.id);
    OrderHistoryEntry {
        order_id: order.id,
        total_amount: order.total_amount,
        status: order.status,
        delivery_method: order.delivery_method,
        created_at: order.created_at,
        delivery_code: order.delivery_code.clone(),
        store_name: store_name(state, order.store_id),
        buyer_name: user_name(state, order.buyer_id),
        courier_name: delivery
            .and_then(|d| d.courier_id)
            .map(|id| user_name(state, id)),
        delivery_status: delivery.map(|d| d.status),
        packing_started_at: delivery.and_then(|d| d.packing_started_at),
        picked_up_at: delivery.and_then(|d| d.picked_up_at),
        address: order.address.clone(),
        items: order
            .items
            .iter()
            .map(|item| JobItem {
                product_name: item.product_name.clone(),
                quantity: item.quantity,
                selected_options: item.selected_options.clone(),
            })
            .collect(),
    }
}
