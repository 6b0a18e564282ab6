use crate::db_error;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feira_core::identity::AddressSnapshot;
use feira_core::{CoreError, CoreResult};
use feira_order::models::{
    Delivery, DeliveryMethod, DeliveryStatus, Order, OrderItem, OrderStatus,
};
use feira_order::repository::{
    AcceptDelivery, ActiveJob, BeginOrderError, JobItem, JobPreview, OrderDraft,
    OrderHistoryEntry, OrderStore, PendingOrder, StartDelivery,
};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn item_rows_for(&self, order_ids: &[Uuid]) -> CoreResult<Vec<ItemRow>> {
        sqlx::query_as(
            r#"
            SELECT id, order_id, product_id, product_name, unit_price, quantity,
                   selected_options, created_at
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY created_at ASC
            "#,
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)
    }

    async fn load_order_where(&self, clause: &str, bind: &str) -> CoreResult<Option<Order>> {
        let sql = format!(
            r#"
            SELECT id, buyer_id, store_id, total_amount, status, delivery_method,
                   payment_reference, delivery_code, pickup_code,
                   delivery_city_id, delivery_district_id, delivery_street,
                   delivery_number, delivery_landmark, delivery_whatsapp,
                   created_at, updated_at
            FROM orders
            WHERE {clause}
            "#
        );
        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(bind)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        let Some(row) = row else { return Ok(None) };
        let items = self
            .item_rows_for(&[row.id])
            .await?
            .into_iter()
            .map(ItemRow::into_item)
            .collect();
        row.into_order(items).map(Some)
    }

    async fn history_where(&self, clause: &str, bind: Uuid) -> CoreResult<Vec<OrderHistoryEntry>> {
        let sql = format!(
            r#"
            SELECT o.id AS order_id, o.total_amount, o.status, o.delivery_method,
                   o.created_at, o.delivery_code,
                   o.delivery_city_id, o.delivery_district_id, o.delivery_street,
                   o.delivery_number, o.delivery_landmark, o.delivery_whatsapp,
                   s.name AS store_name, b.full_name AS buyer_name,
                   c.full_name AS courier_name, d.status AS delivery_status,
                   d.packing_started_at, d.picked_up_at
            FROM orders o
            JOIN stores s ON s.id = o.store_id
            JOIN users b ON b.id = o.buyer_id
            LEFT JOIN deliveries d ON d.order_id = o.id
            LEFT JOIN users c ON c.id = d.courier_id
            WHERE {clause}
            ORDER BY o.created_at DESC
            "#
        );
        let rows: Vec<HistoryRow> = sqlx::query_as(&sql)
            .bind(bind)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.order_id).collect();
        let mut items_by_order: HashMap<Uuid, Vec<JobItem>> = HashMap::new();
        for item in self.item_rows_for(&ids).await? {
            items_by_order
                .entry(item.order_id)
                .or_default()
                .push(item.into_job_item());
        }

        rows.into_iter()
            .map(|row| {
                let items = items_by_order.remove(&row.order_id).unwrap_or_default();
                row.into_entry(items)
            })
            .collect()
    }
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    buyer_id: Uuid,
    store_id: Uuid,
    total_amount: Decimal,
    status: String,
    delivery_method: Option<String>,
    payment_reference: String,
    delivery_code: String,
    pickup_code: String,
    delivery_city_id: i64,
    delivery_district_id: Option<i64>,
    delivery_street: String,
    delivery_number: String,
    delivery_landmark: Option<String>,
    delivery_whatsapp: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> CoreResult<Order> {
        Ok(Order {
            id: self.id,
            buyer_id: self.buyer_id,
            store_id: self.store_id,
            total_amount: self.total_amount,
            status: parse_col(&self.status)?,
            delivery_method: self.delivery_method.as_deref().map(parse_col).transpose()?,
            payment_reference: self.payment_reference,
            delivery_code: self.delivery_code,
            pickup_code: self.pickup_code,
            address: AddressSnapshot {
                city_id: self.delivery_city_id,
                district_id: self.delivery_district_id,
                street: self.delivery_street,
                number: self.delivery_number,
                landmark: self.delivery_landmark,
                whatsapp: self.delivery_whatsapp,
            },
            items,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: Uuid,
    order_id: Uuid,
    product_id: Uuid,
    product_name: String,
    unit_price: Decimal,
    quantity: i32,
    selected_options: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl ItemRow {
    fn into_item(self) -> OrderItem {
        OrderItem {
            id: self.id,
            order_id: self.order_id,
            product_id: self.product_id,
            product_name: self.product_name,
            unit_price: self.unit_price,
            quantity: self.quantity,
            selected_options: self.selected_options,
            created_at: self.created_at,
        }
    }

    fn into_job_item(self) -> JobItem {
        JobItem {
            product_name: self.product_name,
            quantity: self.quantity,
            selected_options: self.selected_options,
        }
    }
}

#[derive(sqlx::FromRow)]
struct DeliveryRow {
    id: Uuid,
    order_id: Uuid,
    courier_id: Option<Uuid>,
    status: String,
    method: String,
    packing_started_at: Option<DateTime<Utc>>,
    picked_up_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    buyer_confirmed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl DeliveryRow {
    fn into_delivery(self) -> CoreResult<Delivery> {
        Ok(Delivery {
            id: self.id,
            order_id: self.order_id,
            courier_id: self.courier_id,
            status: parse_col(&self.status)?,
            method: parse_col(&self.method)?,
            packing_started_at: self.packing_started_at,
            picked_up_at: self.picked_up_at,
            delivered_at: self.delivered_at,
            buyer_confirmed_at: self.buyer_confirmed_at,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct JobRow {
    order_id: Uuid,
    total_amount: Decimal,
    store_name: String,
    buyer_name: String,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct ActiveJobRow {
    order_id: Uuid,
    total_amount: Decimal,
    store_name: String,
    store_street: Option<String>,
    store_number: Option<String>,
    buyer_name: String,
    delivery_street: String,
    delivery_number: String,
    delivery_landmark: Option<String>,
    delivery_whatsapp: Option<String>,
    pickup_code: String,
    delivery_status: String,
}

#[derive(sqlx::FromRow)]
struct HistoryRow {
    order_id: Uuid,
    total_amount: Decimal,
    status: String,
    delivery_method: Option<String>,
    created_at: DateTime<Utc>,
    delivery_code: String,
    delivery_city_id: i64,
    delivery_district_id: Option<i64>,
    delivery_street: String,
    delivery_number: String,
    delivery_landmark: Option<String>,
    delivery_whatsapp: Option<String>,
    store_name: String,
    buyer_name: String,
    courier_name: Option<String>,
    delivery_status: Option<String>,
    packing_started_at: Option<DateTime<Utc>>,
    picked_up_at: Option<DateTime<Utc>>,
}

impl HistoryRow {
    fn into_entry(self, items: Vec<JobItem>) -> CoreResult<OrderHistoryEntry> {
        Ok(OrderHistoryEntry {
            order_id: self.order_id,
            total_amount: self.total_amount,
            status: parse_col(&self.status)?,
            delivery_method: self.delivery_method.as_deref().map(parse_col).transpose()?,
            created_at: self.created_at,
            delivery_code: self.delivery_code,
            store_name: self.store_name,
            buyer_name: self.buyer_name,
            courier_name: self.courier_name,
            delivery_status: self.delivery_status.as_deref().map(parse_col).transpose()?,
            packing_started_at: self.packing_started_at,
            picked_up_at: self.picked_up_at,
            address: AddressSnapshot {
                city_id: self.delivery_city_id,
                district_id: self.delivery_district_id,
                street: self.delivery_street,
                number: self.delivery_number,
                landmark: self.delivery_landmark,
                whatsapp: self.delivery_whatsapp,
            },
            items,
        })
    }
}

struct PgPendingOrder {
    order_id: Uuid,
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl PendingOrder for PgPendingOrder {
    async fn commit(mut self: Box<Self>, payment_reference: &str) -> CoreResult<()> {
        sqlx::query("UPDATE orders SET payment_reference = $1, updated_at = NOW() WHERE id = $2")
            .bind(payment_reference)
            .bind(self.order_id)
            .execute(&mut *self.tx)
            .await
            .map_err(db_error)?;
        self.tx.commit().await.map_err(db_error)
    }

    async fn abort(self: Box<Self>) -> CoreResult<()> {
        self.tx.rollback().await.map_err(db_error)
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn begin_order(
        &self,
        draft: OrderDraft,
    ) -> Result<Box<dyn PendingOrder>, BeginOrderError> {
        let store_err = |e: sqlx::Error| BeginOrderError::Store(db_error(e));
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        // stock is the first hurdle; the conditional decrement is the only
        // stock check, so two concurrent carts can never both win the last unit
        for item in &draft.items {
            let updated = sqlx::query(
                "UPDATE products SET stock = stock - $1, updated_at = NOW() WHERE id = $2 AND stock >= $1",
            )
            .bind(item.quantity)
            .bind(item.product_id)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;

            if updated.rows_affected() == 0 {
                let available: Option<i32> =
                    sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
                        .bind(item.product_id)
                        .fetch_optional(&mut *tx)
                        .await
                        .map_err(store_err)?;
                // dropping the transaction undoes the earlier decrements
                return Err(BeginOrderError::InsufficientStock {
                    product_name: item.product_name.clone(),
                    requested: item.quantity,
                    available: available.unwrap_or(0),
                });
            }
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO orders (id, buyer_id, store_id, total_amount, status, payment_reference,
                                delivery_code, pickup_code, delivery_city_id, delivery_district_id,
                                delivery_street, delivery_number, delivery_landmark, delivery_whatsapp)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(draft.order_id)
        .bind(draft.buyer_id)
        .bind(draft.store_id)
        .bind(draft.total_amount)
        .bind(draft.initial_status.as_str())
        .bind(&draft.payment_reference)
        .bind(&draft.delivery_code)
        .bind(&draft.pickup_code)
        .bind(draft.address.city_id)
        .bind(draft.address.district_id)
        .bind(&draft.address.street)
        .bind(&draft.address.number)
        .bind(&draft.address.landmark)
        .bind(&draft.address.whatsapp)
        .execute(&mut *tx)
        .await;

        if let Err(err) = inserted {
            if is_code_collision(&err) {
                return Err(BeginOrderError::CodeCollision);
            }
            return Err(store_err(err));
        }

        for item in &draft.items {
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, product_id, product_name, unit_price,
                                         quantity, selected_options)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(draft.order_id)
            .bind(item.product_id)
            .bind(&item.product_name)
            .bind(item.unit_price)
            .bind(item.quantity)
            .bind(&item.selected_options)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        }

        Ok(Box::new(PgPendingOrder {
            order_id: draft.order_id,
            tx,
        }))
    }

    async fn load_order(&self, id: Uuid) -> CoreResult<Option<Order>> {
        let row: Option<OrderRow> = sqlx::query_as(
            r#"
            SELECT id, buyer_id, store_id, total_amount, status, delivery_method,
                   payment_reference, delivery_code, pickup_code,
                   delivery_city_id, delivery_district_id, delivery_street,
                   delivery_number, delivery_landmark, delivery_whatsapp,
                   created_at, updated_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        let Some(row) = row else { return Ok(None) };
        let items = self
            .item_rows_for(&[row.id])
            .await?
            .into_iter()
            .map(ItemRow::into_item)
            .collect();
        row.into_order(items).map(Some)
    }

    async fn find_by_delivery_code(&self, delivery_code: &str) -> CoreResult<Option<Order>> {
        self.load_order_where("delivery_code = $1", delivery_code)
            .await
    }

    async fn load_delivery(&self, order_id: Uuid) -> CoreResult<Option<Delivery>> {
        let row: Option<DeliveryRow> = sqlx::query_as(
            r#"
            SELECT id, order_id, courier_id, status, method, packing_started_at,
                   picked_up_at, delivered_at, buyer_confirmed_at, created_at
            FROM deliveries
            WHERE order_id = $1
            "#,
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(DeliveryRow::into_delivery).transpose()
    }

    async fn confirm_payment(&self, payment_reference: &str) -> CoreResult<bool> {
        let res = sqlx::query(
            "UPDATE orders SET status = $1, updated_at = NOW() WHERE payment_reference = $2 AND status = $3",
        )
        .bind(OrderStatus::Processing.as_str())
        .bind(payment_reference)
        .bind(OrderStatus::PendingPayment.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(res.rows_affected() > 0)
    }

    async fn start_delivery(
        &self,
        order_id: Uuid,
        method: DeliveryMethod,
        courier_id: Option<Uuid>,
    ) -> CoreResult<StartDelivery> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        if let Some(courier) = courier_id {
            let claimed = sqlx::query(
                "UPDATE users SET is_available = FALSE WHERE id = $1 AND is_available = TRUE",
            )
            .bind(courier)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
            if claimed.rows_affected() == 0 {
                return Ok(StartDelivery::CourierBusy);
            }
        }

        let moved = sqlx::query(
            "UPDATE orders SET status = $1, delivery_method = $2, updated_at = NOW() WHERE id = $3 AND status = $4",
        )
        .bind(OrderStatus::Delivering.as_str())
        .bind(method.as_str())
        .bind(order_id)
        .bind(OrderStatus::Processing.as_str())
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
        if moved.rows_affected() == 0 {
            return Ok(StartDelivery::NotPending);
        }

        // an open job waits to be claimed, a directly assigned courier
        // starts at Accepted, a seller-run delivery also starts at
        // Accepted but begins packing on the spot
        let (status, packing_now) = match method {
            DeliveryMethod::Marketplace => (DeliveryStatus::Requested, false),
            DeliveryMethod::Contracted => (DeliveryStatus::Accepted, false),
            DeliveryMethod::Seller => (DeliveryStatus::Accepted, true),
        };
        sqlx::query(
            r#"
            INSERT INTO deliveries (id, order_id, courier_id, status, method,
                                    packing_started_at)
            VALUES ($1, $2, $3, $4, $5, CASE WHEN $6 THEN NOW() END)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(order_id)
        .bind(courier_id)
        .bind(status.as_str())
        .bind(method.as_str())
        .bind(packing_now)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        Ok(StartDelivery::Started)
    }

    async fn accept_delivery(
        &self,
        order_id: Uuid,
        courier_id: Uuid,
    ) -> CoreResult<AcceptDelivery> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let claimed = sqlx::query(
            "UPDATE users SET is_available = FALSE WHERE id = $1 AND is_available = TRUE",
        )
        .bind(courier_id)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
        if claimed.rows_affected() == 0 {
            return Ok(AcceptDelivery::CourierBusy);
        }

        let took = sqlx::query(
            "UPDATE deliveries SET courier_id = $1, status = $2 WHERE order_id = $3 AND status = $4 AND courier_id IS NULL",
        )
        .bind(courier_id)
        .bind(DeliveryStatus::Accepted.as_str())
        .bind(order_id)
        .bind(DeliveryStatus::Requested.as_str())
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
        if took.rows_affected() == 0 {
            return Ok(AcceptDelivery::SlotTaken);
        }

        let pickup_code: Option<String> =
            sqlx::query_scalar("SELECT pickup_code FROM orders WHERE id = $1")
                .bind(order_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_error)?;
        let Some(pickup_code) = pickup_code else {
            return Err(CoreError::Integrity("delivery without its order".into()));
        };

        tx.commit().await.map_err(db_error)?;
        Ok(AcceptDelivery::Accepted { pickup_code })
    }

    async fn confirm_pickup(&self, order_id: Uuid) -> CoreResult<bool> {
        let res = sqlx::query(
            "UPDATE deliveries SET status = $1, packing_started_at = NOW(), picked_up_at = NOW() \
             WHERE order_id = $2 AND status = $3",
        )
        .bind(DeliveryStatus::PickedUp.as_str())
        .bind(order_id)
        .bind(DeliveryStatus::Accepted.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(res.rows_affected() > 0)
    }

    async fn settle_delivery(
        &self,
        order_id: Uuid,
        seller_id: Uuid,
        seller_earnings: Decimal,
        release_courier: Option<Uuid>,
    ) -> CoreResult<bool> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        // the status guard is what makes settlement exactly-once
        let completed = sqlx::query(
            "UPDATE orders SET status = $1, updated_at = NOW() WHERE id = $2 AND status = $3",
        )
        .bind(OrderStatus::Completed.as_str())
        .bind(order_id)
        .bind(OrderStatus::Delivering.as_str())
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
        if completed.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query(
            "UPDATE deliveries SET status = $1, delivered_at = NOW(), buyer_confirmed_at = NOW() WHERE order_id = $2",
        )
        .bind(DeliveryStatus::DeliveredConfirmed.as_str())
        .bind(order_id)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        sqlx::query("UPDATE users SET pending_balance = pending_balance + $1 WHERE id = $2")
            .bind(seller_earnings)
            .bind(seller_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        if let Some(courier) = release_courier {
            sqlx::query("UPDATE users SET is_available = TRUE WHERE id = $1")
                .bind(courier)
                .execute(&mut *tx)
                .await
                .map_err(db_error)?;
        }

        tx.commit().await.map_err(db_error)?;
        Ok(true)
    }

    async fn release_courier(&self, courier_id: Uuid) -> CoreResult<()> {
        sqlx::query("UPDATE users SET is_available = TRUE WHERE id = $1")
            .bind(courier_id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn available_jobs(&self) -> CoreResult<Vec<JobPreview>> {
        let rows: Vec<JobRow> = sqlx::query_as(
            r#"
            SELECT o.id AS order_id, o.total_amount, s.name AS store_name,
                   b.full_name AS buyer_name, o.created_at
            FROM deliveries d
            JOIN orders o ON o.id = d.order_id
            JOIN stores s ON s.id = o.store_id
            JOIN users b ON b.id = o.buyer_id
            WHERE d.status = $1 AND d.courier_id IS NULL AND d.method = $2
            ORDER BY o.created_at ASC
            "#,
        )
        .bind(DeliveryStatus::Requested.as_str())
        .bind(DeliveryMethod::Marketplace.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(rows
            .into_iter()
            .map(|row| JobPreview {
                order_id: row.order_id,
                total_amount: row.total_amount,
                store_name: row.store_name,
                buyer_name: row.buyer_name,
                created_at: row.created_at,
            })
            .collect())
    }

    async fn current_delivery_for_courier(
        &self,
        courier_id: Uuid,
    ) -> CoreResult<Option<ActiveJob>> {
        let row: Option<ActiveJobRow> = sqlx::query_as(
            r#"
            SELECT o.id AS order_id, o.total_amount, s.name AS store_name,
                   s.street AS store_street, s.number AS store_number,
                   b.full_name AS buyer_name,
                   o.delivery_street, o.delivery_number, o.delivery_landmark,
                   o.delivery_whatsapp, o.pickup_code, d.status AS delivery_status
            FROM deliveries d
            JOIN orders o ON o.id = d.order_id
            JOIN stores s ON s.id = o.store_id
            JOIN users b ON b.id = o.buyer_id
            WHERE d.courier_id = $1 AND d.status IN ($2, $3)
            "#,
        )
        .bind(courier_id)
        .bind(DeliveryStatus::Accepted.as_str())
        .bind(DeliveryStatus::PickedUp.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        let Some(row) = row else { return Ok(None) };
        let items = self
            .item_rows_for(&[row.order_id])
            .await?
            .into_iter()
            .map(ItemRow::into_job_item)
            .collect();

        Ok(Some(ActiveJob {
            order_id: row.order_id,
            total_amount: row.total_amount,
            store_name: row.store_name,
            store_address: format_store_address(
                row.store_street.as_deref(),
                row.store_number.as_deref(),
            ),
            buyer_name: row.buyer_name,
            delivery_address: format_address(
                &row.delivery_street,
                &row.delivery_number,
                row.delivery_landmark.as_deref(),
            ),
            buyer_whatsapp: row.delivery_whatsapp,
            pickup_code: row.pickup_code,
            delivery_status: parse_col(&row.delivery_status)?,
            items,
        }))
    }

    async fn orders_for_buyer(&self, buyer_id: Uuid) -> CoreResult<Vec<OrderHistoryEntry>> {
        self.history_where("o.buyer_id = $1", buyer_id).await
    }

    async fn orders_for_store(&self, store_id: Uuid) -> CoreResult<Vec<OrderHistoryEntry>> {
        self.history_where("o.store_id = $1", store_id).await
    }
}

fn parse_col<T>(value: &str) -> CoreResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|err: T::Err| CoreError::Integrity(err.to_string()))
}

fn is_code_collision(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db) = err {
        if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation) {
            return matches!(
                db.constraint(),
                Some("orders_delivery_code_key") | Some("orders_pickup_code_key")
            );
        }
    }
    false
}

pub(crate) fn format_address(street: &str, number: &str, landmark: Option<&str>) -> String {
    match landmark {
        Some(l) if !l.is_empty() => format!("{street}, {number} ({l})"),
        _ => format!("{street}, {number}"),
    }
}

pub(crate) fn format_store_address(street: Option<&str>, number: Option<&str>) -> String {
    match (street, number) {
        (Some(s), Some(n)) => format!("{s}, {n}"),
        (Some(s), None) => s.to_string(),
        _ => "Address not provided".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_formatting() {
        assert_eq!(format_address("Rua A", "12", None), "Rua A, 12");
        assert_eq!(
            format_address("Rua A", "12", Some("blue gate")),
            "Rua A, 12 (blue gate)"
        );
        assert_eq!(format_address("Rua A", "12", Some("")), "Rua A, 12");
    }

    #[test]
    fn test_store_address_fallback() {
        assert_eq!(format_store_address(Some("Rua B"), Some("7")), "Rua B, 7");
        assert_eq!(format_store_address(Some("Rua B"), None), "Rua B");
        assert_eq!(format_store_address(None, None), "Address not provided");
    }

    #[test]
    fn test_parse_col_rejects_garbage() {
        let err = parse_col::<OrderStatus>("Shipped").unwrap_err();
        assert!(matches!(err, CoreError::Integrity(_)));
    }
}
