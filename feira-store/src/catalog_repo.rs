use crate::db_error;
use async_trait::async_trait;
use feira_catalog::product::{CatalogReader, ProductSnapshot, StorefrontInfo};
use feira_catalog::shipping::ShippingOptions;
use feira_core::CoreResult;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    price: Decimal,
    store_id: Uuid,
    store_name: String,
    seller_id: Uuid,
    shipping_options: Option<serde_json::Value>,
}

#[derive(sqlx::FromRow)]
struct StoreRow {
    id: Uuid,
    seller_id: Uuid,
    name: String,
    street: Option<String>,
    number: Option<String>,
    contracted_courier_id: Option<Uuid>,
}

#[async_trait]
impl CatalogReader for PgCatalog {
    async fn products_for_cart(&self, ids: &[Uuid]) -> CoreResult<Vec<ProductSnapshot>> {
        let rows: Vec<ProductRow> = sqlx::query_as(
            r#"
            SELECT p.id, p.name, p.price, p.store_id, s.name AS store_name,
                   s.seller_id, p.shipping_options
            FROM products p
            JOIN stores s ON s.id = p.store_id
            WHERE p.id = ANY($1) AND p.is_active
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(rows
            .into_iter()
            .map(|row| ProductSnapshot {
                id: row.id,
                name: row.name,
                unit_price: row.price,
                store_id: row.store_id,
                store_name: row.store_name,
                seller_id: row.seller_id,
                shipping: ShippingOptions::parse_lenient(row.shipping_options.as_ref()),
            })
            .collect())
    }

    async fn storefront(&self, store_id: Uuid) -> CoreResult<Option<StorefrontInfo>> {
        let row: Option<StoreRow> = sqlx::query_as(
            "SELECT id, seller_id, name, street, number, contracted_courier_id FROM stores WHERE id = $1",
        )
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(row.map(|row| StorefrontInfo {
            id: row.id,
            seller_id: row.seller_id,
            name: row.name,
            street: row.street,
            number: row.number,
            contracted_courier_id: row.contracted_courier_id,
        }))
    }
}
