use crate::shipping::ShippingOptions;
use async_trait::async_trait;
use feira_core::CoreResult;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The slice of a catalog product that pricing and checkout need.
///
/// A snapshot, not the live product row: name and unit price are copied onto
/// order items so later catalog edits never rewrite order history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub id: Uuid,
    pub name: String,
    pub unit_price: Decimal,
    pub store_id: Uuid,
    pub store_name: String,
    pub seller_id: Uuid,
    pub shipping: ShippingOptions,
}

/// The slice of a store record that fulfillment needs: who owns it, where
/// the courier collects, and whether it keeps a contracted courier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorefrontInfo {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub name: String,
    pub street: Option<String>,
    pub number: Option<String>,
    pub contracted_courier_id: Option<Uuid>,
}

/// Read access to the catalog owned by the listings service.
#[async_trait]
pub trait CatalogReader: Send + Sync {
    /// Look up the products referenced by a cart.
    ///
    /// Unknown or inactive ids are simply absent from the result; pricing
    /// skips them rather than failing the whole cart.
    async fn products_for_cart(&self, ids: &[Uuid]) -> CoreResult<Vec<ProductSnapshot>>;

    /// Look up one store.
    async fn storefront(&self, store_id: Uuid) -> CoreResult<Option<StorefrontInfo>>;
}
