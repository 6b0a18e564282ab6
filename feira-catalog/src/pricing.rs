use crate::product::ProductSnapshot;
use feira_shared::money::round2;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// One line of a buyer's cart as submitted by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: Uuid,
    pub quantity: i32,
    /// Variant choices (size, color, ...) echoed back verbatim and stored
    /// on the order item.
    #[serde(default)]
    pub selected_options: serde_json::Value,
}

impl CartLine {
    /// Options as submitted, with absent normalized to an empty object.
    pub fn options_or_empty(&self) -> serde_json::Value {
        if self.selected_options.is_null() {
            serde_json::json!({})
        } else {
            self.selected_options.clone()
        }
    }
}

/// A cart priced out: grand totals plus the per-store grouping the client
/// renders. Checkout reads the same figures, so preview and charge can
/// never disagree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartBreakdown {
    pub items_subtotal: Decimal,
    pub shipping_total: Decimal,
    pub grand_total: Decimal,
    pub store_count: usize,
    pub stores: Vec<StoreBreakdown>,
}

impl CartBreakdown {
    /// The breakdown of a cart with nothing priceable in it.
    pub fn empty() -> Self {
        Self {
            items_subtotal: Decimal::ZERO,
            shipping_total: Decimal::ZERO,
            grand_total: Decimal::ZERO,
            store_count: 0,
            stores: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreBreakdown {
    pub store_id: Uuid,
    pub store_name: String,
    pub items: Vec<PricedItem>,
    pub items_subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub total_with_shipping: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricedItem {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    pub selected_options: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Charged per store when it has no shipping row for the buyer's city.
    pub fallback_shipping_fee: Decimal,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            fallback_shipping_fee: Decimal::new(500, 2),
        }
    }
}

/// Prices carts. The only place in the system where cart totals are computed:
/// the live preview endpoint and checkout both call [`PricingEngine::price_cart`].
pub struct PricingEngine {
    config: PricingConfig,
}

impl PricingEngine {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    /// Price a cart against the product snapshots the catalog returned.
    ///
    /// Lines whose product is not in `products` are skipped (the catalog
    /// already filtered unknown and inactive ids). Shipping is charged once
    /// per store; the first cart line of each store decides the fee from its
    /// shipping table, falling back to the configured default when the table
    /// has no row for the buyer's city or the buyer has no city at all.
    pub fn price_cart(
        &self,
        lines: &[CartLine],
        products: &[ProductSnapshot],
        buyer_city: Option<i64>,
    ) -> CartBreakdown {
        let by_id: HashMap<Uuid, &ProductSnapshot> =
            products.iter().map(|p| (p.id, p)).collect();

        let mut stores: Vec<StoreBreakdown> = Vec::new();
        let mut items_subtotal = Decimal::ZERO;

        for line in lines {
            let Some(product) = by_id.get(&line.product_id) else {
                tracing::warn!(product_id = %line.product_id, "cart line skipped: unknown product");
                continue;
            };

            let line_total = product.unit_price * Decimal::from(line.quantity);
            items_subtotal += line_total;

            let store_idx = match stores.iter().position(|s| s.store_id == product.store_id) {
                Some(idx) => idx,
                None => {
                    let shipping_cost = self.store_shipping_fee(product, buyer_city);
                    stores.push(StoreBreakdown {
                        store_id: product.store_id,
                        store_name: product.store_name.clone(),
                        items: Vec::new(),
                        items_subtotal: Decimal::ZERO,
                        shipping_cost,
                        total_with_shipping: Decimal::ZERO,
                    });
                    stores.len() - 1
                }
            };

            let store = &mut stores[store_idx];
            store.items.push(PricedItem {
                product_id: product.id,
                product_name: product.name.clone(),
                quantity: line.quantity,
                unit_price: product.unit_price,
                line_total,
                selected_options: line.options_or_empty(),
            });
            store.items_subtotal += line_total;
        }

        let mut shipping_total = Decimal::ZERO;
        for store in &mut stores {
            shipping_total += store.shipping_cost;
            store.total_with_shipping = store.items_subtotal + store.shipping_cost;
        }

        CartBreakdown {
            items_subtotal: round2(items_subtotal),
            shipping_total: round2(shipping_total),
            grand_total: round2(items_subtotal + shipping_total),
            store_count: stores.len(),
            stores,
        }
    }

    fn store_shipping_fee(&self, product: &ProductSnapshot, buyer_city: Option<i64>) -> Decimal {
        if product.shipping.is_empty() {
            return self.config.fallback_shipping_fee;
        }
        let Some(city_id) = buyer_city else {
            tracing::warn!(
                store_id = %product.store_id,
                "buyer has no city on file, using fallback shipping fee"
            );
            return self.config.fallback_shipping_fee;
        };
        match product.shipping.resolve(city_id) {
            Some(cost) => cost,
            None => {
                tracing::warn!(
                    store_id = %product.store_id,
                    city_id,
                    "no shipping row for buyer city, using fallback fee"
                );
                self.config.fallback_shipping_fee
            }
        }
    }
}

impl Default for PricingEngine {
    fn default() -> Self {
        Self::new(PricingConfig::default())
    }
}
