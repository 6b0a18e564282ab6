use axum::{extract::State, middleware, routing::post, Extension, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use feira_catalog::pricing::{CartBreakdown, CartLine};
use feira_core::identity::CallerProfile;

use crate::error::ApiError;
use crate::middleware::auth::buyer_auth_middleware;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct PriceCartRequest {
    pub items: Vec<CartLine>,
}

#[derive(Debug, Serialize)]
pub struct PriceCartResponse {
    pub success: bool,
    #[serde(flatten)]
    pub breakdown: CartBreakdown,
}

// ============================================================================
// Routes
// ============================================================================

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/cart/price", post(price_cart))
        .route_layer(middleware::from_fn_with_state(state, buyer_auth_middleware))
}

/// POST /v1/cart/price
/// Live preview of the cart: per-store subtotals, shipping, grand total.
/// Unknown or inactive products silently drop out, same as at checkout.
async fn price_cart(
    State(state): State<AppState>,
    Extension(buyer): Extension<CallerProfile>,
    Json(req): Json<PriceCartRequest>,
) -> Result<Json<PriceCartResponse>, ApiError> {
    let ids: Vec<Uuid> = req.items.iter().map(|line| line.product_id).collect();
    let products = state.catalog.products_for_cart(&ids).await?;
    let breakdown = state.pricing.price_cart(&req.items, &products, buyer.city_id);

    Ok(Json(PriceCartResponse {
        success: true,
        breakdown,
    }))
}
