use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use feira_catalog::pricing::CartLine;
use feira_core::identity::CallerProfile;
use feira_core::CoreError;
use feira_order::checkout::CheckoutReceipt;
use feira_order::models::{DeliveryMethod, OrderStatus};
use feira_order::workflow::{BuyerOrderView, StatusSnapshot};
use feira_order::OrderHistoryEntry;

use crate::error::ApiError;
use crate::middleware::auth::{buyer_auth_middleware, seller_auth_middleware};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub items: Vec<CartLine>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub success: bool,
    pub order_id: Uuid,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub init_point: Option<String>,
}

impl From<CheckoutReceipt> for CheckoutResponse {
    fn from(receipt: CheckoutReceipt) -> Self {
        Self {
            success: true,
            order_id: receipt.order_id,
            total_amount: receipt.total_amount,
            status: receipt.status,
            init_point: receipt.init_point,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DeliveryMethodRequest {
    pub method: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmPickupRequest {
    pub pickup_code: String,
}

#[derive(Debug, Serialize)]
pub struct OrderHistoryResponse {
    pub success: bool,
    pub orders: Vec<BuyerOrderView>,
}

#[derive(Debug, Serialize)]
pub struct StoreOrdersResponse {
    pub success: bool,
    pub orders: Vec<OrderHistoryEntry>,
}

#[derive(Debug, Serialize)]
pub struct OrderStatusResponse {
    pub success: bool,
    #[serde(flatten)]
    pub snapshot: StatusSnapshot,
}

// ============================================================================
// Routes
// ============================================================================

pub fn routes(state: AppState) -> Router<AppState> {
    let buyer = Router::new()
        .route("/v1/orders", post(create_order))
        .route("/v1/orders/simulate", post(simulate_order))
        .route("/v1/orders/mine", get(my_orders))
        .route("/v1/orders/{id}/status", get(order_status))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            buyer_auth_middleware,
        ));

    let seller = Router::new()
        .route("/v1/orders/{id}/delivery-method", post(choose_delivery_method))
        .route("/v1/orders/{id}/dispatch", post(dispatch_order))
        .route("/v1/orders/{id}/confirm-pickup", post(confirm_pickup))
        .route("/v1/orders/store/{store_id}", get(store_orders))
        .route_layer(middleware::from_fn_with_state(
            state,
            seller_auth_middleware,
        ));

    buyer.merge(seller)
}

// ============================================================================
// Buyer handlers
// ============================================================================

/// POST /v1/orders
/// Single-store checkout: reserves stock, stages the order, redirects the
/// buyer to the payment provider.
async fn create_order(
    State(state): State<AppState>,
    Extension(buyer): Extension<CallerProfile>,
    Json(req): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutResponse>), ApiError> {
    let receipt = state.checkout.checkout(&buyer, &req.items).await?;
    Ok((StatusCode::CREATED, Json(receipt.into())))
}

/// POST /v1/orders/simulate
/// Same checkout without the provider round-trip; the order lands in
/// `Processing` immediately.
async fn simulate_order(
    State(state): State<AppState>,
    Extension(buyer): Extension<CallerProfile>,
    Json(req): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutResponse>), ApiError> {
    let receipt = state.checkout.checkout_simulated(&buyer, &req.items).await?;
    Ok((StatusCode::CREATED, Json(receipt.into())))
}

/// GET /v1/orders/mine
async fn my_orders(
    State(state): State<AppState>,
    Extension(buyer): Extension<CallerProfile>,
) -> Result<Json<OrderHistoryResponse>, ApiError> {
    let orders = state.workflow.orders_for_buyer(&buyer).await?;
    Ok(Json(OrderHistoryResponse {
        success: true,
        orders,
    }))
}

/// GET /v1/orders/{id}/status
/// Polling read for the buyer's order-tracking screen.
async fn order_status(
    State(state): State<AppState>,
    Extension(buyer): Extension<CallerProfile>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderStatusResponse>, ApiError> {
    let snapshot = state.workflow.order_status(&buyer, order_id).await?;
    Ok(Json(OrderStatusResponse {
        success: true,
        snapshot,
    }))
}

// ============================================================================
// Seller handlers
// ============================================================================

/// POST /v1/orders/{id}/delivery-method
/// Seller picks who carries a `Processing` order: `Marketplace` opens the job
/// to couriers, `Contracted` assigns the store's own courier.
async fn choose_delivery_method(
    State(state): State<AppState>,
    Extension(seller): Extension<CallerProfile>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<DeliveryMethodRequest>,
) -> Result<Json<Value>, ApiError> {
    let method: DeliveryMethod = req
        .method
        .parse()
        .map_err(|_| CoreError::Validation("Invalid delivery method.".into()))?;

    state.workflow.decide(&seller, order_id, method).await?;

    let message = match method {
        DeliveryMethod::Marketplace => "Delivery requested; the job is open to couriers.",
        DeliveryMethod::Contracted => "Contracted courier assigned.",
        DeliveryMethod::Seller => unreachable!("decide rejects seller-run delivery"),
    };
    Ok(Json(json!({ "success": true, "message": message })))
}

/// POST /v1/orders/{id}/dispatch
/// Seller delivers it themselves; no courier is involved and packing starts
/// right away.
async fn dispatch_order(
    State(state): State<AppState>,
    Extension(seller): Extension<CallerProfile>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    state.workflow.dispatch(&seller, order_id).await?;
    Ok(Json(
        json!({ "success": true, "message": "Order dispatched and ready for delivery." }),
    ))
}

/// POST /v1/orders/{id}/confirm-pickup
/// Seller hands the package to the courier against the pickup code.
async fn confirm_pickup(
    State(state): State<AppState>,
    Extension(seller): Extension<CallerProfile>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<ConfirmPickupRequest>,
) -> Result<Json<Value>, ApiError> {
    state
        .workflow
        .confirm_pickup(&seller, order_id, &req.pickup_code)
        .await?;
    Ok(Json(
        json!({ "success": true, "message": "Pickup confirmed." }),
    ))
}

/// GET /v1/orders/store/{store_id}
async fn store_orders(
    State(state): State<AppState>,
    Extension(seller): Extension<CallerProfile>,
    Path(store_id): Path<Uuid>,
) -> Result<Json<StoreOrdersResponse>, ApiError> {
    let orders = state.workflow.orders_for_store(&seller, store_id).await?;
    Ok(Json(StoreOrdersResponse {
        success: true,
        orders,
    }))
}
