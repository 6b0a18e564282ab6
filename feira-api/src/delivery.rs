use axum::{
    extract::{Path, State},
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use feira_core::identity::CallerProfile;
use feira_order::workflow::{AvailableJobs, CurrentDelivery};

use crate::error::ApiError;
use crate::middleware::auth::{any_auth_middleware, courier_auth_middleware};
use crate::state::AppState;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ConfirmDeliveryRequest {
    pub order_id: Uuid,
    pub confirmation_code: String,
}

// ============================================================================
// Routes
// ============================================================================

pub fn routes(state: AppState) -> Router<AppState> {
    let courier = Router::new()
        .route("/v1/delivery/available", get(available_jobs))
        .route("/v1/delivery/accept/{order_id}", post(accept_delivery))
        .route("/v1/delivery/current", get(current_delivery))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            courier_auth_middleware,
        ));

    // Either the assigned courier or the seller can close a delivery; the
    // workflow decides which, so the route only requires a signed-in caller.
    let confirm = Router::new()
        .route("/v1/delivery/confirm", post(confirm_delivery))
        .route_layer(middleware::from_fn_with_state(state, any_auth_middleware));

    courier.merge(confirm)
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /v1/delivery/available
/// Open marketplace jobs, oldest first. A courier already on a run gets an
/// empty list and a notice rather than an error.
async fn available_jobs(
    State(state): State<AppState>,
    Extension(courier): Extension<CallerProfile>,
) -> Result<Json<Value>, ApiError> {
    let body = match state.workflow.available_jobs(&courier).await? {
        AvailableJobs::Busy => json!({
            "success": true,
            "jobs": [],
            "message": "Complete your current delivery to accept new jobs.",
        }),
        AvailableJobs::Open(jobs) => json!({ "success": true, "jobs": jobs }),
    };
    Ok(Json(body))
}

/// POST /v1/delivery/accept/{order_id}
/// First courier in wins the job and gets the store pickup code back.
async fn accept_delivery(
    State(state): State<AppState>,
    Extension(courier): Extension<CallerProfile>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let pickup_code = state.workflow.accept(&courier, order_id).await?;
    Ok(Json(json!({
        "success": true,
        "pickup_code": pickup_code,
        "message": "Delivery accepted. Show the pickup code at the store.",
    })))
}

/// GET /v1/delivery/current
/// The courier's run sheet: at most one active delivery with addresses,
/// items and the pickup code.
async fn current_delivery(
    State(state): State<AppState>,
    Extension(courier): Extension<CallerProfile>,
) -> Result<Json<Value>, ApiError> {
    let body = match state.workflow.current(&courier).await? {
        CurrentDelivery::Idle => json!({ "success": true, "delivery": null }),
        CurrentDelivery::Reconciled => json!({
            "success": true,
            "delivery": null,
            "message": "Your availability was restored.",
        }),
        CurrentDelivery::Active(job) => json!({ "success": true, "delivery": job }),
    };
    Ok(Json(body))
}

/// POST /v1/delivery/confirm
/// Buyer-held code closes the loop: order completes, seller gets credited,
/// the courier is freed. Failures stay deliberately vague.
async fn confirm_delivery(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerProfile>,
    Json(req): Json<ConfirmDeliveryRequest>,
) -> Result<Json<Value>, ApiError> {
    tracing::debug!(order_id = %req.order_id, "delivery confirmation attempt");

    let confirmed = state
        .workflow
        .confirm_delivery(&caller, req.order_id, &req.confirmation_code)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Delivery confirmed. Payment released to the seller.",
        "order_id": confirmed.order_id,
        "settlement": confirmed.settlement,
    })))
}
