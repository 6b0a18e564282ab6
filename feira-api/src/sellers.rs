use axum::{extract::State, middleware, routing::get, Extension, Json, Router};
use rust_decimal::Decimal;
use serde::Serialize;

use feira_core::identity::CallerProfile;

use crate::error::ApiError;
use crate::middleware::auth::seller_auth_middleware;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub success: bool,
    pub pending_balance: Decimal,
    pub marketplace_fee_rate: Decimal,
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/sellers/me/balance", get(my_balance))
        .route_layer(middleware::from_fn_with_state(
            state,
            seller_auth_middleware,
        ))
}

/// GET /v1/sellers/me/balance
/// Earnings waiting on payout, plus the fee rate they were computed with.
async fn my_balance(
    State(state): State<AppState>,
    Extension(seller): Extension<CallerProfile>,
) -> Result<Json<BalanceResponse>, ApiError> {
    Ok(Json(BalanceResponse {
        success: true,
        pending_balance: seller.pending_balance,
        marketplace_fee_rate: state.business_rules.marketplace_fee_rate,
    }))
}
