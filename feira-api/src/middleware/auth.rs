use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
    Json,
};
use feira_core::identity::Role;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::state::AppState;

// ============================================================================
// JWT Claims
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// User id as issued by the identity service.
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

fn reject(status: StatusCode, message: &str) -> (StatusCode, Json<Value>) {
    (
        status,
        Json(json!({ "success": false, "message": message })),
    )
}

// ============================================================================
// Role-gated authentication middleware
// ============================================================================

pub async fn buyer_auth_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<Value>)> {
    authenticate(state, req, next, Some(Role::Buyer)).await
}

pub async fn seller_auth_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<Value>)> {
    authenticate(state, req, next, Some(Role::Seller)).await
}

pub async fn courier_auth_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<Value>)> {
    authenticate(state, req, next, Some(Role::Courier)).await
}

/// Any signed-in role; the operation itself decides who may act.
pub async fn any_auth_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<Value>)> {
    authenticate(state, req, next, None).await
}

async fn authenticate(
    state: AppState,
    mut req: Request,
    next: Next,
    required: Option<Role>,
) -> Result<Response, (StatusCode, Json<Value>)> {
    // 1. Extract token from Authorization header
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| reject(StatusCode::UNAUTHORIZED, "Authentication required."))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| reject(StatusCode::UNAUTHORIZED, "Authentication required."))?;

    // 2. Decode and validate JWT
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| reject(StatusCode::UNAUTHORIZED, "Invalid or expired token."))?;

    // 3. Check the token carries the role this route group expects
    let token_role: Role = token_data
        .claims
        .role
        .parse()
        .map_err(|_| reject(StatusCode::UNAUTHORIZED, "Invalid or expired token."))?;
    if let Some(required) = required {
        if token_role != required {
            return Err(reject(StatusCode::FORBIDDEN, "Access denied."));
        }
    }

    // 4. Resolve the caller's current profile; token claims go stale, the
    //    directory does not
    let user_id = Uuid::parse_str(&token_data.claims.sub)
        .map_err(|_| reject(StatusCode::UNAUTHORIZED, "Invalid or expired token."))?;
    let profile = state
        .directory
        .load_caller(user_id)
        .await
        .map_err(|err| {
            tracing::error!("Failed to load caller {}: {}", user_id, err);
            reject(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error.")
        })?
        .ok_or_else(|| reject(StatusCode::UNAUTHORIZED, "Account not found."))?;

    // 5. Inject the profile into request extensions
    req.extensions_mut().insert(profile);

    Ok(next.run(req).await)
}
