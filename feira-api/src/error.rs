use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use feira_core::CoreError;
use serde_json::json;

#[derive(Debug)]
pub enum ApiError {
    Core(CoreError),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Core(CoreError::Validation(msg)) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Core(CoreError::Permission(msg)) => (StatusCode::FORBIDDEN, msg),
            ApiError::Core(CoreError::NotFound(msg)) => (StatusCode::NOT_FOUND, msg),
            ApiError::Core(CoreError::Conflict(msg)) => (StatusCode::CONFLICT, msg),
            ApiError::Core(CoreError::Upstream(msg)) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::Core(CoreError::Integrity(msg)) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error.".to_string(),
                )
            }
            ApiError::Internal(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error.".to_string(),
                )
            }
        };

        let body = Json(json!({
            "success": false,
            "message": message,
        }));

        (status, body).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self::Core(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}
