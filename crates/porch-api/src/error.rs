use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use porch_social::SocialError;

/// HTTP face of a [`SocialError`].
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub SocialError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            SocialError::NotFound(_) => StatusCode::NOT_FOUND,
            SocialError::Conflict(_) => StatusCode::CONFLICT,
            SocialError::Unauthenticated => StatusCode::UNAUTHORIZED,
            SocialError::Forbidden => StatusCode::FORBIDDEN,
            SocialError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            SocialError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            SocialError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self.0 {
            SocialError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
