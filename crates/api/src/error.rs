use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use streamvault_engine::BackendError;
use streamvault_store::GatewayError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Video not found: {0}")]
    VideoNotFound(String),

    #[error("Requested range not satisfiable for a {size} byte resource")]
    RangeNotSatisfiable { size: u64 },

    #[error("Backend error: {0}")]
    Backend(BackendError),

    #[error("Storage gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// A backend `NotFound` means the configured id points at nothing,
    /// which callers should see as a plain 404.
    pub fn from_backend(id: &str, err: BackendError) -> Self {
        match err {
            BackendError::NotFound => ApiError::VideoNotFound(id.to_string()),
            other => ApiError::Backend(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            ApiError::VideoNotFound(_) => (StatusCode::NOT_FOUND, "NotFound", self.to_string()),
            ApiError::RangeNotSatisfiable { .. } => (
                StatusCode::RANGE_NOT_SATISFIABLE,
                "RangeNotSatisfiable",
                self.to_string(),
            ),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "InvalidRequest", self.to_string()),
            ApiError::Backend(err) => {
                tracing::error!("backend error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "BackendError",
                    "Failed to read video source".to_string(),
                )
            }
            ApiError::Gateway(err) => {
                tracing::error!("storage gateway error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "StorageError",
                    "Storage operation failed".to_string(),
                )
            }
            ApiError::Internal(err) => {
                tracing::error!("Internal error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "InternalError",
                    "Internal server error".to_string(),
                )
            }
        };

        let mut response = (
            status,
            Json(json!({
                "code": error_code,
                "message": message,
            })),
        )
            .into_response();

        // 416 must tell the client how large the resource actually is.
        if let ApiError::RangeNotSatisfiable { size } = self {
            if let Ok(value) = HeaderValue::from_str(&format!("bytes */{size}")) {
                response.headers_mut().insert(header::CONTENT_RANGE, value);
            }
        }

        response
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
