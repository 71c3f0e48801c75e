use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cinedex_core::EngineError;
use serde_json::json;
use thiserror::Error;

/// Admin-surface error envelope. The provide endpoints never use this;
/// they answer 200 with an empty list instead, which is what MacCMS
/// clients expect.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::SourceNotFound(_) => ApiError::NotFound(e.to_string()),
            EngineError::SourceDisabled(_) | EngineError::InvalidWindow(_) => {
                ApiError::BadRequest(e.to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "code": 0, "msg": self.to_string() }))).into_response()
    }
}
