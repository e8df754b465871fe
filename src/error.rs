//! HTTP boundary errors
//!
//! Every failure leaving the server is a JSON body `{"error": <message>}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::services::detection::DetectionError;

pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error during analysis";

#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid input (400)
    #[error("{0}")]
    BadRequest(String),

    /// No engine produced a result (503)
    #[error("{0}")]
    ServiceUnavailable(String),

    /// Unexpected fault (500). The detail is logged, never returned.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::Internal(detail) => {
                error!("[API] internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    INTERNAL_ERROR_MESSAGE.to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<DetectionError> for ApiError {
    fn from(err: DetectionError) -> Self {
        match err {
            DetectionError::Invalid(e) => ApiError::BadRequest(e.to_string()),
            DetectionError::Unavailable(e) => ApiError::ServiceUnavailable(e.to_string()),
        }
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::detection::{AggregationError, ValidationError};
    use http_body_util::BodyExt;

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_detection_errors_map_to_status() {
        let err = DetectionError::from(ValidationError::MissingFile);
        let (status, json) = body_json(err.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "No image file provided");

        let err = DetectionError::from(AggregationError::AllEnginesUnavailable);
        let (status, json) = body_json(err.into()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["error"], "All detection services are currently unavailable.");
    }

    #[tokio::test]
    async fn test_internal_detail_is_not_leaked() {
        let err = ApiError::Internal("task panicked: index out of bounds".into());
        let (status, json) = body_json(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json, json!({ "error": INTERNAL_ERROR_MESSAGE }));
    }
}
