//! Detection endpoint

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::{debug, warn};

use crate::error::{ApiError, ApiResult};
use crate::models::DetectResponse;
use crate::services::detection::ValidationError;
use crate::AppState;

/// Multipart field carrying the image
pub const IMAGE_FIELD: &str = "image";

struct Upload {
    bytes: Vec<u8>,
    media_type: String,
}

/// POST /api/detect
pub async fn detect_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<DetectResponse>> {
    let mut multipart = multipart.map_err(|e| {
        debug!("[API] multipart rejected: {}", e);
        ApiError::BadRequest(ValidationError::MissingFile.to_string())
    })?;

    let limit = state.service.max_upload_bytes();
    let upload = read_image_field(&mut multipart, limit)
        .await?
        .ok_or_else(|| ApiError::BadRequest(ValidationError::MissingFile.to_string()))?;

    // Run on its own task so a panic inside the pipeline surfaces as a 500
    let service = state.service.clone();
    let response = tokio::spawn(async move {
        service.detect(upload.bytes, &upload.media_type).await
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(Json(response))
}

async fn read_image_field(multipart: &mut Multipart, limit: usize) -> ApiResult<Option<Upload>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let media_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
        return Ok(Some(Upload {
            bytes: bytes.to_vec(),
            media_type,
        }));
    }
    Ok(None)
}

fn multipart_error(err: MultipartError, limit: usize) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ApiError::BadRequest(
            ValidationError::TooLarge {
                size: limit + 1,
                limit,
            }
            .to_string(),
        );
    }
    warn!("[API] malformed multipart body: {}", err.body_text());
    ApiError::BadRequest(format!("Malformed upload: {}", err.body_text()))
}

pub fn detect_routes() -> Router<AppState> {
    Router::new().route("/api/detect", post(detect_image))
}
