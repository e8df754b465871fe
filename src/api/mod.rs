//! HTTP API
//!
//! `POST /api/detect` runs the detection pipeline on one multipart upload.
//! `GET /health` reports liveness and the configured engines.

mod detect;
mod health;

pub use detect::{detect_image, detect_routes};
pub use health::{health_check, health_routes, HealthResponse};
