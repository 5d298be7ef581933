//! Rejections for inbound location updates.
//!
//! [`ValidationError`] converts into a `400` response carrying
//! [`shared::ErrorResponse`], so HTTP handlers can return it with `?`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use shared::ErrorResponse;

/// Why an update was rejected. The store is never touched when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// `latitude`/`longitude` missing, non-numeric or non-finite.
    #[error("latitude and longitude are required and must be numbers")]
    InvalidCoordinates,

    /// Request body was not parseable JSON.
    #[error("invalid JSON")]
    MalformedPayload,
}

impl IntoResponse for ValidationError {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(self.to_string())),
        )
            .into_response()
    }
}
