use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Errors returned by gallery handlers.
#[derive(Debug, thiserror::Error)]
pub enum GalleryError {
    /// The request names something the gallery refuses to serve.
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type GalleryResult<T> = Result<T, GalleryError>;

impl IntoResponse for GalleryError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            GalleryError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            GalleryError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            GalleryError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal gallery error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        (status, axum::Json(json!({ "error": message, "code": code }))).into_response()
    }
}
