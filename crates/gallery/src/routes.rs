use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::{Path as UrlPath, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::{GalleryError, GalleryResult};
use crate::listing::{self, GalleryPage};

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct GalleryState {
    pub output_dir: Arc<PathBuf>,
}

impl GalleryState {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: Arc::new(output_dir.into()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub page: Option<usize>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub fn router() -> Router<GalleryState> {
    Router::new()
        .route("/", get(list_images))
        .route("/view/{filename}", get(view_image))
        .route("/thumb/{filename}", get(view_thumbnail))
        .route("/health", get(health_check))
}

/// GET /?page=N -- one page of images, generating missing thumbnails.
async fn list_images(
    State(state): State<GalleryState>,
    Query(params): Query<ListParams>,
) -> GalleryResult<Json<GalleryPage>> {
    let page = params.page.unwrap_or(1);
    let output_dir = Arc::clone(&state.output_dir);

    let listing = tokio::task::spawn_blocking(move || build_page(&output_dir, page))
        .await
        .map_err(|e| GalleryError::Internal(format!("Listing task failed: {e}")))??;

    Ok(Json(listing))
}

fn build_page(output_dir: &Path, page: usize) -> GalleryResult<GalleryPage> {
    let files = listing::list_pngs(output_dir).map_err(|e| {
        GalleryError::Internal(format!("cannot list {}: {e}", output_dir.display()))
    })?;

    // Thumbnails are generated for every image, not just the current page.
    for filename in &files {
        match listing::ensure_thumbnail(output_dir, filename) {
            Ok(true) => tracing::debug!(filename = %filename, "Generated thumbnail"),
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(filename = %filename, error = %e, "Failed to generate thumbnail")
            }
        }
    }

    Ok(listing::paginate(files, page))
}

/// GET /view/{filename}
async fn view_image(
    State(state): State<GalleryState>,
    UrlPath(filename): UrlPath<String>,
) -> GalleryResult<impl IntoResponse> {
    serve_png(&state.output_dir, &filename).await
}

/// GET /thumb/{filename}
async fn view_thumbnail(
    State(state): State<GalleryState>,
    UrlPath(filename): UrlPath<String>,
) -> GalleryResult<impl IntoResponse> {
    serve_png(&state.output_dir.join(listing::THUMBNAIL_DIR), &filename).await
}

/// GET /health
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn serve_png(dir: &Path, filename: &str) -> GalleryResult<impl IntoResponse> {
    validate_filename(filename)?;

    match tokio::fs::read(dir.join(filename)).await {
        Ok(bytes) => Ok(([(header::CONTENT_TYPE, "image/png")], bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(GalleryError::NotFound(filename.to_string()))
        }
        Err(e) => Err(GalleryError::Internal(format!("cannot read {filename}: {e}"))),
    }
}

/// Only bare `.png` names inside the served directory are allowed.
fn validate_filename(filename: &str) -> GalleryResult<()> {
    if !listing::is_png(filename) {
        return Err(GalleryError::BadRequest(
            "Only PNG files are allowed".to_string(),
        ));
    }
    if filename.contains(['/', '\\']) || filename.contains("..") {
        return Err(GalleryError::BadRequest("Invalid filename".to_string()));
    }
    Ok(())
}
