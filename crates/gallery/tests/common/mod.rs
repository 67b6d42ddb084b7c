use std::path::Path;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use comfymcp_gallery::listing::THUMBNAIL_DIR;
use comfymcp_gallery::routes::GalleryState;
use http_body_util::BodyExt;
use tower::ServiceExt;

/// Full gallery app over `output_dir`, with the thumbnail dir in place
/// as `serve` would create it.
pub fn build_test_app(output_dir: &Path) -> Router {
    std::fs::create_dir_all(output_dir.join(THUMBNAIL_DIR)).unwrap();
    comfymcp_gallery::app(GalleryState::new(output_dir))
}

/// Write a `width` x `height` PNG named `name` into `dir`.
pub fn write_png(dir: &Path, name: &str, width: u32, height: u32) {
    image::RgbImage::from_pixel(width, height, image::Rgb([200, 80, 40]))
        .save_with_format(dir.join(name), image::ImageFormat::Png)
        .unwrap();
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
