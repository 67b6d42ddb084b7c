//! HTTP gallery over the generated-image directory.
//!
//! Serves the PNGs written by the MCP server (`/view/{filename}`), their
//! thumbnails (`/thumb/{filename}`) and a paginated JSON listing (`/`).

pub mod config;
pub mod error;
pub mod listing;
pub mod routes;

use std::future::Future;

use anyhow::Context;
use axum::http::HeaderName;
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use config::GalleryConfig;
use routes::GalleryState;

/// The full application: routes plus the middleware stack.
pub fn app(state: GalleryState) -> Router {
    let request_id_header = HeaderName::from_static("x-request-id");

    routes::router()
        .layer(CatchPanicLayer::new())
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .with_state(state)
}

/// Prepare the directories, bind and serve until `shutdown` resolves.
pub async fn serve<F>(config: GalleryConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let thumbnails = config.output_dir.join(listing::THUMBNAIL_DIR);
    std::fs::create_dir_all(&thumbnails)
        .with_context(|| format!("creating {}", thumbnails.display()))?;

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    tracing::info!(
        %addr,
        output_dir = %config.output_dir.display(),
        "Starting gallery server",
    );

    axum::serve(listener, app(GalleryState::new(config.output_dir)))
        .with_graceful_shutdown(shutdown)
        .await
        .context("gallery server error")?;

    tracing::info!("Gallery server stopped");
    Ok(())
}
