//! Artifact retrieval from a finished prompt.

use comfymcp_comfyui::api::ComfyUIApi;
use comfymcp_comfyui::history::HistoryEntry;

use crate::error::GenerationError;

/// Download the first image produced by `save_node`.
///
/// Images from other output nodes are ignored; if the save node has
/// none, the call fails with [`GenerationError::NoOutput`].
pub async fn fetch_output_image(
    api: &ComfyUIApi,
    entry: &HistoryEntry,
    save_node: &str,
) -> Result<Vec<u8>, GenerationError> {
    if entry.is_failed() {
        let message = entry
            .error_message()
            .unwrap_or_else(|| "execution reported an error".to_string());
        return Err(GenerationError::Execution(message));
    }

    let images = entry.images_for(save_node);
    let Some(first) = images.first() else {
        tracing::warn!(
            save_node,
            nodes_with_images = ?entry.image_nodes(),
            "Save node produced no images",
        );
        return Err(GenerationError::NoOutput {
            node_id: save_node.to_string(),
        });
    };

    if images.len() > 1 {
        tracing::debug!(save_node, count = images.len(), "Using first of several images");
    }

    let bytes = api
        .view_image(first)
        .await
        .map_err(GenerationError::Engine)?;

    tracing::debug!(
        filename = %first.filename,
        subfolder = %first.subfolder,
        bytes = bytes.len(),
        "Fetched output image",
    );

    Ok(bytes)
}
