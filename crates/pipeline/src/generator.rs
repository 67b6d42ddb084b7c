//! End-to-end generation: template -> ComfyUI -> file on disk.

use std::path::PathBuf;
use std::sync::Arc;

use comfymcp_comfyui::api::ComfyUIApi;
use comfymcp_comfyui::poller::{self, PollConfig};
use comfymcp_core::injector;
use comfymcp_core::types::GenerationRequest;
use comfymcp_core::workflow::WorkflowStore;

use crate::error::GenerationError;
use crate::persist::{ArtifactStore, GeneratedImage, SaveRequest};
use crate::retrieve;

/// Everything the generator needs besides the template and the client.
#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    pub output_dir: PathBuf,
    /// URL prefix under which `output_dir` is served.
    pub base_url: String,
    pub poll: PollConfig,
}

/// Runs the full pipeline for one request at a time.
///
/// Cheap to clone: the template is shared behind an `Arc` and the HTTP
/// client pools connections internally.
#[derive(Debug, Clone)]
pub struct ImageGenerator {
    store: Arc<WorkflowStore>,
    api: ComfyUIApi,
    artifacts: ArtifactStore,
    poll: PollConfig,
}

impl ImageGenerator {
    pub fn new(store: Arc<WorkflowStore>, api: ComfyUIApi, settings: GeneratorSettings) -> Self {
        Self {
            store,
            api,
            artifacts: ArtifactStore::new(settings.output_dir, settings.base_url),
            poll: settings.poll,
        }
    }

    pub fn store(&self) -> &WorkflowStore {
        &self.store
    }

    /// Generate one image and persist it.
    ///
    /// Submits exactly once; a rejected submission is not retried.
    pub async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GeneratedImage, GenerationError> {
        let job = injector::inject(&request, &self.store)?;
        let client_id = job.client_id.clone();

        tracing::info!(
            client_id = %client_id,
            workflow = %self.store.name(),
            title = %request.title,
            aspect_ratio = %request.aspect_ratio,
            width = job.size.width,
            height = job.size.height,
            "Submitting workflow to ComfyUI",
        );

        let submitted = self
            .api
            .submit_workflow(&job.graph, &client_id)
            .await
            .map_err(GenerationError::Submission)?;

        if submitted
            .node_errors
            .as_object()
            .is_some_and(|errors| !errors.is_empty())
        {
            tracing::warn!(
                client_id = %client_id,
                prompt_id = %submitted.prompt_id,
                node_errors = %submitted.node_errors,
                "ComfyUI accepted the prompt with node errors",
            );
        }

        tracing::info!(
            client_id = %client_id,
            prompt_id = %submitted.prompt_id,
            queue_position = submitted.number,
            "Workflow queued",
        );

        let entry = poller::wait_for_completion(&self.api, &submitted.prompt_id, &self.poll).await?;

        let save_node = &self.store.config().save_image_node;
        let bytes = retrieve::fetch_output_image(&self.api, &entry, save_node).await?;

        let artifacts = self.artifacts.clone();
        let workflow = self.store.name().to_string();
        let image = tokio::task::spawn_blocking(move || {
            artifacts.save(
                &bytes,
                SaveRequest {
                    title: &request.title,
                    prompt: &request.prompt,
                    workflow: &workflow,
                    client_id: &client_id,
                },
            )
        })
        .await
        .map_err(|e| GenerationError::Persistence(format!("save task failed: {e}")))??;

        tracing::info!(
            prompt_id = %submitted.prompt_id,
            filename = %image.filename,
            "Image generated",
        );

        Ok(image)
    }
}
