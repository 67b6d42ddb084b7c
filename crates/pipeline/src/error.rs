use std::time::Duration;

use comfymcp_comfyui::api::ComfyUIApiError;
use comfymcp_comfyui::poller::PollError;
use comfymcp_core::error::ConfigError;

/// Why a single generation call failed.
///
/// None of these are fatal to the process; the tool adapter turns each
/// into a text result.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The workflow could not be parameterized.
    #[error("Invalid workflow configuration: {0}")]
    Config(#[from] ConfigError),

    /// ComfyUI was unreachable or rejected the job. Not retried.
    #[error("Failed to submit workflow: {0}")]
    Submission(#[source] ComfyUIApiError),

    /// A history or artifact request failed after submission.
    #[error("ComfyUI request failed: {0}")]
    Engine(#[source] ComfyUIApiError),

    /// ComfyUI ran the job and reported an execution error.
    #[error("ComfyUI failed to execute the workflow: {0}")]
    Execution(String),

    /// The job did not finish within the polling bound.
    #[error("Timed out after {}s waiting for ComfyUI to finish", .0.as_secs())]
    Timeout(Duration),

    /// The job finished but the save node produced no image.
    #[error("No image produced (save node '{node_id}' has no images)")]
    NoOutput { node_id: String },

    /// The image could not be decoded or written to disk.
    #[error("Failed to save image: {0}")]
    Persistence(String),
}

impl From<PollError> for GenerationError {
    fn from(err: PollError) -> Self {
        match err {
            PollError::Api(e) => GenerationError::Engine(e),
            PollError::Timeout { timeout, .. } => GenerationError::Timeout(timeout),
        }
    }
}
