//! Typed view of the ComfyUI `/history/{prompt_id}` payload.
//!
//! Only the fields the pipeline relies on are modelled: the
//! `is_processing` flag, the per-node `outputs` map with image
//! descriptors, and the optional execution `status` block.

use std::collections::HashMap;

use serde::Deserialize;

/// `GET /history/{id}` response: prompt id -> entry. Empty until the
/// engine has indexed the prompt.
pub type History = HashMap<String, HistoryEntry>;

/// Engine status string for a failed execution.
const STATUS_ERROR: &str = "error";

/// Message type ComfyUI records when a node raises.
const MSG_EXECUTION_ERROR: &str = "execution_error";

/// One prompt's record in the history.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub is_processing: bool,
    /// Node id -> what that node produced.
    #[serde(default)]
    pub outputs: HashMap<String, NodeOutput>,
    #[serde(default)]
    pub status: Option<ExecutionStatus>,
}

/// Artifacts produced by one output node.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeOutput {
    #[serde(default)]
    pub images: Vec<ImageRef>,
}

/// Address of one artifact, as understood by `GET /view`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImageRef {
    pub filename: String,
    #[serde(default)]
    pub subfolder: String,
    /// Storage class: `output`, `temp` or `input`.
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
}

fn default_kind() -> String {
    "output".to_string()
}

/// Execution summary attached by the engine once a prompt finishes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecutionStatus {
    #[serde(default)]
    pub status_str: Option<String>,
    #[serde(default)]
    pub completed: bool,
    /// `[type, payload]` pairs in emission order.
    #[serde(default)]
    pub messages: Vec<(String, serde_json::Value)>,
}

impl HistoryEntry {
    /// Images produced by `node_id`; empty when the node produced none.
    pub fn images_for(&self, node_id: &str) -> &[ImageRef] {
        self.outputs
            .get(node_id)
            .map(|out| out.images.as_slice())
            .unwrap_or_default()
    }

    /// Node ids that produced at least one image.
    pub fn image_nodes(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .outputs
            .iter()
            .filter(|(_, out)| !out.images.is_empty())
            .map(|(id, _)| id.as_str())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// True when the engine recorded the execution as failed.
    pub fn is_failed(&self) -> bool {
        self.status
            .as_ref()
            .and_then(|s| s.status_str.as_deref())
            .is_some_and(|s| s == STATUS_ERROR)
    }

    /// The engine's description of a failed execution, if recorded.
    pub fn error_message(&self) -> Option<String> {
        let status = self.status.as_ref()?;
        status
            .messages
            .iter()
            .find(|(kind, _)| kind == MSG_EXECUTION_ERROR)
            .map(|(_, payload)| {
                let message = payload
                    .get("exception_message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("unknown error")
                    .trim();
                match payload.get("node_id").and_then(|n| n.as_str()) {
                    Some(node) => format!("node {node}: {message}"),
                    None => message.to_string(),
                }
            })
    }
}

/// Lifecycle of a submitted job as observed through the history API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Accepted by `/prompt`, not yet polled.
    Submitted,
    /// The history does not list the prompt yet.
    Unknown,
    /// Listed and still executing.
    Processing,
    /// Listed and finished.
    Complete,
}

impl JobStatus {
    /// Classify the entry (or its absence) for one prompt.
    pub fn from_entry(entry: Option<&HistoryEntry>) -> Self {
        match entry {
            None => JobStatus::Unknown,
            Some(e) if e.is_processing => JobStatus::Processing,
            Some(_) => JobStatus::Complete,
        }
    }

    /// Classify a whole history payload for `prompt_id`.
    pub fn of(history: &History, prompt_id: &str) -> Self {
        Self::from_entry(history.get(prompt_id))
    }

    pub fn is_terminal(self) -> bool {
        self == JobStatus::Complete
    }

    /// Whether moving from `self` to `next` is a legal transition.
    ///
    /// Staying in the same non-submitted state is legal (repeated
    /// polls); nothing leaves `Complete`.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Submitted, Unknown | Processing | Complete)
                | (Unknown, Unknown | Processing | Complete)
                | (Processing, Processing | Complete)
        )
    }
}
