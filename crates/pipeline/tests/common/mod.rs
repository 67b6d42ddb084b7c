use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use comfymcp_comfyui::api::ComfyUIApi;
use comfymcp_comfyui::poller::PollConfig;
use comfymcp_core::workflow::{BindingConfig, WorkflowStore};
use comfymcp_pipeline::{GeneratorSettings, ImageGenerator};
use serde_json::{json, Value};

pub const WORKFLOW: &str = "flux-krea";
pub const BASE_URL: &str = "http://127.0.0.1:8081/view";

/// Text-to-image graph with one size node, two seed nodes and a
/// positive/negative prompt pair where only the positive one is bound.
pub fn graph() -> Value {
    json!({
        "3": { "class_type": "KSampler", "inputs": { "seed": 0, "steps": 20 } },
        "5": { "class_type": "EmptyLatentImage", "inputs": { "width": 512, "height": 512, "batch_size": 1 } },
        "6": { "class_type": "CLIPTextEncode", "inputs": { "text": "" } },
        "7": { "class_type": "CLIPTextEncode", "inputs": { "text": "blurry" } },
        "9": { "class_type": "SaveImage", "inputs": { "filename_prefix": "ComfyUI" } },
        "25": { "class_type": "RandomNoise", "inputs": { "noise_seed": 0 } }
    })
}

pub fn store() -> Arc<WorkflowStore> {
    let config: BindingConfig = serde_json::from_value(json!({
        "image_size_nodes": ["5"],
        "seed_nodes": ["3", "25"],
        "prompt_nodes": ["6"],
        "save_image_node": "9"
    }))
    .expect("valid binding config");
    Arc::new(WorkflowStore::from_parts(WORKFLOW, graph(), config).expect("valid test workflow"))
}

pub fn fast_poll() -> PollConfig {
    PollConfig {
        interval: Duration::from_millis(10),
        timeout: Duration::from_secs(5),
    }
}

pub fn generator(engine_url: &str, output_dir: &Path, poll: PollConfig) -> ImageGenerator {
    ImageGenerator::new(
        store(),
        ComfyUIApi::new(engine_url),
        GeneratorSettings {
            output_dir: output_dir.to_path_buf(),
            base_url: BASE_URL.to_string(),
            poll,
        },
    )
}
