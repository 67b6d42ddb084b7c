//! Per-call parameter injection.
//!
//! Turns the shared [`WorkflowTemplate`](crate::workflow::WorkflowTemplate)
//! into a [`JobInstance`]: a private copy of the graph with the request's
//! size, fresh seeds and prompt written into the role nodes.

use serde_json::{Map, Value};

use crate::aspect::{self, ImageSize};
use crate::error::ConfigError;
use crate::types::GenerationRequest;
use crate::workflow::{WorkflowStore, INPUTS_KEY};

/// Seeds are drawn from `0..SEED_MODULUS`.
pub const SEED_MODULUS: u128 = 10_000_000_000;

const WIDTH_KEY: &str = "width";
const HEIGHT_KEY: &str = "height";
const SEED_KEY: &str = "seed";
const NOISE_SEED_KEY: &str = "noise_seed";
const TEXT_KEY: &str = "text";

/// A fully parameterized graph, ready for a single submission.
///
/// Owned by the call that created it; never shared.
#[derive(Debug, Clone)]
pub struct JobInstance {
    /// Correlation id sent alongside the submission.
    pub client_id: String,
    /// The parameterized ComfyUI graph.
    pub graph: Value,
    /// The size written into the size nodes.
    pub size: ImageSize,
    /// Every seed written, in write order.
    pub seeds: Vec<u64>,
}

/// Draw a fresh seed from a random UUID, reduced into the engine's range.
pub fn random_seed() -> u64 {
    (uuid::Uuid::new_v4().as_u128() % SEED_MODULUS) as u64
}

/// Build a [`JobInstance`] for `request` from the store's template.
///
/// The template itself is never touched; all writes go to a deep copy.
pub fn inject(
    request: &GenerationRequest,
    store: &WorkflowStore,
) -> Result<JobInstance, ConfigError> {
    let config = store.config();
    let size = aspect::resolve_size(&request.aspect_ratio, config)?;
    let mut graph = store.template().instantiate();
    let mut seeds = Vec::new();

    for id in &config.image_size_nodes {
        let inputs = inputs_mut(&mut graph, id, "image_size_nodes")?;
        if inputs.contains_key(WIDTH_KEY) {
            inputs.insert(WIDTH_KEY.into(), size.width.into());
        }
        if inputs.contains_key(HEIGHT_KEY) {
            inputs.insert(HEIGHT_KEY.into(), size.height.into());
        }
    }

    for id in &config.seed_nodes {
        let inputs = inputs_mut(&mut graph, id, "seed_nodes")?;
        for key in [SEED_KEY, NOISE_SEED_KEY] {
            if inputs.contains_key(key) {
                let seed = random_seed();
                inputs.insert(key.into(), seed.into());
                seeds.push(seed);
            }
        }
    }

    for id in &config.prompt_nodes {
        let inputs = inputs_mut(&mut graph, id, "prompt_nodes")?;
        inputs.insert(TEXT_KEY.into(), Value::String(request.prompt.clone()));
    }

    let client_id = uuid::Uuid::new_v4().to_string();

    tracing::debug!(
        client_id = %client_id,
        width = size.width,
        height = size.height,
        seeds = ?seeds,
        "Workflow parameters injected",
    );

    Ok(JobInstance {
        client_id,
        graph,
        size,
        seeds,
    })
}

fn inputs_mut<'a>(
    graph: &'a mut Value,
    node_id: &str,
    role: &'static str,
) -> Result<&'a mut Map<String, Value>, ConfigError> {
    graph
        .get_mut(node_id)
        .ok_or_else(|| ConfigError::UnknownNode {
            role,
            node_id: node_id.to_string(),
        })?
        .get_mut(INPUTS_KEY)
        .and_then(Value::as_object_mut)
        .ok_or_else(|| ConfigError::NodeWithoutInputs {
            role,
            node_id: node_id.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::workflow::tests::{sample_graph, sample_store};

    fn request(aspect_ratio: &str) -> GenerationRequest {
        GenerationRequest::new("a red fox", "Red Fox", aspect_ratio)
    }

    // -- random_seed --

    #[test]
    fn seeds_stay_in_range() {
        for _ in 0..1000 {
            assert!((random_seed() as u128) < SEED_MODULUS);
        }
    }

    #[test]
    fn seeds_vary() {
        let seeds: HashSet<u64> = (0..100).map(|_| random_seed()).collect();
        assert!(seeds.len() > 90);
    }

    // -- size nodes --

    #[test]
    fn size_nodes_receive_resolved_dimensions() {
        let store = sample_store();
        let job = inject(&request("tall"), &store).unwrap();

        assert_eq!(job.size, ImageSize::new(864, 1152));
        assert_eq!(job.graph["5"]["inputs"]["width"], 864);
        assert_eq!(job.graph["5"]["inputs"]["height"], 1152);
    }

    #[test]
    fn size_node_with_only_width_gets_only_width() {
        let store = sample_store();
        let job = inject(&request("widest"), &store).unwrap();

        let inputs = job.graph["27"]["inputs"].as_object().unwrap();
        assert_eq!(inputs["width"], 1280);
        assert!(!inputs.contains_key("height"));
        assert_eq!(inputs["max_shift"], 1.15);
    }

    #[test]
    fn unknown_alias_uses_square_size() {
        let store = sample_store();
        let job = inject(&request("cinemascope"), &store).unwrap();
        assert_eq!(job.graph["5"]["inputs"]["width"], 1024);
        assert_eq!(job.graph["5"]["inputs"]["height"], 1024);
    }

    #[test]
    fn nodes_outside_roles_are_untouched() {
        let store = sample_store();
        let job = inject(&request("wide"), &store).unwrap();
        let original = sample_graph();

        assert_eq!(job.graph["4"], original["4"]);
        assert_eq!(job.graph["9"], original["9"]);
        assert_eq!(job.graph["3"]["inputs"]["steps"], 20);
        assert_eq!(job.graph["3"]["class_type"], "KSampler");
    }

    // -- seed nodes --

    #[test]
    fn seed_and_noise_seed_fields_are_rewritten() {
        let store = sample_store();
        let job = inject(&request("square"), &store).unwrap();

        assert_eq!(job.seeds.len(), 2);
        assert_eq!(job.graph["3"]["inputs"]["seed"], job.seeds[0]);
        assert_eq!(job.graph["13"]["inputs"]["noise_seed"], job.seeds[1]);
        assert!(job.graph["3"]["inputs"].get("noise_seed").is_none());
    }

    #[test]
    fn seed_nodes_draw_independent_values() {
        let store = sample_store();
        // Two draws from a 10^10 space colliding would be a broken RNG.
        let job = inject(&request("square"), &store).unwrap();
        assert_ne!(job.seeds[0], job.seeds[1]);
    }

    // -- prompt nodes --

    #[test]
    fn prompt_written_verbatim() {
        let store = sample_store();
        let prompt = "  a \"quoted\" prompt\nwith newline ";
        let req = GenerationRequest::new(prompt, "t", "square");
        let job = inject(&req, &store).unwrap();
        assert_eq!(job.graph["6"]["inputs"]["text"], prompt);
        assert_eq!(job.graph["6"]["inputs"]["clip"], json!(["4", 1]));
    }

    // -- isolation --

    #[test]
    fn template_is_never_mutated() {
        let store = sample_store();
        let before = store.template().clone();
        inject(&request("widest"), &store).unwrap();
        assert_eq!(store.template(), &before);
    }

    #[test]
    fn each_job_gets_a_fresh_client_id() {
        let store = sample_store();
        let a = inject(&request("square"), &store).unwrap();
        let b = inject(&request("square"), &store).unwrap();
        assert_ne!(a.client_id, b.client_id);
        assert!(uuid::Uuid::parse_str(&a.client_id).is_ok());
    }

    #[test]
    fn concurrent_injections_do_not_share_state() {
        let store = Arc::new(sample_store());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let aspect = if i % 2 == 0 { "widest" } else { "tallest" };
                    let req = GenerationRequest::new(format!("prompt {i}"), "t", aspect);
                    (i, inject(&req, &store).unwrap())
                })
            })
            .collect();

        let mut seen_seeds = HashSet::new();
        for handle in handles {
            let (i, job) = handle.join().unwrap();
            assert_eq!(job.graph["6"]["inputs"]["text"], format!("prompt {i}"));
            let expected_width = if i % 2 == 0 { 1280 } else { 720 };
            assert_eq!(job.graph["5"]["inputs"]["width"], expected_width);
            for seed in job.seeds {
                assert!(seen_seeds.insert(seed), "seed shared across jobs");
            }
        }
        assert_eq!(store.template().inputs("6").unwrap()["text"], "placeholder");
    }
}
