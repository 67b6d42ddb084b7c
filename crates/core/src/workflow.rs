//! Workflow template store.
//!
//! A workflow is a ComfyUI API-format graph (`<name>.json`) paired with a
//! binding config (`<name>.yaml`) naming the nodes that receive the
//! image size, the random seeds, and the prompt text, plus the node
//! whose images are the result.
//!
//! The store is loaded once at startup and is read-only afterwards.
//! Every generation call derives its own graph from it (see
//! [`crate::injector`]).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::aspect::{self, AspectRatioTable};
use crate::error::ConfigError;

/// Directory under the working directory that holds workflow files.
pub const WORKFLOWS_DIR: &str = "workflows";

/// Key of the per-node input map in the ComfyUI API format.
pub const INPUTS_KEY: &str = "inputs";

// Role names, used in error messages.
const ROLE_IMAGE_SIZE: &str = "image_size_nodes";
const ROLE_SEED: &str = "seed_nodes";
const ROLE_PROMPT: &str = "prompt_nodes";
const ROLE_SAVE_IMAGE: &str = "save_image_node";

// ---------------------------------------------------------------------------
// Template
// ---------------------------------------------------------------------------

/// An immutable ComfyUI graph: node id -> node definition.
///
/// Node definitions are kept as raw JSON so that keys this crate does
/// not interpret (`class_type`, `_meta`, links) pass through untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowTemplate {
    nodes: Map<String, Value>,
}

impl WorkflowTemplate {
    /// Build a template from a parsed graph. The graph must be a JSON
    /// object whose values are node objects.
    pub fn from_json(graph: Value) -> Result<Self, ConfigError> {
        let Value::Object(nodes) = graph else {
            return Err(ConfigError::InvalidTemplate(
                "graph must be a JSON object keyed by node id".into(),
            ));
        };
        if nodes.is_empty() {
            return Err(ConfigError::InvalidTemplate("graph has no nodes".into()));
        }
        if let Some((id, _)) = nodes.iter().find(|(_, node)| !node.is_object()) {
            return Err(ConfigError::InvalidTemplate(format!(
                "node '{id}' is not a JSON object"
            )));
        }
        Ok(Self { nodes })
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.nodes.contains_key(node_id)
    }

    /// The `inputs` object of a node, if the node exists and has one.
    pub fn inputs(&self, node_id: &str) -> Option<&Map<String, Value>> {
        self.nodes.get(node_id)?.get(INPUTS_KEY)?.as_object()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// A private deep copy of the graph, ready to be parameterized.
    pub fn instantiate(&self) -> Value {
        Value::Object(self.nodes.clone())
    }
}

// ---------------------------------------------------------------------------
// Binding config
// ---------------------------------------------------------------------------

/// Which template nodes receive which per-call values.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BindingConfig {
    #[serde(default, deserialize_with = "node_id_list")]
    pub image_size_nodes: Vec<String>,
    #[serde(default, deserialize_with = "node_id_list")]
    pub seed_nodes: Vec<String>,
    #[serde(default, deserialize_with = "node_id_list")]
    pub prompt_nodes: Vec<String>,
    #[serde(deserialize_with = "node_id")]
    pub save_image_node: String,
    /// Ratio key -> size. Replaced by the defaults when absent or empty.
    #[serde(default, deserialize_with = "nullable_table")]
    pub aspect_ratios: AspectRatioTable,
}

/// Node ids are strings in the graph, but YAML configs often write them
/// as bare integers.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawNodeId {
    Text(String),
    Number(u64),
}

impl From<RawNodeId> for String {
    fn from(raw: RawNodeId) -> Self {
        match raw {
            RawNodeId::Text(s) => s,
            RawNodeId::Number(n) => n.to_string(),
        }
    }
}

fn node_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    RawNodeId::deserialize(deserializer).map(String::from)
}

fn node_id_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let raw: Option<Vec<RawNodeId>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(String::from)
        .collect())
}

fn nullable_table<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<AspectRatioTable, D::Error> {
    Ok(Option::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// A named, validated template plus its binding config.
#[derive(Debug, Clone)]
pub struct WorkflowStore {
    name: String,
    template: WorkflowTemplate,
    config: BindingConfig,
}

impl WorkflowStore {
    /// Load `<working_dir>/workflows/<name>.json` and `<name>.yaml`.
    pub fn load(working_dir: &Path, name: &str) -> Result<Self, ConfigError> {
        let (graph_path, config_path) = workflow_paths(working_dir, name);

        let graph_raw = read_file(&graph_path)?;
        let graph: Value = serde_json::from_str(&graph_raw).map_err(|source| ConfigError::Json {
            path: graph_path.clone(),
            source,
        })?;

        let config_raw = read_file(&config_path)?;
        let config: BindingConfig =
            serde_yaml::from_str(&config_raw).map_err(|source| ConfigError::Yaml {
                path: config_path.clone(),
                source,
            })?;

        let store = Self::from_parts(name, graph, config)?;

        tracing::info!(
            workflow = %name,
            nodes = store.template.len(),
            size_nodes = store.config.image_size_nodes.len(),
            seed_nodes = store.config.seed_nodes.len(),
            prompt_nodes = store.config.prompt_nodes.len(),
            save_image_node = %store.config.save_image_node,
            "Loaded workflow template",
        );

        Ok(store)
    }

    /// Build and validate a store from already-parsed parts.
    pub fn from_parts(
        name: impl Into<String>,
        graph: Value,
        mut config: BindingConfig,
    ) -> Result<Self, ConfigError> {
        let template = WorkflowTemplate::from_json(graph)?;

        if config.aspect_ratios.is_empty() {
            config.aspect_ratios = aspect::default_aspect_ratios();
        }
        aspect::validate_table(&config.aspect_ratios)?;

        validate_bindings(&template, &config)?;

        Ok(Self {
            name: name.into(),
            template,
            config,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn template(&self) -> &WorkflowTemplate {
        &self.template
    }

    pub fn config(&self) -> &BindingConfig {
        &self.config
    }
}

/// Paths of the graph and config files for a workflow name.
pub fn workflow_paths(working_dir: &Path, name: &str) -> (PathBuf, PathBuf) {
    let dir = working_dir.join(WORKFLOWS_DIR);
    (
        dir.join(format!("{name}.json")),
        dir.join(format!("{name}.yaml")),
    )
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Every node named by a role must exist. Nodes that get inputs written
/// must also carry an `inputs` object.
fn validate_bindings(
    template: &WorkflowTemplate,
    config: &BindingConfig,
) -> Result<(), ConfigError> {
    let writable_roles = [
        (ROLE_IMAGE_SIZE, &config.image_size_nodes),
        (ROLE_SEED, &config.seed_nodes),
        (ROLE_PROMPT, &config.prompt_nodes),
    ];

    for (role, ids) in writable_roles {
        for id in ids {
            if !template.contains(id) {
                return Err(ConfigError::UnknownNode {
                    role,
                    node_id: id.clone(),
                });
            }
            if template.inputs(id).is_none() {
                return Err(ConfigError::NodeWithoutInputs {
                    role,
                    node_id: id.clone(),
                });
            }
        }
    }

    if !template.contains(&config.save_image_node) {
        return Err(ConfigError::UnknownNode {
            role: ROLE_SAVE_IMAGE,
            node_id: config.save_image_node.clone(),
        });
    }

    Ok(())
}
