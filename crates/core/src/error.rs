use std::path::PathBuf;

/// Startup configuration failures.
///
/// Any of these means the process cannot serve requests; they are
/// raised while loading settings and the workflow template, never
/// during a generation call.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variables: {}", .0.join(", "))]
    MissingEnv(Vec<String>),

    #[error("Invalid value for {var} ({value:?}): {reason}")]
    InvalidEnv {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed workflow graph {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Malformed workflow config {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid workflow template: {0}")]
    InvalidTemplate(String),

    #[error("Config lists node '{node_id}' in {role}, but the workflow has no such node")]
    UnknownNode { role: &'static str, node_id: String },

    #[error("Node '{node_id}' in {role} has no inputs object")]
    NodeWithoutInputs { role: &'static str, node_id: String },

    #[error("Aspect ratio '{0}' is not defined in the workflow config")]
    MissingAspectRatio(String),

    #[error("Aspect ratio '{ratio}' has invalid dimensions {width}x{height}")]
    InvalidAspectRatio {
        ratio: String,
        width: u32,
        height: u32,
    },
}
