//! Tool surface exposed over MCP.
//!
//! Each call runs the generation pipeline on its own tokio task so a
//! slow ComfyUI job never blocks the protocol loop, and every failure is
//! reported to the caller as text instead of a protocol error.

use comfymcp_core::types::GenerationRequest;
use comfymcp_pipeline::ImageGenerator;
use serde_json::{json, Value};

use crate::protocol::{ToolDefinition, ToolResult};

pub const IMAGE_GENERATE: &str = "image_generate";

/// Prefix of every failed `image_generate` result.
pub const ERROR_PREFIX: &str = "Error generating image: ";

/// The `image_generate` tool.
#[derive(Debug, Clone)]
pub struct ImageGenerateTool {
    generator: ImageGenerator,
}

impl ImageGenerateTool {
    pub fn new(generator: ImageGenerator) -> Self {
        Self { generator }
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: IMAGE_GENERATE,
            description: format!(
                "Generate an image with the '{}' ComfyUI workflow. \
                 Returns a markdown image link to the saved file.",
                self.generator.store().name()
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "prompt": {
                        "type": "string",
                        "description": "Detailed description of the image to generate."
                    },
                    "title": {
                        "type": "string",
                        "description": "Short title; used as alt text and in the filename."
                    },
                    "aspect_ratio": {
                        "type": "string",
                        "description": "One of: square (1:1), widest (16:9), tallest (9:16), \
                                        wide (4:3), tall (3:4). Matching ignores case and surrounding \
                                        whitespace; unknown values fall back to square."
                    }
                },
                "required": ["prompt", "title", "aspect_ratio"]
            }),
        }
    }

    /// Run one generation and render its outcome.
    pub async fn call(&self, arguments: Value) -> ToolResult {
        let request: GenerationRequest = match serde_json::from_value(arguments) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, "Rejected image_generate arguments");
                return ToolResult::error(format!("{ERROR_PREFIX}invalid arguments: {e}"));
            }
        };

        let generator = self.generator.clone();
        let handle = tokio::spawn(async move { generator.generate(request).await });

        match handle.await {
            Ok(Ok(image)) => ToolResult::text(image.reference),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Image generation failed");
                ToolResult::error(format!("{ERROR_PREFIX}{e}"))
            }
            Err(e) => {
                tracing::error!(error = %e, "Image generation task aborted");
                ToolResult::error(format!("{ERROR_PREFIX}generation task failed: {e}"))
            }
        }
    }
}

/// Name-based dispatch over the available tools.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    image_generate: ImageGenerateTool,
}

impl ToolRegistry {
    pub fn new(image_generate: ImageGenerateTool) -> Self {
        Self { image_generate }
    }

    pub fn list(&self) -> Vec<ToolDefinition> {
        vec![self.image_generate.definition()]
    }

    pub async fn call(&self, name: &str, arguments: Value) -> ToolResult {
        match name {
            IMAGE_GENERATE => self.image_generate.call(arguments).await,
            other => {
                tracing::warn!(tool = other, "Call to unknown tool");
                ToolResult::error(format!("Unknown tool: {other}"))
            }
        }
    }
}
