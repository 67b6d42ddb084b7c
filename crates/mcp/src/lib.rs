//! MCP stdio front end for ComfyUI image generation.
//!
//! Exposes a single `image_generate` tool over newline-delimited
//! JSON-RPC 2.0 on stdin/stdout.

pub mod config;
pub mod protocol;
pub mod server;
pub mod tools;

use std::sync::Arc;

use comfymcp_comfyui::api::ComfyUIApi;
use comfymcp_core::error::ConfigError;
use comfymcp_core::workflow::WorkflowStore;
use comfymcp_pipeline::ImageGenerator;

use config::McpConfig;
use server::McpServer;
use tools::{ImageGenerateTool, ToolRegistry};

/// Load the configured workflow and wire up a ready-to-serve server.
pub fn build_server(config: &McpConfig) -> Result<McpServer, ConfigError> {
    let store = WorkflowStore::load(&config.working_dir, &config.workflow_name)?;

    let api = ComfyUIApi::from_host_port(&config.comfyui_host, config.comfyui_port);
    tracing::info!(api_url = %api.api_url(), "Using ComfyUI instance");
    let generator = ImageGenerator::new(Arc::new(store), api, config.generator_settings());

    Ok(McpServer::new(ToolRegistry::new(ImageGenerateTool::new(
        generator,
    ))))
}
