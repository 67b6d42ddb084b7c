//! `comfymcp-mcp` -- MCP stdio server for ComfyUI image generation.
//!
//! Speaks JSON-RPC on stdin/stdout; logs go to stderr. See
//! [`McpConfig::from_env`] for the environment it reads.

use comfymcp_mcp::config::McpConfig;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // stdout carries protocol frames, so logs must go to stderr.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "comfymcp_mcp=info,comfymcp_pipeline=info,comfymcp_comfyui=info,comfymcp_core=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = McpConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    });

    tracing::info!(
        comfyui_host = %config.comfyui_host,
        comfyui_port = config.comfyui_port,
        workflow = %config.workflow_name,
        output_dir = %config.output_dir.display(),
        timeout_secs = config.poll.timeout.as_secs(),
        "Loaded MCP server configuration",
    );

    let server = comfymcp_mcp::build_server(&config).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to load workflow");
        std::process::exit(1);
    });

    tracing::info!("Serving MCP on stdio");

    if let Err(e) = server.serve(tokio::io::stdin(), tokio::io::stdout()).await {
        tracing::error!(error = %e, "MCP server stopped with an I/O error");
        std::process::exit(1);
    }

    tracing::info!("Shutdown complete");
}
