use std::path::Path;

use comfymcp_mcp::config::McpConfig;
use comfymcp_mcp::server::McpServer;
use serde_json::Value;
use tokio::io::AsyncReadExt;

pub const WORKFLOW: &str = "sdxl-basic";
pub const BASE_URL: &str = "http://localhost:8081/view";

const GRAPH: &str = r#"{
  "3": { "class_type": "KSampler", "inputs": { "seed": 1, "steps": 20, "cfg": 7.0 } },
  "5": { "class_type": "EmptyLatentImage", "inputs": { "width": 512, "height": 512, "batch_size": 1 } },
  "6": { "class_type": "CLIPTextEncode", "inputs": { "text": "placeholder" } },
  "9": { "class_type": "SaveImage", "inputs": { "filename_prefix": "ComfyUI" } }
}"#;

const BINDINGS: &str = r#"
image_size_nodes: [5]
seed_nodes: [3]
prompt_nodes: [6]
save_image_node: 9
"#;

/// Lay out `<root>/workflows/<WORKFLOW>.{json,yaml}`.
pub fn write_workflow(root: &Path) {
    let dir = root.join("workflows");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(format!("{WORKFLOW}.json")), GRAPH).unwrap();
    std::fs::write(dir.join(format!("{WORKFLOW}.yaml")), BINDINGS).unwrap();
}

/// Config pointing at a mock engine, loaded the same way the binary does.
pub fn config(root: &Path, host: &str, port: u16, output_dir: &Path) -> McpConfig {
    let port = port.to_string();
    let root = root.display().to_string();
    let output_dir = output_dir.display().to_string();
    McpConfig::from_lookup(|key| {
        let value = match key {
            "COMFYUI_HOST" => host,
            "COMFYUI_PORT" => port.as_str(),
            "OUTPUT_DIR" => output_dir.as_str(),
            "IMAGE_APP_BASE_URL" => BASE_URL,
            "COMFYUI_WORKFLOW_NAME" => WORKFLOW,
            "WORKING_DIR" => root.as_str(),
            "POLL_INTERVAL_MS" => "10",
            "GENERATION_TIMEOUT_SECS" => "5",
            _ => return None,
        };
        Some(value.to_string())
    })
    .expect("valid test config")
}

/// Feed `lines` to the server and collect every response frame.
pub async fn run(server: &McpServer, lines: &[Value]) -> Vec<Value> {
    let input: String = lines.iter().map(|l| format!("{l}\n")).collect();
    let (writer, mut reader) = tokio::io::duplex(64 * 1024);

    let (served, output) = tokio::join!(server.serve(input.as_bytes(), writer), async {
        let mut out = String::new();
        reader.read_to_string(&mut out).await.unwrap();
        out
    });
    served.expect("server I/O");

    output
        .lines()
        .map(|l| serde_json::from_str(l).expect("response frame is JSON"))
        .collect()
}

pub fn call(id: u64, arguments: Value) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": { "name": "image_generate", "arguments": arguments }
    })
}

pub fn response_for(responses: &[Value], id: u64) -> &Value {
    responses
        .iter()
        .find(|r| r["id"] == id)
        .unwrap_or_else(|| panic!("no response for id {id}"))
}

pub fn text_of(response: &Value) -> &str {
    response["result"]["content"][0]["text"]
        .as_str()
        .expect("text content")
}
