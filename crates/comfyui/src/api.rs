//! REST API client for the ComfyUI HTTP endpoints.
//!
//! Wraps the three endpoints the generation pipeline depends on
//! (workflow submission, history retrieval, artifact download) using
//! [`reqwest`].

use serde::Deserialize;

use crate::history::{History, ImageRef};

/// HTTP client for a single ComfyUI instance.
#[derive(Debug, Clone)]
pub struct ComfyUIApi {
    client: reqwest::Client,
    api_url: String,
}

/// Response returned by the ComfyUI `/prompt` endpoint after
/// successfully queuing a workflow.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    /// Server-assigned identifier for the queued prompt.
    pub prompt_id: String,
    /// Position in the execution queue.
    #[serde(default)]
    pub number: i64,
    /// Per-node validation problems reported alongside an accepted prompt.
    #[serde(default)]
    pub node_errors: serde_json::Value,
}

/// Errors from the ComfyUI REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ComfyUIApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// ComfyUI returned a non-2xx status code.
    #[error("ComfyUI API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A 2xx response whose body did not have the expected shape.
    #[error("Unexpected ComfyUI response from {endpoint}: {reason}")]
    InvalidResponse {
        endpoint: &'static str,
        reason: String,
    },
}

impl ComfyUIApi {
    /// Create a new API client for a ComfyUI instance.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://host:8188`.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self { client, api_url }
    }

    /// Client for `http://{host}:{port}`.
    pub fn from_host_port(host: &str, port: u16) -> Self {
        Self::new(format!("http://{host}:{port}"))
    }

    /// Base HTTP URL of the instance.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Submit a workflow for execution.
    ///
    /// Sends a `POST /prompt` request with the given workflow JSON and
    /// client ID.  Returns the server-assigned `prompt_id` and queue
    /// position.
    pub async fn submit_workflow(
        &self,
        workflow: &serde_json::Value,
        client_id: &str,
    ) -> Result<SubmitResponse, ComfyUIApiError> {
        let body = serde_json::json!({
            "prompt": workflow,
            "client_id": client_id,
        });

        let response = self
            .client
            .post(format!("{}/prompt", self.api_url))
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response, "/prompt").await
    }

    /// Retrieve execution history for a specific prompt.
    ///
    /// Sends a `GET /history/{prompt_id}` request.  The map is empty
    /// until ComfyUI has indexed the prompt.
    pub async fn get_history(&self, prompt_id: &str) -> Result<History, ComfyUIApiError> {
        let response = self
            .client
            .get(format!("{}/history/{}", self.api_url, prompt_id))
            .send()
            .await?;

        Self::parse_response(response, "/history").await
    }

    /// Download one output artifact.
    ///
    /// Sends `GET /view?filename=..&subfolder=..&type=..` and returns
    /// the raw bytes.
    pub async fn view_image(&self, image: &ImageRef) -> Result<Vec<u8>, ComfyUIApiError> {
        let response = self
            .client
            .get(format!("{}/view", self.api_url))
            .query(&[
                ("filename", image.filename.as_str()),
                ("subfolder", image.subfolder.as_str()),
                ("type", image.kind.as_str()),
            ])
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`ComfyUIApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ComfyUIApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ComfyUIApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        endpoint: &'static str,
    ) -> Result<T, ComfyUIApiError> {
        let response = Self::ensure_success(response).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ComfyUIApiError::InvalidResponse {
            endpoint,
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;
    use crate::mock::{sample_png, MockEngine};

    #[test]
    fn trailing_slash_trimmed_from_base_url() {
        let api = ComfyUIApi::new("http://host:8188/");
        assert_eq!(api.api_url(), "http://host:8188");
    }

    #[test]
    fn host_port_builds_http_url() {
        let api = ComfyUIApi::from_host_port("127.0.0.1", 8188);
        assert_eq!(api.api_url(), "http://127.0.0.1:8188");
    }

    #[test]
    fn submit_response_requires_prompt_id() {
        let err = serde_json::from_str::<SubmitResponse>(r#"{"number": 3}"#).unwrap_err();
        assert!(err.to_string().contains("prompt_id"));
    }

    // -- against the mock engine --

    #[tokio::test]
    async fn submit_posts_graph_and_client_id() {
        let engine = MockEngine::start().await;
        let api = ComfyUIApi::new(engine.url());
        let graph = json!({ "3": { "class_type": "KSampler", "inputs": { "seed": 5 } } });

        let resp = api.submit_workflow(&graph, "client-1").await.unwrap();

        assert_eq!(resp.prompt_id, "prompt-1");
        let submissions = engine.submissions();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0]["prompt"], graph);
        assert_eq!(submissions[0]["client_id"], "client-1");
    }

    #[tokio::test]
    async fn rejected_submission_keeps_status_and_body() {
        let engine = MockEngine::builder().reject_submissions(400).start().await;
        let api = ComfyUIApi::new(engine.url());

        let err = api.submit_workflow(&json!({}), "c").await.unwrap_err();

        assert_matches!(
            err,
            ComfyUIApiError::ApiError { status: 400, ref body } if body.contains("failed validation")
        );
    }

    #[tokio::test]
    async fn submission_without_prompt_id_is_invalid_response() {
        let engine = MockEngine::builder().omit_prompt_id().start().await;
        let api = ComfyUIApi::new(engine.url());

        let err = api.submit_workflow(&json!({}), "c").await.unwrap_err();

        assert_matches!(err, ComfyUIApiError::InvalidResponse { endpoint: "/prompt", .. });
    }

    #[tokio::test]
    async fn unreachable_engine_is_request_error() {
        let api = ComfyUIApi::new("http://127.0.0.1:9");
        let err = api.submit_workflow(&json!({}), "c").await.unwrap_err();
        assert_matches!(err, ComfyUIApiError::Request(_));
    }

    #[tokio::test]
    async fn view_image_sends_descriptor_triple() {
        let png = sample_png(3, 2);
        let engine = MockEngine::builder().image(png.clone()).start().await;
        let api = ComfyUIApi::new(engine.url());
        let image = ImageRef {
            filename: "out 1.png".into(),
            subfolder: "batch".into(),
            kind: "temp".into(),
        };

        let bytes = api.view_image(&image).await.unwrap();

        assert_eq!(bytes, png);
        let views = engine.views();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0]["filename"], "out 1.png");
        assert_eq!(views[0]["subfolder"], "batch");
        assert_eq!(views[0]["type"], "temp");
    }

    #[tokio::test]
    async fn history_is_empty_before_indexing() {
        let engine = MockEngine::builder().pending_polls(1).start().await;
        let api = ComfyUIApi::new(engine.url());
        let resp = api.submit_workflow(&json!({}), "c").await.unwrap();

        let history = api.get_history(&resp.prompt_id).await.unwrap();

        assert!(history.is_empty());
    }

    #[test]
    fn submit_response_optional_fields_default() {
        let resp: SubmitResponse = serde_json::from_str(r#"{"prompt_id": "abc"}"#).unwrap();
        assert_eq!(resp.prompt_id, "abc");
        assert_eq!(resp.number, 0);
        assert!(resp.node_errors.is_null());
    }
}
