use serde::Deserialize;

/// One `image_generate` invocation, as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GenerationRequest {
    /// Free-text prompt written verbatim into the prompt nodes.
    pub prompt: String,
    /// Short human label; sanitized into the artifact filename.
    pub title: String,
    /// Size alias such as `"wide"` or `"16:9"`.
    pub aspect_ratio: String,
}

impl GenerationRequest {
    pub fn new(
        prompt: impl Into<String>,
        title: impl Into<String>,
        aspect_ratio: impl Into<String>,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            title: title.into(),
            aspect_ratio: aspect_ratio.into(),
        }
    }
}
