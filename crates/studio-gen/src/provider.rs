//! Generator trait and common types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::feature::Feature;

/// Errors from a generation backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("Request failed: {0}")]
    RequestFailed(String),
    #[error("Rate limited")]
    RateLimited,
}

/// One unit of generation work, already composed by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub feature: Feature,
    /// Natural-language prompt
    pub prompt: String,
    /// Structured form of the same prompt
    #[serde(default)]
    pub structured: serde_json::Value,
}

impl GenerationRequest {
    pub fn new(feature: Feature, prompt: impl Into<String>) -> Self {
        Self {
            feature,
            prompt: prompt.into(),
            structured: serde_json::Value::Null,
        }
    }

    pub fn with_structured(mut self, structured: serde_json::Value) -> Self {
        self.structured = structured;
        self
    }

    /// Short description for queue metadata and logs
    pub fn describe(&self) -> String {
        let prompt: String = self.prompt.chars().take(40).collect();
        if prompt.len() < self.prompt.len() {
            format!("{}: {}...", self.feature, prompt)
        } else {
            format!("{}: {}", self.feature, prompt)
        }
    }
}

/// Output of a successful generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub feature: Feature,
    /// Where the generated media can be fetched
    pub uri: String,
    pub mime_type: String,
    /// Time taken in milliseconds
    pub latency_ms: u64,
}

/// A backend that performs one rate-limited generation call per request
#[async_trait]
pub trait Generator: Send + Sync + std::fmt::Debug {
    /// Backend name
    fn name(&self) -> &str;

    /// Perform one generation, including any retries the backend chooses
    async fn generate(&self, request: GenerationRequest) -> Result<Artifact, GenerationError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_describe_truncates_long_prompts() {
        let short = GenerationRequest::new(Feature::Image, "a lighthouse at dusk");
        assert_eq!(short.describe(), "image: a lighthouse at dusk");

        let long = GenerationRequest::new(Feature::Video, "x".repeat(100));
        assert_eq!(long.describe(), format!("video: {}...", "x".repeat(40)));
    }

    #[test]
    fn test_request_serialization() {
        let request = GenerationRequest::new(Feature::Storybook, "a fox learns to sail")
            .with_structured(json!({ "pages": 6, "style": "watercolor" }));

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["feature"], "storybook");
        assert_eq!(value["structured"]["pages"], 6);

        let back: GenerationRequest = serde_json::from_value(value).unwrap();
        assert_eq!(back, request);
    }
}
