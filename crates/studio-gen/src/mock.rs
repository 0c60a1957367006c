//! Mock generator for testing

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use crate::provider::{Artifact, GenerationError, GenerationRequest, Generator};

/// A generator that fabricates artifacts after a simulated latency.
/// Useful for exercising queues without a real backend.
#[derive(Debug)]
pub struct MockGenerator {
    pub name: String,
    /// Simulated latency
    latency: Duration,
    /// Every n-th call fails
    fail_every: Option<u32>,
    /// Answer every call with `RateLimited`
    rate_limited: bool,
    calls: AtomicU32,
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new(Duration::from_millis(50))
    }
}

impl MockGenerator {
    pub fn new(latency: Duration) -> Self {
        Self {
            name: "mock".to_string(),
            latency,
            fail_every: None,
            rate_limited: false,
            calls: AtomicU32::new(0),
        }
    }

    /// Fail every `n`-th call with `RequestFailed`; zero disables failures
    pub fn failing_every(mut self, n: u32) -> Self {
        self.fail_every = (n > 0).then_some(n);
        self
    }

    /// A backend that always reports rate limiting
    pub fn rate_limited() -> Self {
        Self {
            name: "rate-limited-mock".to_string(),
            rate_limited: true,
            ..Self::default()
        }
    }

    /// Number of calls received so far
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generator for MockGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: GenerationRequest) -> Result<Artifact, GenerationError> {
        let start = Instant::now();
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

        tokio::time::sleep(self.latency).await;

        if self.rate_limited {
            return Err(GenerationError::RateLimited);
        }
        if let Some(n) = self.fail_every {
            if call % n == 0 {
                return Err(GenerationError::RequestFailed(format!(
                    "scripted failure on call {call}"
                )));
            }
        }

        Ok(Artifact {
            feature: request.feature,
            uri: format!("mock://{}/{}", request.feature, call),
            mime_type: request.feature.mime_type().to_string(),
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::Feature;

    #[tokio::test(start_paused = true)]
    async fn test_mock_generates_artifact() {
        let mock = MockGenerator::new(Duration::from_millis(200));
        let artifact = mock
            .generate(GenerationRequest::new(Feature::Image, "a red kite"))
            .await
            .unwrap();

        assert_eq!(artifact.uri, "mock://image/1");
        assert_eq!(artifact.mime_type, "image/png");
        assert_eq!(artifact.latency_ms, 200);
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_scripted_failures() {
        let mock = MockGenerator::new(Duration::ZERO).failing_every(2);
        let request = GenerationRequest::new(Feature::Video, "waves");

        assert!(mock.generate(request.clone()).await.is_ok());
        assert_eq!(
            mock.generate(request.clone()).await,
            Err(GenerationError::RequestFailed("scripted failure on call 2".to_string()))
        );
        assert!(mock.generate(request).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_mock() {
        let mock = MockGenerator::rate_limited();
        let result = mock
            .generate(GenerationRequest::new(Feature::Storybook, "dragons"))
            .await;
        assert_eq!(result, Err(GenerationError::RateLimited));
    }
}
