//! Routing generation requests through the feature queues

use std::sync::Arc;

use studio_queue::{JobHandle, JobMeta, RequestQueue};
use tracing::debug;

use crate::feature::StudioQueues;
use crate::provider::{Artifact, GenerationError, GenerationRequest, Generator};

/// Wrap one generator call as a job on `queue`.
///
/// The generator's error is delivered unmodified through the handle.
pub fn submit_generation(
    queue: &RequestQueue,
    generator: Arc<dyn Generator>,
    request: GenerationRequest,
) -> JobHandle<Artifact, GenerationError> {
    let meta = JobMeta::described(request.describe());
    let handle = queue.submit_with(meta, move || async move { generator.generate(request).await });
    debug!(queue = %queue.config().name, job_id = %handle.id(), "Generation submitted");
    handle
}

impl StudioQueues {
    /// Submit `request` to the queue of its own feature
    pub fn generate(
        &self,
        generator: Arc<dyn Generator>,
        request: GenerationRequest,
    ) -> JobHandle<Artifact, GenerationError> {
        submit_generation(self.queue(request.feature), generator, request)
    }
}
