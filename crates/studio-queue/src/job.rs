//! Job definitions

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::oneshot;
use tokio::time::Instant;
use uuid::Uuid;

/// Job Identifier
pub type JobId = Uuid;

/// Optional metadata attached to a submission
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobMeta {
    /// Human-readable description, only used in logs
    pub description: Option<String>,
}

impl JobMeta {
    /// Metadata carrying a description
    pub fn described(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
        }
    }
}

/// Error delivered through a job's outcome
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobError<E> {
    /// The operation itself failed; the error is forwarded unmodified
    #[error("{0}")]
    Operation(E),
    /// The operation panicked while running
    #[error("Operation panicked: {0}")]
    Panicked(String),
    /// Withdrawn from the backlog before it started
    #[error("Job cancelled before it started")]
    Cancelled,
    /// The queue was disposed before the job started
    #[error("Queue disposed")]
    Disposed,
}

impl<E> JobError<E> {
    /// Borrow the operation's own error, if that is what this is
    pub fn operation(&self) -> Option<&E> {
        match self {
            Self::Operation(e) => Some(e),
            _ => None,
        }
    }

    /// Take the operation's own error, if that is what this is
    pub fn into_operation(self) -> Option<E> {
        match self {
            Self::Operation(e) => Some(e),
            _ => None,
        }
    }
}

/// Handle returned by `submit`.
///
/// Awaiting the handle yields the job's outcome. It settles exactly once.
pub struct JobHandle<T, E> {
    id: JobId,
    outcome: oneshot::Receiver<Result<T, JobError<E>>>,
}

impl<T, E> JobHandle<T, E> {
    pub(crate) fn new(id: JobId, outcome: oneshot::Receiver<Result<T, JobError<E>>>) -> Self {
        Self { id, outcome }
    }

    /// Identity of the submitted job
    pub fn id(&self) -> JobId {
        self.id
    }
}

impl<T, E> fmt::Debug for JobHandle<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobHandle").field("id", &self.id).finish()
    }
}

impl<T, E> Future for JobHandle<T, E> {
    type Output = Result<T, JobError<E>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.outcome).poll(cx) {
            Poll::Ready(Ok(settled)) => Poll::Ready(settled),
            // Sender dropped without settling: the runtime tore the queue down
            Poll::Ready(Err(_)) => Poll::Ready(Err(JobError::Disposed)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// How a run ended, as seen by the driver (for logging only)
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum JobOutcome {
    Succeeded,
    Failed,
    Panicked(String),
}

/// Why a job was settled without running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Rejection {
    Cancelled,
    Disposed,
}

/// Type-erased unit of work held in the backlog.
///
/// Erasing the result type lets one queue carry jobs with different
/// result and error types.
pub(crate) trait QueuedJob: Send {
    /// Run the operation and settle the outcome channel
    fn run(self: Box<Self>) -> BoxFuture<'static, JobOutcome>;

    /// Settle the outcome channel without running
    fn reject(self: Box<Self>, rejection: Rejection);
}

pub(crate) struct TypedJob<F, T, E> {
    operation: F,
    outcome: oneshot::Sender<Result<T, JobError<E>>>,
}

impl<F, T, E> TypedJob<F, T, E> {
    pub(crate) fn new(operation: F, outcome: oneshot::Sender<Result<T, JobError<E>>>) -> Self {
        Self { operation, outcome }
    }
}

impl<F, Fut, T, E> QueuedJob for TypedJob<F, T, E>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    fn run(self: Box<Self>) -> BoxFuture<'static, JobOutcome> {
        let TypedJob { operation, outcome } = *self;

        async move {
            let result = AssertUnwindSafe(async move { operation().await })
                .catch_unwind()
                .await;

            let (settled, report) = match result {
                Ok(Ok(value)) => (Ok(value), JobOutcome::Succeeded),
                Ok(Err(error)) => (Err(JobError::Operation(error)), JobOutcome::Failed),
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    (
                        Err(JobError::Panicked(message.clone())),
                        JobOutcome::Panicked(message),
                    )
                }
            };

            // The caller may have dropped its handle; that is not our concern
            let _ = outcome.send(settled);
            report
        }
        .boxed()
    }

    fn reject(self: Box<Self>, rejection: Rejection) {
        let error = match rejection {
            Rejection::Cancelled => JobError::Cancelled,
            Rejection::Disposed => JobError::Disposed,
        };
        let _ = self.outcome.send(Err(error));
    }
}

/// A job waiting in the backlog
pub(crate) struct PendingJob {
    pub id: JobId,
    pub meta: JobMeta,
    pub created_at: DateTime<Utc>,
    pub enqueued_at: Instant,
    pub work: Box<dyn QueuedJob>,
}

impl PendingJob {
    pub(crate) fn new(id: JobId, meta: JobMeta, work: Box<dyn QueuedJob>) -> Self {
        Self {
            id,
            meta,
            created_at: Utc::now(),
            enqueued_at: Instant::now(),
            work,
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
