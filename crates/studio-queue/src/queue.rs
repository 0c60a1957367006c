//! Single-slot request queue with an inter-job cool-down

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{oneshot, watch, Notify};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{QueueConfig, MAX_COOLDOWN};
use crate::job::{
    JobHandle, JobId, JobMeta, JobOutcome, PendingJob, QueuedJob, Rejection, TypedJob,
};
use crate::observer::{Observer, Observers, Subscription};
use crate::snapshot::QueueSnapshot;

/// Runs submitted operations one at a time, in submission order, with a
/// fixed cool-down between one job's completion and the next job's start.
///
/// Jobs are driven by a tokio task spawned on demand, so `submit` must be
/// called from within a tokio runtime. The queue owns its backlog: dropping
/// it (or calling [`RequestQueue::dispose`]) settles every job that has not
/// started with [`JobError::Disposed`](crate::JobError::Disposed).
pub struct RequestQueue {
    inner: Arc<Inner>,
}

struct Inner {
    config: QueueConfig,
    state: Mutex<QueueState>,
    observers: Observers,
    shutdown: watch::Sender<bool>,
    /// Wakes a cool-down so it can notice an emptied backlog
    backlog_changed: Notify,
}

#[derive(Default)]
struct QueueState {
    backlog: VecDeque<PendingJob>,
    active: Option<JobId>,
    delay_remaining: Option<Duration>,
    last_finished: Option<Instant>,
    driving: bool,
    disposed: bool,
    /// Sequence number of the last published snapshot
    published: u64,
}

impl QueueState {
    fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            active_job_id: self.active,
            queued_ids: self.backlog.iter().map(|job| job.id).collect(),
            delay_remaining_ms: self.delay_remaining.map(|d| d.as_millis() as u64),
        }
    }

    /// Number the current state for publication. Taken under the state
    /// lock, so a higher number always describes a later state.
    fn publish(&mut self) -> (u64, QueueSnapshot) {
        self.published += 1;
        (self.published, self.snapshot())
    }

    /// Cool-down still owed before the next start
    fn owed_cooldown(&self, cooldown: Duration, now: Instant) -> Duration {
        match self.last_finished {
            Some(finished) => instant_after(finished, cooldown).saturating_duration_since(now),
            None => Duration::ZERO,
        }
    }
}

/// `from + wait`, saturating far in the future instead of overflowing
fn instant_after(from: Instant, wait: Duration) -> Instant {
    from.checked_add(wait).unwrap_or_else(|| from + MAX_COOLDOWN)
}

/// What the driver should do next
enum Step {
    Run(PendingJob),
    Wait(Duration),
    Stop,
}

impl RequestQueue {
    pub fn new(config: QueueConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        debug!(
            queue = %config.name,
            cooldown_ms = config.cooldown_ms(),
            "Request queue created"
        );

        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(QueueState::default()),
                observers: Observers::default(),
                shutdown,
                backlog_changed: Notify::new(),
            }),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.inner.config
    }

    /// Submit an operation. Never blocks; see [`RequestQueue::submit_with`].
    pub fn submit<F, Fut, T, E>(&self, operation: F) -> JobHandle<T, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        self.submit_with(JobMeta::default(), operation)
    }

    /// Submit an operation with metadata.
    ///
    /// The job is appended to the backlog and the driver is started if it is
    /// not already running. The returned handle settles with the operation's
    /// result, or with the error it returned, forwarded unmodified.
    pub fn submit_with<F, Fut, T, E>(&self, meta: JobMeta, operation: F) -> JobHandle<T, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        let work = Box::new(TypedJob::new(operation, tx));

        let start_driver = {
            let mut state = self.inner.lock_state();
            if state.disposed {
                drop(state);
                debug!(queue = %self.inner.config.name, job_id = %id, "Submission to disposed queue");
                work.reject(Rejection::Disposed);
                return JobHandle::new(id, rx);
            }

            debug!(
                queue = %self.inner.config.name,
                job_id = %id,
                description = ?meta.description,
                position = state.backlog.len(),
                "Job enqueued"
            );
            state.backlog.push_back(PendingJob::new(id, meta, work));
            !std::mem::replace(&mut state.driving, true)
        };

        self.inner.notify();

        if start_driver {
            tokio::spawn(drive(self.inner.clone()));
        }

        JobHandle::new(id, rx)
    }

    /// Register an observer.
    ///
    /// The observer is called once right away with the current snapshot,
    /// then after every transition until it is unsubscribed.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&QueueSnapshot) + Send + Sync + 'static,
    {
        let observer: Observer = Arc::new(observer);
        let subscription = self.inner.observers.register(observer);
        let (seq, snapshot) = self.inner.lock_state().publish();
        self.inner
            .observers
            .deliver_to(&self.inner.config.name, &subscription, seq, &snapshot);
        subscription
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        self.inner.lock_state().snapshot()
    }

    /// Withdraw a job that has not started yet.
    ///
    /// Its handle settles with `JobError::Cancelled`. Returns false if the
    /// job is active, already finished or unknown.
    pub fn cancel(&self, id: JobId) -> bool {
        let job = {
            let mut state = self.inner.lock_state();
            state
                .backlog
                .iter()
                .position(|job| job.id == id)
                .and_then(|index| state.backlog.remove(index))
        };

        match job {
            Some(job) => {
                debug!(queue = %self.inner.config.name, job_id = %id, "Job cancelled");
                job.work.reject(Rejection::Cancelled);
                self.inner.backlog_changed.notify_one();
                self.inner.notify();
                true
            }
            None => false,
        }
    }

    /// Tear the queue down.
    ///
    /// Every job still in the backlog settles with `JobError::Disposed`, a
    /// pending cool-down is interrupted, and later submissions are refused.
    /// The active job, if any, is left to finish and settle on its own.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.lock_state().disposed
    }

    /// Number of jobs waiting to start
    pub fn len(&self) -> usize {
        self.inner.lock_state().backlog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock_state().backlog.is_empty()
    }

    pub fn observer_count(&self) -> usize {
        self.inner.observers.count()
    }
}

impl Drop for RequestQueue {
    fn drop(&mut self) {
        self.inner.dispose();
    }
}

impl fmt::Debug for RequestQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestQueue")
            .field("config", &self.inner.config)
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish the current state. Called with the state lock released.
    fn notify(&self) {
        let (seq, snapshot) = self.lock_state().publish();
        self.observers.broadcast(&self.config.name, seq, &snapshot);
    }

    fn dispose(&self) {
        let drained = {
            let mut state = self.lock_state();
            if state.disposed {
                return;
            }
            state.disposed = true;
            state.delay_remaining = None;
            std::mem::take(&mut state.backlog)
        };

        info!(
            queue = %self.config.name,
            rejected = drained.len(),
            "Request queue disposed"
        );

        self.shutdown.send_replace(true);
        for job in drained {
            job.work.reject(Rejection::Disposed);
        }
        self.notify();
    }

    /// Decide the next driver step under one lock acquisition
    fn next_step(&self) -> Step {
        let mut state = self.lock_state();
        if state.disposed || state.backlog.is_empty() {
            state.driving = false;
            return Step::Stop;
        }

        let owed = state.owed_cooldown(self.config.cooldown, Instant::now());
        if !owed.is_zero() {
            return Step::Wait(owed);
        }

        match state.backlog.pop_front() {
            Some(job) => {
                state.active = Some(job.id);
                Step::Run(job)
            }
            None => {
                state.driving = false;
                Step::Stop
            }
        }
    }

    fn finish_active(&self) {
        let mut state = self.lock_state();
        state.active = None;
        state.last_finished = Some(Instant::now());
    }

    /// Wait out the cool-down, publishing the remaining time every tick.
    ///
    /// Ends early if the queue is disposed or a cancel empties the backlog.
    async fn cool_down(&self, duration: Duration, shutdown: &mut watch::Receiver<bool>) {
        let started = Instant::now();
        let deadline = instant_after(started, duration);
        let tick = self.config.tick_interval;

        debug!(
            queue = %self.config.name,
            wait_ms = duration.as_millis() as u64,
            "Cool-down started"
        );
        self.lock_state().delay_remaining = Some(duration);
        self.notify();

        let mut ticker = time::interval_at(started + tick, tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let sleep = time::sleep_until(deadline);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => break,
                _ = ticker.tick() => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    {
                        let mut state = self.lock_state();
                        if state.backlog.is_empty() {
                            break;
                        }
                        state.delay_remaining = Some(remaining);
                    }
                    self.notify();
                }
                _ = self.backlog_changed.notified() => {
                    if self.lock_state().backlog.is_empty() {
                        break;
                    }
                }
                _ = shutdown.changed() => break,
            }
        }

        self.lock_state().delay_remaining = None;
        self.notify();
        debug!(queue = %self.config.name, "Cool-down finished");
    }
}

/// Driver loop. At most one runs per queue, guarded by `QueueState::driving`.
async fn drive(inner: Arc<Inner>) {
    let mut shutdown = inner.shutdown.subscribe();

    loop {
        let job = match inner.next_step() {
            Step::Run(job) => job,
            Step::Wait(owed) => {
                inner.cool_down(owed, &mut shutdown).await;
                continue;
            }
            Step::Stop => break,
        };
        inner.notify();

        let PendingJob {
            id,
            meta,
            created_at,
            enqueued_at,
            work,
        } = job;

        info!(
            queue = %inner.config.name,
            job_id = %id,
            description = ?meta.description,
            submitted_at = %created_at.to_rfc3339(),
            waited_ms = enqueued_at.elapsed().as_millis() as u64,
            "Job started"
        );

        let started = Instant::now();
        let outcome = work.run().await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            JobOutcome::Succeeded => {
                info!(queue = %inner.config.name, job_id = %id, elapsed_ms, "Job completed");
            }
            JobOutcome::Failed => {
                warn!(queue = %inner.config.name, job_id = %id, elapsed_ms, "Job failed");
            }
            JobOutcome::Panicked(message) => {
                error!(
                    queue = %inner.config.name,
                    job_id = %id,
                    elapsed_ms,
                    panic = %message,
                    "Job panicked"
                );
            }
        }

        inner.finish_active();
        inner.notify();
    }

    debug!(queue = %inner.config.name, "Driver idle");
}
