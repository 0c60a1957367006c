//! Observable queue state and caller-side status derivation

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::job::JobId;

/// Externally observable state of a queue at one instant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    /// Job currently executing
    pub active_job_id: Option<JobId>,
    /// Backlog in start order
    pub queued_ids: Vec<JobId>,
    /// Remaining cool-down before the next job may start
    pub delay_remaining_ms: Option<u64>,
}

impl QueueSnapshot {
    /// Zero-based position of a pending job in the backlog
    pub fn position(&self, id: JobId) -> Option<usize> {
        self.queued_ids.iter().position(|queued| *queued == id)
    }

    /// True when nothing is running, waiting or queued
    pub fn is_idle(&self) -> bool {
        self.active_job_id.is_none()
            && self.queued_ids.is_empty()
            && self.delay_remaining_ms.is_none()
    }

    pub fn delay_remaining(&self) -> Option<Duration> {
        self.delay_remaining_ms.map(Duration::from_millis)
    }

    /// Derive the status of `id` from this snapshot
    pub fn status_of(&self, id: JobId) -> JobStatus {
        JobStatus::derive(id, self)
    }
}

/// Status of a job as seen by the caller that submitted it.
///
/// Derived purely from a snapshot plus the caller's remembered job id.
/// A job that is neither active nor queued has either not been observed
/// yet or already completed; callers learn completion from the job handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Currently executing
    Running,
    /// First in line, waiting out the cool-down
    StartingIn(Duration),
    /// Waiting behind `ahead` earlier submissions
    Queued { ahead: usize },
    /// Not present in the snapshot
    Untracked,
}

impl JobStatus {
    pub fn derive(id: JobId, snapshot: &QueueSnapshot) -> Self {
        if snapshot.active_job_id == Some(id) {
            return Self::Running;
        }

        match snapshot.position(id) {
            Some(0) => match snapshot.delay_remaining() {
                Some(delay) => Self::StartingIn(delay),
                None => Self::Queued { ahead: 0 },
            },
            Some(ahead) => Self::Queued { ahead },
            None => Self::Untracked,
        }
    }

    /// True while the job still waits in the backlog
    pub fn is_waiting(&self) -> bool {
        matches!(self, Self::StartingIn(_) | Self::Queued { .. })
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => f.write_str("running"),
            Self::StartingIn(delay) => {
                // Round up so the countdown never shows 0s while still waiting
                let secs = delay.as_millis().div_ceil(1000);
                write!(f, "starting in {secs}s")
            }
            Self::Queued { ahead: 0 } => f.write_str("next in line"),
            Self::Queued { ahead: 1 } => f.write_str("1 request ahead"),
            Self::Queued { ahead } => write!(f, "{ahead} requests ahead"),
            Self::Untracked => f.write_str("not in queue"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn snapshot(active: Option<JobId>, queued: &[JobId], delay: Option<u64>) -> QueueSnapshot {
        QueueSnapshot {
            active_job_id: active,
            queued_ids: queued.to_vec(),
            delay_remaining_ms: delay,
        }
    }

    #[test]
    fn test_default_snapshot_is_idle() {
        let snap = QueueSnapshot::default();
        assert!(snap.is_idle());
        assert_eq!(snap.position(Uuid::new_v4()), None);
    }

    #[test]
    fn test_status_derivation() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let snap = snapshot(Some(a), &[b, c], None);

        assert_eq!(snap.status_of(a), JobStatus::Running);
        assert_eq!(snap.status_of(b), JobStatus::Queued { ahead: 0 });
        assert_eq!(snap.status_of(c), JobStatus::Queued { ahead: 1 });
        assert_eq!(snap.status_of(Uuid::new_v4()), JobStatus::Untracked);
    }

    #[test]
    fn test_status_during_cooldown() {
        let (b, c) = (Uuid::new_v4(), Uuid::new_v4());
        let snap = snapshot(None, &[b, c], Some(1500));

        assert_eq!(
            snap.status_of(b),
            JobStatus::StartingIn(Duration::from_millis(1500))
        );
        // Only the head of the backlog reports the countdown
        assert_eq!(snap.status_of(c), JobStatus::Queued { ahead: 1 });
        assert!(snap.status_of(c).is_waiting());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(JobStatus::Running.to_string(), "running");
        assert_eq!(
            JobStatus::StartingIn(Duration::from_millis(1500)).to_string(),
            "starting in 2s"
        );
        assert_eq!(
            JobStatus::StartingIn(Duration::from_millis(2000)).to_string(),
            "starting in 2s"
        );
        assert_eq!(JobStatus::Queued { ahead: 0 }.to_string(), "next in line");
        assert_eq!(JobStatus::Queued { ahead: 1 }.to_string(), "1 request ahead");
        assert_eq!(JobStatus::Queued { ahead: 3 }.to_string(), "3 requests ahead");
    }

    #[test]
    fn test_snapshot_wire_format() {
        let id = Uuid::new_v4();
        let snap = snapshot(None, &[id], Some(500));
        let json = serde_json::to_value(&snap).unwrap();

        assert_eq!(json["activeJobId"], serde_json::Value::Null);
        assert_eq!(json["queuedIds"][0], id.to_string());
        assert_eq!(json["delayRemainingMs"], 500);
    }
}
