//! # Studio Queue
//!
//! Admission queue for calls to a rate-limited generation service.
//!
//! Features:
//! - At most one job running per queue, started in submission order
//! - Fixed cool-down between one job's completion and the next start
//! - Live snapshots for any number of observers
//! - Per-job outcome handles that forward the operation's own error
//! - Explicit disposal that settles every job still waiting
//!
//! ```rust
//! use std::time::Duration;
//! use studio_queue::{QueueConfig, RequestQueue};
//!
//! #[tokio::main]
//! async fn main() {
//!     let queue = RequestQueue::new(QueueConfig::new("image", Duration::from_millis(10)));
//!
//!     let _sub = queue.subscribe(|snapshot| println!("{snapshot:?}"));
//!     let handle = queue.submit(|| async { Ok::<_, String>("rendered") });
//!
//!     assert_eq!(handle.await.unwrap(), "rendered");
//! }
//! ```

pub mod config;
pub mod job;
pub mod observer;
pub mod queue;
pub mod snapshot;

pub use config::{parse_delay_ms, QueueConfig, DEFAULT_TICK_INTERVAL, MAX_COOLDOWN};
pub use job::{JobError, JobHandle, JobId, JobMeta};
pub use observer::{Observer, Subscription};
pub use queue::RequestQueue;
pub use snapshot::{JobStatus, QueueSnapshot};
