//! # Studio Gen
//!
//! Generation backends and the per-feature queues that admit calls to them.
//!
//! | Feature | Cool-down variable | Default |
//! |---------|--------------------|---------|
//! | Image | `GENSTUDIO_IMAGE_QUEUE_DELAY_MS` | 4000 ms |
//! | Video | `GENSTUDIO_VIDEO_QUEUE_DELAY_MS` | 5000 ms |
//! | Storybook | `GENSTUDIO_STORYBOOK_QUEUE_DELAY_MS` | 5000 ms |
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use studio_gen::{Feature, GenerationRequest, MockGenerator, StudioConfig, StudioQueues};
//!
//! #[tokio::main]
//! async fn main() {
//!     let queues = StudioQueues::new(&StudioConfig::from_env());
//!     let generator = Arc::new(MockGenerator::default());
//!
//!     let handle = queues.generate(generator, GenerationRequest::new(Feature::Image, "a lighthouse"));
//!     let artifact = handle.await.unwrap();
//!     println!("{}", artifact.uri);
//! }
//! ```

pub mod dispatch;
pub mod feature;
pub mod mock;
pub mod provider;

pub use dispatch::submit_generation;
pub use feature::{ConfigError, Feature, StudioConfig, StudioQueues};
pub use mock::MockGenerator;
pub use provider::{Artifact, GenerationError, GenerationRequest, Generator};
