//! Per-feature queue configuration and ownership
//!
//! Each feature gets its own independent queue with its own cool-down,
//! read once from the environment when the queues are built.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use studio_queue::{parse_delay_ms, QueueConfig, QueueSnapshot, RequestQueue};
use tracing::info;

/// Error types for configuration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Unknown feature: {0}")]
    UnknownFeature(String),
}

/// A generation feature backed by its own queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feature {
    Image,
    Video,
    Storybook,
}

impl Feature {
    pub const ALL: [Feature; 3] = [Feature::Image, Feature::Video, Feature::Storybook];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Storybook => "storybook",
        }
    }

    /// Environment variable holding this feature's cool-down in milliseconds
    pub fn delay_env_var(&self) -> &'static str {
        match self {
            Self::Image => "GENSTUDIO_IMAGE_QUEUE_DELAY_MS",
            Self::Video => "GENSTUDIO_VIDEO_QUEUE_DELAY_MS",
            Self::Storybook => "GENSTUDIO_STORYBOOK_QUEUE_DELAY_MS",
        }
    }

    /// Cool-down used when the variable is unset or not a finite number
    pub fn default_delay_ms(&self) -> u64 {
        match self {
            Self::Image => 4000,
            Self::Video | Self::Storybook => 5000,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Image => "image/png",
            Self::Video => "video/mp4",
            Self::Storybook => "application/json",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Feature {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "image" | "images" => Ok(Self::Image),
            "video" | "videos" => Ok(Self::Video),
            "storybook" | "story" => Ok(Self::Storybook),
            other => Err(ConfigError::UnknownFeature(other.to_string())),
        }
    }
}

/// Resolved queue configuration for every feature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudioConfig {
    pub image: QueueConfig,
    pub video: QueueConfig,
    pub storybook: QueueConfig,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl StudioConfig {
    /// Load from environment
    pub fn from_env() -> Self {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Load using an arbitrary variable lookup
    pub fn from_lookup<L>(lookup: L) -> Self
    where
        L: Fn(&str) -> Option<String>,
    {
        let resolve = |feature: Feature| {
            let cooldown_ms = lookup(feature.delay_env_var())
                .and_then(|raw| parse_delay_ms(&raw))
                .unwrap_or_else(|| feature.default_delay_ms());
            QueueConfig::new(feature.as_str(), Duration::from_millis(cooldown_ms))
        };

        Self {
            image: resolve(Feature::Image),
            video: resolve(Feature::Video),
            storybook: resolve(Feature::Storybook),
        }
    }

    pub fn get(&self, feature: Feature) -> &QueueConfig {
        match feature {
            Feature::Image => &self.image,
            Feature::Video => &self.video,
            Feature::Storybook => &self.storybook,
        }
    }

    pub fn get_mut(&mut self, feature: Feature) -> &mut QueueConfig {
        match feature {
            Feature::Image => &mut self.image,
            Feature::Video => &mut self.video,
            Feature::Storybook => &mut self.storybook,
        }
    }
}

/// Owns one independent request queue per feature.
///
/// Dropping the set (or calling [`StudioQueues::dispose`]) disposes every queue.
#[derive(Debug)]
pub struct StudioQueues {
    image: RequestQueue,
    video: RequestQueue,
    storybook: RequestQueue,
}

impl StudioQueues {
    pub fn new(config: &StudioConfig) -> Self {
        info!(
            image_ms = config.image.cooldown_ms(),
            video_ms = config.video.cooldown_ms(),
            storybook_ms = config.storybook.cooldown_ms(),
            "Feature queues created"
        );

        Self {
            image: RequestQueue::new(config.image.clone()),
            video: RequestQueue::new(config.video.clone()),
            storybook: RequestQueue::new(config.storybook.clone()),
        }
    }

    pub fn queue(&self, feature: Feature) -> &RequestQueue {
        match feature {
            Feature::Image => &self.image,
            Feature::Video => &self.video,
            Feature::Storybook => &self.storybook,
        }
    }

    /// Current snapshot of every queue
    pub fn snapshots(&self) -> Vec<(Feature, QueueSnapshot)> {
        Feature::ALL
            .iter()
            .map(|feature| (*feature, self.queue(*feature).snapshot()))
            .collect()
    }

    pub fn dispose(&self) {
        for feature in Feature::ALL {
            self.queue(feature).dispose();
        }
    }
}
