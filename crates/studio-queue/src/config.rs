//! Queue configuration
//!
//! The cool-down is fixed when a queue is built and never changes after.

use std::env;
use std::time::Duration;

/// Default interval between cool-down countdown updates
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(500);

/// Smallest accepted tick interval
const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Longest accepted cool-down, about thirty years. Larger values saturate
/// here so deadlines never overflow `Instant`.
pub const MAX_COOLDOWN: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Configuration for one request queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Queue name, used in logs
    pub name: String,
    /// Minimum gap between one job's completion and the next job's start
    pub cooldown: Duration,
    /// How often observers see the remaining cool-down
    pub tick_interval: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: "queue".to_string(),
            cooldown: Duration::ZERO,
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }
}

impl QueueConfig {
    pub fn new(name: impl Into<String>, cooldown: Duration) -> Self {
        Self {
            name: name.into(),
            cooldown: cooldown.min(MAX_COOLDOWN),
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }

    /// Build from a signed millisecond count; negative values clamp to zero
    pub fn from_millis(name: impl Into<String>, cooldown_ms: i64) -> Self {
        Self::new(name, Duration::from_millis(cooldown_ms.max(0) as u64))
    }

    /// Load the cool-down from an environment variable.
    ///
    /// Falls back to `default_ms` when the variable is unset or not a
    /// finite number.
    pub fn from_env(name: impl Into<String>, var: &str, default_ms: u64) -> Self {
        let cooldown_ms = env::var(var)
            .ok()
            .and_then(|raw| parse_delay_ms(&raw))
            .unwrap_or(default_ms);
        Self::new(name, Duration::from_millis(cooldown_ms))
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval.max(MIN_TICK_INTERVAL);
        self
    }

    pub fn cooldown_ms(&self) -> u64 {
        self.cooldown.as_millis() as u64
    }
}

/// Parse a millisecond delay.
///
/// Returns `None` for anything that is not a finite number. Negative values
/// clamp to zero and fractions truncate.
pub fn parse_delay_ms(raw: &str) -> Option<u64> {
    let value: f64 = raw.trim().parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(if value <= 0.0 { 0 } else { value as u64 })
}
