use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::DEFAULT_REFRESH_INTERVAL_MS;

/// Configuration of the background refresh schedule.
///
/// `UpdateConfig` controls how often the launcher contacts the release
/// endpoint once a binary is cached. Before the first successful download
/// the interval is irrelevant: with nothing cached the launcher always
/// downloads synchronously.
///
/// # Default Behavior
///
/// A 24-hour interval, which keeps unauthenticated GitHub API usage well
/// below its rate limits even when the launcher runs many times per hour.
///
/// # TOML Example
/// ```toml
/// [update]
/// refresh_interval_ms = 86400000
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// Minimum time between two refresh attempts, in milliseconds.
    ///
    /// The next-check deadline is advanced by this amount at the *start* of
    /// every attempt, so concurrent invocations within one interval trigger
    /// a single check.
    ///
    /// # Default: `86400000` (24 hours)
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: default_refresh_interval_ms(),
        }
    }
}

impl UpdateConfig {
    /// The refresh interval as a [`Duration`].
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }
}

const fn default_refresh_interval_ms() -> u64 {
    DEFAULT_REFRESH_INTERVAL_MS
}
