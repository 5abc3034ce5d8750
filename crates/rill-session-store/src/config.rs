//! Configuration for the in-memory store.

use std::time::Duration;

/// Default maximum number of entries held before LRU eviction.
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Default TTL for entries written without one (none - entries don't expire).
pub const DEFAULT_TTL: Option<Duration> = None;

/// Default interval between background sweeps of expired entries.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for [`MemoryStore`](crate::MemoryStore).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum number of entries to keep before LRU eviction.
    pub max_entries: usize,

    /// Lifetime applied to entries written without an explicit TTL.
    pub default_ttl: Option<Duration>,

    /// Interval for the background cleanup task.
    pub cleanup_interval: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            default_ttl: DEFAULT_TTL,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
        }
    }
}

impl StoreConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of entries.
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    /// Set the TTL used when a write doesn't carry one.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    /// Set the cleanup interval.
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }
}
