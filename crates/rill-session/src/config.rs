//! Session middleware configuration.
//!
//! Maps to a TOML document:
//! ```toml
//! key = "rill_session"          # cookie name and cache namespace
//! browser = true                # serve the transfer endpoint
//! preload = true                # advertise it on HTML responses
//! context_property = "session"
//! ttl_ms = 86400000
//! refresh_threshold_ms = 900000
//!
//! [cache]
//! max_entries = 10000
//! cleanup_interval_ms = 60000
//! ```

use std::path::Path;
use std::time::Duration;

use rill_session_store::{MemoryStore, StoreConfig};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default cookie name and cache namespace.
pub const DEFAULT_KEY: &str = "rill_session";

/// Default name the session is registered under in the request context.
pub const DEFAULT_CONTEXT_PROPERTY: &str = "session";

/// Default staleness tolerated before a session is rewritten (15 minutes).
pub const DEFAULT_REFRESH_THRESHOLD_MS: u64 = 15 * 60 * 1000;

/// Default cap on transfer POST bodies (1 MB).
pub const DEFAULT_MAX_TRANSFER_BODY: usize = 1024 * 1024;

/// Session middleware configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Cookie name, also used as the cache namespace.
    pub key: String,

    /// Serve the browser transfer endpoint.
    pub browser: bool,

    /// Append a preload `Link` header for the transfer endpoint to HTML responses.
    pub preload: bool,

    /// Name the session is registered under in [`SessionContext`](crate::SessionContext).
    pub context_property: String,

    /// Lifetime of cache entries and the cookie, in milliseconds.
    /// `None` leaves entries to the backend default and issues a browser-session cookie.
    pub ttl_ms: Option<u64>,

    /// Milliseconds since the last write after which a session is rewritten
    /// even if its data didn't change.
    pub refresh_threshold_ms: u64,

    /// Honor `X-Forwarded-Proto` when deciding the cookie `Secure` attribute.
    pub trust_proxy: bool,

    /// Maximum accepted size of a transfer POST body, in bytes.
    pub max_transfer_body: usize,

    /// Cache backend settings.
    pub cache: CacheSection,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            key: DEFAULT_KEY.to_string(),
            browser: true,
            preload: true,
            context_property: DEFAULT_CONTEXT_PROPERTY.to_string(),
            ttl_ms: None,
            refresh_threshold_ms: DEFAULT_REFRESH_THRESHOLD_MS,
            trust_proxy: false,
            max_transfer_body: DEFAULT_MAX_TRANSFER_BODY,
            cache: CacheSection::default(),
        }
    }
}

impl SessionConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values the TOML schema accepts but the middleware cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.cleanup_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "cache.cleanup_interval_ms",
                reason: "must be greater than zero",
            });
        }
        Ok(())
    }

    /// Load a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Set the cookie name / cache namespace.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Enable or disable the browser transfer endpoint.
    pub fn with_browser(mut self, enabled: bool) -> Self {
        self.browser = enabled;
        self
    }

    /// Enable or disable the preload `Link` header.
    pub fn with_preload(mut self, enabled: bool) -> Self {
        self.preload = enabled;
        self
    }

    /// Set the context property name.
    pub fn with_context_property(mut self, name: impl Into<String>) -> Self {
        self.context_property = name.into();
        self
    }

    /// Set the entry and cookie lifetime.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_ms = Some(ttl.as_millis() as u64);
        self
    }

    /// Disable the entry and cookie lifetime.
    pub fn without_ttl(mut self) -> Self {
        self.ttl_ms = None;
        self
    }

    /// Set the refresh threshold.
    pub fn with_refresh_threshold(mut self, threshold: Duration) -> Self {
        self.refresh_threshold_ms = threshold.as_millis() as u64;
        self
    }

    /// Trust `X-Forwarded-Proto` from a fronting proxy.
    pub fn with_trust_proxy(mut self, trust: bool) -> Self {
        self.trust_proxy = trust;
        self
    }

    /// Set the transfer POST body cap.
    pub fn with_max_transfer_body(mut self, bytes: usize) -> Self {
        self.max_transfer_body = bytes;
        self
    }

    /// Path of the browser transfer endpoint: `/__<percent-encoded key>__`.
    pub fn transfer_path(&self) -> String {
        format!("/__{}__", urlencoding::encode(&self.key))
    }

    /// Entry lifetime as a duration.
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_ms.map(Duration::from_millis)
    }

    /// Refresh threshold as a duration.
    pub fn refresh_threshold(&self) -> Duration {
        Duration::from_millis(self.refresh_threshold_ms)
    }

    /// Cookie `Max-Age` in whole seconds, floored.
    pub fn cookie_max_age(&self) -> Option<i64> {
        self.ttl_ms.map(|ms| (ms / 1000) as i64)
    }
}

/// Settings for the in-memory cache backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    /// Maximum number of cached sessions before LRU eviction.
    pub max_entries: usize,

    /// Interval between sweeps of expired entries, in milliseconds.
    pub cleanup_interval_ms: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        let defaults = StoreConfig::default();
        Self {
            max_entries: defaults.max_entries,
            cleanup_interval_ms: defaults.cleanup_interval.as_millis() as u64,
        }
    }
}

impl CacheSection {
    /// Backend configuration for these settings.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new()
            .with_max_entries(self.max_entries)
            .with_cleanup_interval(Duration::from_millis(self.cleanup_interval_ms))
    }

    /// Build an in-memory store namespaced under `namespace`.
    pub fn build_store(&self, namespace: &str) -> MemoryStore {
        MemoryStore::new(namespace, self.store_config())
    }
}
