//! In-memory store with LRU eviction and TTL support.

use std::num::NonZeroUsize;
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::config::StoreConfig;
use crate::error::Result;
use crate::store::SessionStore;
use crate::ttl::TtlTracker;

/// Inner state protected by RwLock.
struct StoreInner {
    /// LRU cache of serialized payloads, keyed by namespaced key.
    lru: LruCache<String, String>,

    /// TTL tracker for expiration.
    ttl: TtlTracker,
}

/// In-process cache backend.
///
/// This store provides:
/// - LRU eviction when max capacity is reached
/// - Per-entry TTL, after which an entry is never returned
/// - Key namespacing (`<namespace>:<key>`)
/// - Thread-safe access via RwLock
///
/// Clones share the same underlying state.
pub struct MemoryStore {
    inner: Arc<RwLock<StoreInner>>,
    namespace: String,
    config: StoreConfig,
}

impl MemoryStore {
    /// Create a new store whose keys live under `namespace`.
    pub fn new(namespace: impl Into<String>, config: StoreConfig) -> Self {
        let cap = NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::MIN);

        let inner = StoreInner {
            lru: LruCache::new(cap),
            ttl: TtlTracker::new(),
        };

        Self {
            inner: Arc::new(RwLock::new(inner)),
            namespace: namespace.into(),
            config,
        }
    }

    /// Get the store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Get the key namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Get the current number of stored entries, including expired ones not yet swept.
    pub async fn len(&self) -> usize {
        self.inner.read().await.lru.len()
    }

    /// Check if the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.lru.is_empty()
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }

    /// Remove expired entries.
    ///
    /// Called periodically by the task from [`spawn_cleanup_task`](Self::spawn_cleanup_task),
    /// but can also be called manually.
    pub async fn cleanup_expired(&self) -> usize {
        sweep(&self.inner).await
    }

    /// Start a background task that sweeps expired entries every
    /// `cleanup_interval`. The task stops once every handle to the store has
    /// been dropped.
    ///
    /// Returns `None` without spawning when the interval is zero; expired
    /// entries are then only dropped on lookup or by
    /// [`cleanup_expired`](Self::cleanup_expired).
    pub fn spawn_cleanup_task(&self) -> Option<JoinHandle<()>> {
        let period = self.config.cleanup_interval;
        if period.is_zero() {
            warn!("Cleanup interval is zero, not starting cleanup task");
            return None;
        }

        let weak: Weak<RwLock<StoreInner>> = Arc::downgrade(&self.inner);
        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // First tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(inner) = weak.upgrade() else {
                    trace!("Store dropped, stopping cleanup task");
                    break;
                };
                sweep(&inner).await;
            }
        }))
    }

    /// Get store statistics.
    pub async fn stats(&self) -> StoreStats {
        let inner = self.inner.read().await;
        StoreStats {
            size: inner.lru.len(),
            capacity: self.config.max_entries,
            ttl_tracked: inner.ttl.len(),
        }
    }
}

async fn sweep(inner: &RwLock<StoreInner>) -> usize {
    let mut inner = inner.write().await;
    let expired = inner.ttl.drain_expired();
    let count = expired.len();

    for key in expired {
        inner.lru.pop(&key);
    }

    if count > 0 {
        debug!(count = count, "Cleaned up expired entries");
    }

    count
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let key = self.namespaced(key);
        let mut inner = self.inner.write().await;

        if inner.ttl.is_expired(&key) {
            debug!(key = %key, "Entry expired, removing");
            inner.lru.pop(&key);
            inner.ttl.remove(&key);
            return Ok(None);
        }

        let value = inner.lru.get(&key).cloned();
        trace!(key = %key, hit = value.is_some(), "Store lookup");
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()> {
        let key = self.namespaced(key);
        let ttl = ttl.or(self.config.default_ttl);
        let mut inner = self.inner.write().await;

        // LRU handles eviction, but the TTL record has to go with it
        if !inner.lru.contains(&key)
            && inner.lru.len() >= self.config.max_entries
            && let Some((evicted, _)) = inner.lru.peek_lru()
        {
            let evicted = evicted.clone();
            debug!(key = %evicted, "Evicting LRU entry to make room");
            inner.ttl.remove(&evicted);
        }

        inner.lru.put(key.clone(), value);
        inner.ttl.set(&key, ttl);

        trace!(
            key = %key,
            ttl_ms = ttl.map(|t| t.as_millis() as u64),
            size = inner.lru.len(),
            "Entry stored"
        );

        Ok(())
    }
}

impl Clone for MemoryStore {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            namespace: self.namespace.clone(),
            config: self.config.clone(),
        }
    }
}

/// Store statistics.
#[derive(Debug, Clone)]
pub struct StoreStats {
    /// Current number of entries.
    pub size: usize,

    /// Maximum capacity.
    pub capacity: usize,

    /// Number of entries carrying an expiry deadline.
    pub ttl_tracked: usize,
}
