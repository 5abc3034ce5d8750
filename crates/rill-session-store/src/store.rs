//! The cache backend contract.
//!
//! The middleware only ever needs two operations: fetch a serialized payload
//! by key, and write one with an optional lifetime. A miss is `Ok(None)`,
//! never an error; errors are reserved for backend failures.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// Async key-value cache holding serialized session payloads.
///
/// Implementations must be safe for concurrent access to independent keys.
/// No coordination between writers of the same key is expected; the last
/// write wins.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch the value stored under `key`.
    ///
    /// Returns `Ok(None)` when the key is absent or its entry has expired.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`.
    ///
    /// `ttl` bounds how long the entry stays retrievable. `None` defers to the
    /// backend's own default.
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()>;
}

/// Shared, type-erased store handle.
pub type SharedStore = Arc<dyn SessionStore>;

