//! Cache backends for session payloads.
//!
//! This crate provides the storage seam used by the session middleware:
//! - [`SessionStore`], an async key-value contract with per-entry TTL
//! - [`MemoryStore`], an in-process backend with LRU bounding and expiry
//! - Key namespacing so several applications can share one backend
//!
//! # Example
//!
//! ```rust,ignore
//! use rill_session_store::{MemoryStore, SessionStore, StoreConfig};
//!
//! let config = StoreConfig::default()
//!     .with_max_entries(1000)
//!     .with_default_ttl(Duration::from_secs(3600));
//!
//! let store = MemoryStore::new("rill_session", config);
//! store.set("abc", "{}".to_string(), None).await?;
//! ```

mod config;
mod error;
mod memory;
mod store;
mod ttl;

pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use memory::{MemoryStore, StoreStats};
pub use store::{SessionStore, SharedStore};
pub use ttl::TtlTracker;
