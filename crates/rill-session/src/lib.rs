//! Cookie-keyed session middleware for axum and tower.
//!
//! This crate loads a per-client [`Session`] at the start of each request,
//! hands it to the handler through request extensions, and persists it to a
//! [`SessionStore`] afterwards when it is new, changed, or due for a refresh.
//!
//! # Features
//!
//! - Session id carried in an http-only cookie
//! - Pluggable async cache backend with per-entry TTL
//! - Save step that still runs when the handler fails
//! - Browser transfer endpoint (`/__<key>__`) serving the session as a script
//!   and accepting writes back
//! - Preload `Link` header on HTML responses
//!
//! # Example
//!
//! ```ignore
//! use rill_session::{Session, SessionConfig, SessionManager, session_middleware};
//!
//! let config = SessionConfig::default().with_ttl(Duration::from_secs(86400));
//! let store = Arc::new(config.cache.build_store(&config.key));
//! let manager = SessionManager::new(store, config);
//!
//! let app = Router::new()
//!     .route("/", get(|session: Session| async move {
//!         session.set("seen", true).ok();
//!         "hello"
//!     }))
//!     .layer(middleware::from_fn_with_state(manager, session_middleware));
//! ```

pub mod config;
mod cookies;
pub mod error;
pub mod layer;
pub mod manager;
pub mod middleware;
pub mod session;
mod transfer;

pub use config::{CacheSection, SessionConfig};
pub use cookies::FORWARDED_PROTO_HEADER;
pub use error::{ConfigError, HandleError, Result, SessionError};
pub use layer::{SessionLayer, SessionService};
pub use manager::SessionManager;
pub use middleware::session_middleware;
pub use session::{Session, SessionContext, SessionPayload};

pub use rill_session_store::{
    MemoryStore, SessionStore, SharedStore, StoreConfig, StoreError,
};
