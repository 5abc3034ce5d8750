//! The per-client session object.
//!
//! A [`Session`] is a cheap, clonable handle: the middleware keeps one copy to
//! decide what to persist after the handler runs, the handler gets another
//! through request extensions. Both see the same data.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
};
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use uuid::Uuid;

// ─────────────────────────────────────────────────────────────────────────────
// Payload
// ─────────────────────────────────────────────────────────────────────────────

/// Serialized form of a session, as stored in the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPayload {
    /// Session identifier; also the cache key and cookie value.
    pub id: String,

    /// Free-form session data.
    #[serde(default)]
    pub data: Map<String, Value>,

    /// When the data last changed.
    #[serde(default = "Utc::now")]
    pub last_modified: DateTime<Utc>,

    /// When the session was last written to the cache.
    #[serde(default)]
    pub last_refreshed_at: Option<DateTime<Utc>>,
}

impl SessionPayload {
    fn fresh() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            data: Map::new(),
            last_modified: Utc::now(),
            last_refreshed_at: None,
        }
    }

    fn touch(&mut self) {
        let now = Utc::now();
        // Strictly increasing, so a change within one clock tick still registers.
        self.last_modified = if now > self.last_modified {
            now
        } else {
            self.last_modified + TimeDelta::nanoseconds(1)
        };
    }
}

impl Default for SessionPayload {
    fn default() -> Self {
        Self::fresh()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// Per-client session state.
///
/// Every mutation updates [`last_modified`](Self::last_modified). The id never
/// changes for the lifetime of the handle.
///
/// ```ignore
/// async fn handler(session: Session) -> String {
///     let visits: u64 = session.get("visits").unwrap_or(0);
///     session.set("visits", visits + 1)?;
///     format!("visit #{}", visits + 1)
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Session {
    inner: Arc<Mutex<SessionPayload>>,
}

impl Session {
    /// Create an empty session with a newly generated id.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a session from its stored payload, keeping its id.
    pub fn from_payload(payload: SessionPayload) -> Self {
        Self {
            inner: Arc::new(Mutex::new(payload)),
        }
    }

    /// The session id.
    pub fn id(&self) -> String {
        self.inner.lock().id.clone()
    }

    /// Get a value, decoded into `T`.
    ///
    /// Returns `None` if the key is absent or holds a value of another shape.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_value(key)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    /// Get the raw JSON value stored under `key`.
    pub fn get_value(&self, key: &str) -> Option<Value> {
        self.inner.lock().data.get(key).cloned()
    }

    /// Store a value under `key`.
    pub fn set<T: Serialize>(&self, key: impl Into<String>, value: T) -> serde_json::Result<()> {
        let value = serde_json::to_value(value)?;
        let mut inner = self.inner.lock();
        inner.data.insert(key.into(), value);
        inner.touch();
        Ok(())
    }

    /// Remove `key`, returning its previous value.
    pub fn remove(&self, key: &str) -> Option<Value> {
        let mut inner = self.inner.lock();
        let removed = inner.data.remove(key);
        if removed.is_some() {
            inner.touch();
        }
        removed
    }

    /// Check if `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().data.contains_key(key)
    }

    /// All keys currently set.
    pub fn keys(&self) -> Vec<String> {
        self.inner.lock().data.keys().cloned().collect()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.inner.lock().data.len()
    }

    /// Check if no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().data.is_empty()
    }

    /// Remove every key.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        if !inner.data.is_empty() {
            inner.data.clear();
            inner.touch();
        }
    }

    /// Mark the session as modified without changing its data.
    pub fn touch(&self) {
        self.inner.lock().touch();
    }

    /// When the data last changed.
    pub fn last_modified(&self) -> DateTime<Utc> {
        self.inner.lock().last_modified
    }

    /// When the session was last written to the cache, if ever.
    pub fn last_refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().last_refreshed_at
    }

    pub(crate) fn mark_refreshed(&self, at: DateTime<Utc>) {
        self.inner.lock().last_refreshed_at = Some(at);
    }

    /// Snapshot of the session's current state.
    pub fn payload(&self) -> SessionPayload {
        self.inner.lock().clone()
    }

    /// Encode the session for storage.
    pub fn serialize(&self) -> serde_json::Result<String> {
        serde_json::to_string(&*self.inner.lock())
    }
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Session>().cloned().ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            "Session middleware is not installed",
        ))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Request context
// ─────────────────────────────────────────────────────────────────────────────

/// Sessions attached to a request, by context property name.
///
/// Lets several session middlewares with different keys coexist on one
/// router; with a single middleware, extracting [`Session`] directly is simpler.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    sessions: HashMap<String, Session>,
}

impl SessionContext {
    /// Get the session registered under `name`.
    pub fn get(&self, name: &str) -> Option<&Session> {
        self.sessions.get(name)
    }

    pub(crate) fn insert(&mut self, name: &str, session: Session) {
        self.sessions.insert(name.to_string(), session);
    }
}

impl<S> FromRequestParts<S> for SessionContext
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<SessionContext>().cloned().ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            "Session middleware is not installed",
        ))
    }
}
