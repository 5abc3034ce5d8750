//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
    middleware,
    response::Html,
    routing::get,
};
use cookie::Cookie;
use parking_lot::Mutex;
use rill_session::{
    MemoryStore, Session, SessionConfig, SessionManager, SessionStore, StoreConfig, StoreError,
    session_middleware,
};

/// Store that records every write and can be told to fail.
pub struct RecordingStore {
    inner: MemoryStore,
    writes: Mutex<Vec<(String, String, Option<Duration>)>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl RecordingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryStore::new("test", StoreConfig::new()),
            writes: Mutex::new(Vec::new()),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        })
    }

    /// Keys written so far, in order.
    pub fn written_keys(&self) -> Vec<String> {
        self.writes.lock().iter().map(|(k, _, _)| k.clone()).collect()
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().len()
    }

    pub fn last_ttl(&self) -> Option<Duration> {
        self.writes.lock().last().and_then(|(_, _, ttl)| *ttl)
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Write directly, bypassing the recorder.
    pub async fn seed(&self, key: &str, value: &str) {
        self.inner.set(key, value.to_string(), None).await.unwrap();
    }

    pub async fn raw(&self, key: &str) -> Option<String> {
        self.inner.get(key).await.unwrap()
    }
}

#[async_trait]
impl SessionStore for RecordingStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("reads disabled".to_string()));
        }
        self.inner.get(key).await
    }

    async fn set(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        self.writes
            .lock()
            .push((key.to_string(), value.clone(), ttl));
        self.inner.set(key, value, ttl).await
    }
}

/// Router with a handful of session-aware handlers behind the middleware.
pub fn app(store: Arc<RecordingStore>, config: SessionConfig) -> Router {
    let manager = SessionManager::new(store, config);

    Router::new()
        .route("/set", get(set_foo))
        .route("/read", get(read_foo))
        .route("/noop", get(noop))
        .route("/page", get(page))
        .route("/__rill_session__", get(read_foo))
        .layer(middleware::from_fn_with_state(manager, session_middleware))
}

async fn set_foo(session: Session) -> &'static str {
    session.set("foo", "bar").unwrap();
    "set"
}

async fn read_foo(session: Session) -> String {
    session.get::<String>("foo").unwrap_or_default()
}

async fn noop() -> &'static str {
    "noop"
}

async fn page() -> Html<&'static str> {
    Html("<html><body>hi</body></html>")
}

pub fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(value) = cookie {
        builder = builder.header(header::COOKIE, format!("rill_session={}", value));
    }
    builder.body(Body::empty()).unwrap()
}

/// The session cookie set by a response, if any.
pub fn session_cookie(response: &Response<Body>) -> Option<Cookie<'static>> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| Cookie::parse_encoded(value.to_string()).ok())
        .find(|cookie| cookie.name() == "rill_session")
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
