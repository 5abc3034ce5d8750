//! Tower Layer and Service for session handling.
//!
//! Use this form when the inner service can fail and its error must reach the
//! caller unchanged:
//!
//! ```rust,ignore
//! use tower::ServiceBuilder;
//! use rill_session::SessionLayer;
//!
//! let service = ServiceBuilder::new()
//!     .layer(SessionLayer::new(store, SessionConfig::default()))
//!     .service(my_http_handler);
//! ```
//!
//! Errors are reported as [`tower::BoxError`]. A downstream failure comes back
//! as the very error the inner service returned (downcast it to recover the
//! concrete type); the middleware's own failures are boxed [`SessionError`](crate::SessionError)s.

use std::task::{Context, Poll};

use axum::{extract::Request, response::Response};
use futures::future::BoxFuture;
use rill_session_store::SharedStore;
use tower::{BoxError, Layer, Service};

use crate::config::SessionConfig;
use crate::manager::SessionManager;

/// Tower Layer that loads and persists sessions around the inner service.
#[derive(Clone)]
pub struct SessionLayer {
    manager: SessionManager,
}

impl SessionLayer {
    /// Create a layer persisting into `store`.
    pub fn new(store: SharedStore, config: SessionConfig) -> Self {
        Self {
            manager: SessionManager::new(store, config),
        }
    }

    /// Create a layer from an existing manager.
    pub fn from_manager(manager: SessionManager) -> Self {
        Self { manager }
    }

    /// Get the underlying manager.
    pub fn manager(&self) -> &SessionManager {
        &self.manager
    }
}

impl<S> Layer<S> for SessionLayer {
    type Service = SessionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SessionService {
            inner,
            manager: self.manager.clone(),
        }
    }
}

/// Tower Service produced by [`SessionLayer`].
#[derive(Clone)]
pub struct SessionService<S> {
    inner: S,
    manager: SessionManager,
}

impl<S> SessionService<S> {
    /// Get a reference to the inner service.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S> Service<Request> for SessionService<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: Into<BoxError> + Send,
{
    type Response = Response;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        // The clone may not be ready; keep the one that was polled.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let manager = self.manager.clone();

        Box::pin(async move {
            manager
                .handle(request, move |request| inner.call(request))
                .await
                .map_err(|e| e.into_boxed())
        })
    }
}
