//! Session lifecycle: load, attach, run the handler, save.

use std::future::Future;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderValue, Method, header},
    response::Response,
};
use chrono::{DateTime, Utc};
use cookie::Cookie;
use rill_session_store::{SessionStore, SharedStore};
use tracing::{debug, error, trace, warn};

use crate::config::SessionConfig;
use crate::cookies;
use crate::error::{HandleError, Result, SessionError};
use crate::session::{Session, SessionContext, SessionPayload};
use crate::transfer;

/// Owns the cache handle and configuration for one session key.
///
/// Cheap to clone; clones share the store.
#[derive(Clone)]
pub struct SessionManager {
    store: SharedStore,
    config: Arc<SessionConfig>,
    transfer_path: Arc<str>,
}

impl SessionManager {
    /// Create a manager persisting sessions into `store`.
    pub fn new(store: SharedStore, config: SessionConfig) -> Self {
        let transfer_path = config.transfer_path().into();
        Self {
            store,
            config: Arc::new(config),
            transfer_path,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Path of the browser transfer endpoint.
    pub fn transfer_path(&self) -> &str {
        &self.transfer_path
    }

    /// Whether `request` targets the transfer endpoint.
    pub fn is_transfer<B>(&self, request: &axum::http::Request<B>) -> bool {
        self.config.browser && request.uri().path() == &*self.transfer_path
    }

    /// Load the session for `token`, or start a new one.
    ///
    /// A missing or undecodable cache entry yields a fresh session; only
    /// store failures are errors.
    pub async fn load(&self, token: Option<&str>) -> Result<Session> {
        let Some(token) = token else {
            let session = Session::new();
            debug!(session_id = %session.id(), "No session cookie, starting new session");
            return Ok(session);
        };

        let Some(raw) = self.store.get(token).await? else {
            let session = Session::new();
            debug!(
                token = %token,
                session_id = %session.id(),
                "Session cache miss, starting new session"
            );
            return Ok(session);
        };

        match serde_json::from_str::<SessionPayload>(&raw) {
            Ok(payload) => {
                trace!(session_id = %payload.id, keys = payload.data.len(), "Session loaded");
                Ok(Session::from_payload(payload))
            }
            Err(e) => {
                let session = Session::new();
                warn!(
                    token = %token,
                    session_id = %session.id(),
                    error = %e,
                    "Discarding malformed session payload"
                );
                Ok(session)
            }
        }
    }

    /// Persist `session` if it is new, changed, or due for a refresh.
    ///
    /// `token` is the cookie value the request arrived with and
    /// `initial_modified` the session's `last_modified` before the handler
    /// ran. Returns the cookie to send when a write happened, `None` otherwise.
    pub async fn save(
        &self,
        session: &Session,
        token: Option<&str>,
        initial_modified: DateTime<Utc>,
        secure: bool,
    ) -> Result<Option<Cookie<'static>>> {
        let session_id = session.id();
        let now = Utc::now();

        let modified = session.last_modified() != initial_modified;
        let is_new = token != Some(session_id.as_str());
        let threshold = self.config.refresh_threshold();
        let needs_refresh = match session.last_refreshed_at() {
            None => true,
            Some(at) => {
                threshold.is_zero() || (now - at).to_std().is_ok_and(|elapsed| elapsed > threshold)
            }
        };

        if !(is_new || modified || needs_refresh) {
            trace!(session_id = %session_id, "Session unchanged, skipping save");
            return Ok(None);
        }

        session.mark_refreshed(now);
        let payload = session.serialize()?;
        self.store
            .set(&session_id, payload, self.config.ttl())
            .await?;

        debug!(
            session_id = %session_id,
            is_new,
            modified,
            needs_refresh,
            "Session saved"
        );

        Ok(Some(cookies::session_cookie(
            &self.config,
            &session_id,
            secure,
        )))
    }

    /// Serve a request to the transfer endpoint.
    pub async fn handle_transfer(&self, request: Request, token: Option<&str>) -> Result<Response> {
        match *request.method() {
            Method::GET => {
                let data = match token {
                    Some(token) => self.store.get(token).await?,
                    None => None,
                };
                trace!(found = data.is_some(), "Serving session transfer script");
                Ok(transfer::script_response(&self.transfer_path, data.as_deref()))
            }
            Method::POST => {
                let bytes = axum::body::to_bytes(request.into_body(), self.config.max_transfer_body)
                    .await
                    .map_err(|e| SessionError::BodyRead(e.to_string()))?;
                let (id, value) = transfer::parse_body(&bytes)?;
                self.store.set(&id, value, self.config.ttl()).await?;
                debug!(session_id = %id, "Session written by browser transfer");
                Ok(transfer::ack_response())
            }
            _ => Ok(transfer::unhandled_response()),
        }
    }

    /// Run the full session flow around `next`.
    ///
    /// The save step runs whether `next` succeeds or fails. A failure from
    /// `next` is returned as [`HandleError::Downstream`] after the save; if the
    /// save also failed, its error is logged and the downstream one wins.
    pub async fn handle<F, Fut, E>(
        &self,
        mut request: Request,
        next: F,
    ) -> std::result::Result<Response, HandleError<E>>
    where
        F: FnOnce(Request) -> Fut,
        Fut: Future<Output = std::result::Result<Response, E>>,
    {
        let token = cookies::read_token(request.headers(), &self.config.key);

        if self.is_transfer(&request) {
            return Ok(self.handle_transfer(request, token.as_deref()).await?);
        }

        let session = self.load(token.as_deref()).await?;
        let initial_modified = session.last_modified();
        let secure = cookies::is_secure(&request, self.config.trust_proxy);

        self.attach(&mut request, &session);

        let outcome = next(request).await;
        let saved = self
            .save(&session, token.as_deref(), initial_modified, secure)
            .await;

        match outcome {
            Ok(mut response) => {
                self.apply_preload(&mut response)?;
                if let Some(cookie) = saved? {
                    let value = HeaderValue::from_str(&cookie.encoded().to_string())
                        .map_err(SessionError::from)?;
                    response.headers_mut().append(header::SET_COOKIE, value);
                }
                Ok(response)
            }
            Err(err) => {
                if let Err(save_err) = saved {
                    error!(
                        session_id = %session.id(),
                        error = %save_err,
                        "Failed to save session after handler error"
                    );
                }
                Err(HandleError::Downstream(err))
            }
        }
    }

    fn attach(&self, request: &mut axum::http::Request<Body>, session: &Session) {
        let extensions = request.extensions_mut();
        let mut context = extensions
            .get::<SessionContext>()
            .cloned()
            .unwrap_or_default();
        context.insert(&self.config.context_property, session.clone());
        extensions.insert(context);
        extensions.insert(session.clone());
    }

    /// Advertise the transfer script on HTML responses.
    fn apply_preload(&self, response: &mut Response) -> Result<()> {
        if !self.config.preload {
            return Ok(());
        }

        let is_html = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.trim_start().to_ascii_lowercase().starts_with("text/html"));

        if is_html {
            let link = format!("<{}>; rel=preload; as=script;", self.transfer_path);
            response
                .headers_mut()
                .append(header::LINK, HeaderValue::from_str(&link)?);
        }

        Ok(())
    }
}
