//! Axum middleware function.
//!
//! For routers where handlers already turn their failures into responses:
//!
//! ```ignore
//! let manager = SessionManager::new(store, SessionConfig::default());
//! let app = Router::new()
//!     .route("/", get(handler))
//!     .layer(middleware::from_fn_with_state(manager, session_middleware));
//! ```

use std::convert::Infallible;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::{HandleError, SessionError};
use crate::manager::SessionManager;

/// Session middleware for `axum::middleware::from_fn_with_state`.
pub async fn session_middleware(
    State(manager): State<SessionManager>,
    request: Request,
    next: Next,
) -> Result<Response, SessionError> {
    manager
        .handle(request, |request| async move {
            Ok::<_, Infallible>(next.run(request).await)
        })
        .await
        .map_err(|e| match e {
            HandleError::Session(e) => e,
            HandleError::Downstream(never) => match never {},
        })
}
