//! Browser transfer endpoint.
//!
//! Lets a page script read the session with a `<script src>` tag (GET) and
//! write it back (POST) without access to the http-only cookie's value.

use axum::{
    body::Body,
    http::{HeaderValue, header},
    response::Response,
};
use serde_json::Value;

use crate::error::{Result, SessionError};

const NO_CACHE: &str = "max-age=0, no-cache, no-store, must-revalidate";

fn with_no_cache(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(NO_CACHE));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("-1"));
    headers.insert(header::VARY, HeaderValue::from_static("*"));
    response
}

/// Script assigning the session payload to `window["<path>"]`.
///
/// Missing or unparseable payloads are sent as `{}`.
pub(crate) fn script_body(path: &str, data: Option<&str>) -> String {
    let data = data
        .filter(|raw| serde_json::from_str::<Value>(raw).is_ok())
        .unwrap_or("{}");
    // A JSON string literal is a valid JS string literal.
    let name = Value::String(path.to_string());
    format!("window[{}] = {};", name, data)
}

pub(crate) fn script_response(path: &str, data: Option<&str>) -> Response {
    let mut response = Response::new(Body::from(script_body(path, data)));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/javascript"),
    );
    with_no_cache(response)
}

pub(crate) fn ack_response() -> Response {
    let mut response = Response::new(Body::from("ok"));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    with_no_cache(response)
}

/// Response for methods the endpoint doesn't serve: 200, empty, uncacheable.
pub(crate) fn unhandled_response() -> Response {
    with_no_cache(Response::new(Body::empty()))
}

/// Validate a transfer POST body, returning the session id and the value to store.
pub(crate) fn parse_body(bytes: &[u8]) -> Result<(String, String)> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| SessionError::InvalidTransferBody(e.to_string()))?;

    let Value::Object(ref object) = value else {
        return Err(SessionError::InvalidTransferBody(
            "expected a JSON object".to_string(),
        ));
    };

    let id = match object.get("id") {
        Some(Value::String(id)) if !id.is_empty() => id.clone(),
        _ => return Err(SessionError::MissingTransferId),
    };

    Ok((id, serde_json::to_string(&value)?))
}
