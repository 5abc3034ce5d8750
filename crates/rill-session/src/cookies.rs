//! Session cookie parsing and issuance.

use axum::http::{HeaderMap, Request, header::COOKIE};
use cookie::Cookie;

use crate::config::SessionConfig;

/// Header set by TLS-terminating proxies.
pub const FORWARDED_PROTO_HEADER: &str = "x-forwarded-proto";

/// Read the session token from the request's `Cookie` headers.
///
/// Empty values count as absent.
pub(crate) fn read_token(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse_encoded)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name && !cookie.value().is_empty())
        .map(|cookie| cookie.value().to_string())
}

/// Whether the request arrived over a secure transport.
pub(crate) fn is_secure<B>(request: &Request<B>, trust_proxy: bool) -> bool {
    if request.uri().scheme_str() == Some("https") {
        return true;
    }

    trust_proxy
        && request
            .headers()
            .get(FORWARDED_PROTO_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"))
}

/// Build the cookie carrying `session_id`.
pub(crate) fn session_cookie(config: &SessionConfig, session_id: &str, secure: bool) -> Cookie<'static> {
    let mut builder = Cookie::build((config.key.clone(), session_id.to_string()))
        .path("/")
        .http_only(true)
        .secure(secure);

    if let Some(seconds) = config.cookie_max_age() {
        builder = builder.max_age(cookie::time::Duration::seconds(seconds));
    }

    builder.build()
}
