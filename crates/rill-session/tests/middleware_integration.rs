//! Middleware integration tests.
//!
//! These drive an axum router through the session middleware and check the
//! cookie and cache traffic each request produces.

mod common;

use std::time::Duration;

use anyhow::Result;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
    middleware,
    routing::get,
};
use common::{RecordingStore, app, body_string, get_request, session_cookie};
use rill_session::{
    Session, SessionConfig, SessionContext, SessionManager, SessionPayload, session_middleware,
};
use tower::ServiceExt;

// ─────────────────────────────────────────────────────────────────────────────
// Cookie issuance and persistence
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_new_client_gets_fresh_session_cookie() -> Result<()> {
    let store = RecordingStore::new();
    let app = app(store.clone(), SessionConfig::default());

    let first = app.clone().oneshot(get_request("/noop", None)).await?;
    let second = app.clone().oneshot(get_request("/noop", None)).await?;

    let first_id = session_cookie(&first).expect("first cookie").value().to_string();
    let second_id = session_cookie(&second).expect("second cookie").value().to_string();

    assert!(!first_id.is_empty());
    assert_ne!(first_id, second_id);
    assert_eq!(store.written_keys(), vec![first_id, second_id]);

    Ok(())
}

#[tokio::test]
async fn test_cookie_attributes() -> Result<()> {
    let store = RecordingStore::new();
    let config = SessionConfig::default()
        .with_ttl(Duration::from_millis(3_600_999))
        .with_trust_proxy(true);
    let app = app(store.clone(), config);

    let request = Request::builder()
        .uri("/noop")
        .header("X-Forwarded-Proto", "https")
        .body(Body::empty())?;
    let response = app.oneshot(request).await?;
    let cookie = session_cookie(&response).expect("cookie");

    assert_eq!(cookie.path(), Some("/"));
    assert_eq!(cookie.http_only(), Some(true));
    assert_eq!(cookie.secure(), Some(true));
    assert_eq!(cookie.max_age(), Some(cookie::time::Duration::seconds(3600)));
    assert_eq!(store.last_ttl(), Some(Duration::from_millis(3_600_999)));

    Ok(())
}

#[tokio::test]
async fn test_plain_http_cookie_is_not_secure() -> Result<()> {
    let store = RecordingStore::new();
    let app = app(store, SessionConfig::default());

    let request = Request::builder()
        .uri("/noop")
        .header("X-Forwarded-Proto", "https")
        .body(Body::empty())?;
    let response = app.oneshot(request).await?;
    let cookie = session_cookie(&response).expect("cookie");

    assert_ne!(cookie.secure(), Some(true));
    assert_eq!(cookie.max_age(), None);

    Ok(())
}

#[tokio::test]
async fn test_session_data_survives_between_requests() -> Result<()> {
    let store = RecordingStore::new();
    let app = app(store.clone(), SessionConfig::default());

    let response = app.clone().oneshot(get_request("/set", None)).await?;
    let id = session_cookie(&response).expect("cookie").value().to_string();
    assert_eq!(store.write_count(), 1);

    let response = app.clone().oneshot(get_request("/read", Some(&id))).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(session_cookie(&response).is_none());
    assert_eq!(body_string(response).await, "bar");

    Ok(())
}

#[tokio::test]
async fn test_unchanged_session_is_not_rewritten() -> Result<()> {
    let store = RecordingStore::new();
    let app = app(store.clone(), SessionConfig::default());

    let response = app.clone().oneshot(get_request("/noop", None)).await?;
    let id = session_cookie(&response).expect("cookie").value().to_string();

    for _ in 0..3 {
        let response = app.clone().oneshot(get_request("/noop", Some(&id))).await?;
        assert!(session_cookie(&response).is_none());
    }

    assert_eq!(store.write_count(), 1);

    Ok(())
}

#[tokio::test]
async fn test_modified_session_is_rewritten() -> Result<()> {
    let store = RecordingStore::new();
    let app = app(store.clone(), SessionConfig::default());

    let response = app.clone().oneshot(get_request("/noop", None)).await?;
    let id = session_cookie(&response).expect("cookie").value().to_string();

    let response = app.clone().oneshot(get_request("/set", Some(&id))).await?;
    let cookie = session_cookie(&response).expect("cookie after change");

    assert_eq!(cookie.value(), id);
    assert_eq!(store.written_keys(), vec![id.clone(), id]);

    Ok(())
}

#[tokio::test]
async fn test_zero_refresh_threshold_rewrites_every_request() -> Result<()> {
    let store = RecordingStore::new();
    let config = SessionConfig::default().with_refresh_threshold(Duration::ZERO);
    let app = app(store.clone(), config);

    let response = app.clone().oneshot(get_request("/noop", None)).await?;
    let id = session_cookie(&response).expect("cookie").value().to_string();

    for _ in 0..3 {
        let response = app.clone().oneshot(get_request("/noop", Some(&id))).await?;
        assert_eq!(
            session_cookie(&response).map(|c| c.value().to_string()),
            Some(id.clone())
        );
    }

    assert_eq!(store.write_count(), 4);

    Ok(())
}

#[tokio::test]
async fn test_unknown_token_is_replaced() -> Result<()> {
    let store = RecordingStore::new();
    let app = app(store.clone(), SessionConfig::default());

    let response = app.oneshot(get_request("/read", Some("expired-token"))).await?;
    let cookie = session_cookie(&response).expect("replacement cookie");

    assert_ne!(cookie.value(), "expired-token");
    assert_eq!(body_string(response).await, "");

    Ok(())
}

#[tokio::test]
async fn test_malformed_payload_starts_fresh_session() -> Result<()> {
    let store = RecordingStore::new();
    store.seed("corrupt", "{\"id\": \"corrupt\", \"data\": [").await;
    let app = app(store.clone(), SessionConfig::default());

    let response = app.oneshot(get_request("/read", Some("corrupt"))).await?;

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = session_cookie(&response).expect("replacement cookie");
    assert_ne!(cookie.value(), "corrupt");

    Ok(())
}

#[tokio::test]
async fn test_store_read_failure_fails_request() -> Result<()> {
    let store = RecordingStore::new();
    store.fail_reads(true);
    let app = app(store.clone(), SessionConfig::default());

    let response = app.oneshot(get_request("/noop", Some("some-token"))).await?;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(session_cookie(&response).is_none());

    Ok(())
}

#[tokio::test]
async fn test_store_write_failure_fails_request() -> Result<()> {
    let store = RecordingStore::new();
    store.fail_writes(true);
    let app = app(store.clone(), SessionConfig::default());

    let response = app.oneshot(get_request("/set", None)).await?;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = serde_json::from_str(&body_string(response).await)?;
    assert_eq!(body["code"], "store_error");

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Preload header
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_html_response_gets_preload_link() -> Result<()> {
    let store = RecordingStore::new();
    let app = app(store, SessionConfig::default());

    let response = app.clone().oneshot(get_request("/page", None)).await?;
    assert_eq!(
        response.headers()[header::LINK],
        "</__rill_session__>; rel=preload; as=script;"
    );

    let response = app.oneshot(get_request("/noop", None)).await?;
    assert!(response.headers().get(header::LINK).is_none());

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Transfer endpoint
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_transfer_get_serves_stored_session() -> Result<()> {
    let store = RecordingStore::new();
    let app = app(store.clone(), SessionConfig::default());

    let response = app.clone().oneshot(get_request("/set", None)).await?;
    let id = session_cookie(&response).expect("cookie").value().to_string();
    let stored = store.raw(&id).await.expect("stored payload");

    let response = app
        .clone()
        .oneshot(get_request("/__rill_session__", Some(&id)))
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::CONTENT_TYPE], "application/javascript");
    assert_eq!(
        headers[header::CACHE_CONTROL],
        "max-age=0, no-cache, no-store, must-revalidate"
    );
    assert_eq!(headers[header::PRAGMA], "no-cache");
    assert_eq!(headers[header::EXPIRES], "-1");
    assert_eq!(headers[header::VARY], "*");
    assert!(session_cookie(&response).is_none());

    let body = body_string(response).await;
    assert_eq!(body, format!("window[\"/__rill_session__\"] = {};", stored));

    let payload: SessionPayload = serde_json::from_str(&stored)?;
    assert_eq!(payload.data["foo"], "bar");

    // Serving the script is read-only
    assert_eq!(store.write_count(), 1);

    Ok(())
}

#[tokio::test]
async fn test_transfer_get_without_session_is_empty_object() -> Result<()> {
    let store = RecordingStore::new();
    let app = app(store.clone(), SessionConfig::default());

    let response = app.oneshot(get_request("/__rill_session__", None)).await?;

    assert_eq!(body_string(response).await, "window[\"/__rill_session__\"] = {};");
    assert_eq!(store.write_count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_transfer_get_store_read_failure_fails_request() -> Result<()> {
    let store = RecordingStore::new();
    store.fail_reads(true);
    let app = app(store.clone(), SessionConfig::default());

    let response = app
        .oneshot(get_request("/__rill_session__", Some("some-token")))
        .await?;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(session_cookie(&response).is_none());
    let body: serde_json::Value = serde_json::from_str(&body_string(response).await)?;
    assert_eq!(body["code"], "store_error");
    assert_eq!(store.write_count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_transfer_post_writes_session() -> Result<()> {
    let store = RecordingStore::new();
    let app = app(store.clone(), SessionConfig::default());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/__rill_session__")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"id":"browser-1","data":{"foo":"from-browser"}}"#))?;
    let response = app.clone().oneshot(request).await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ok");
    assert_eq!(store.written_keys(), vec!["browser-1".to_string()]);

    let response = app.oneshot(get_request("/read", Some("browser-1"))).await?;
    assert_eq!(body_string(response).await, "from-browser");

    Ok(())
}

#[tokio::test]
async fn test_transfer_post_without_id_is_rejected() -> Result<()> {
    let store = RecordingStore::new();
    let app = app(store.clone(), SessionConfig::default());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/__rill_session__")
        .body(Body::from(r#"{"data":{"foo":"bar"}}"#))?;
    let response = app.oneshot(request).await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(store.write_count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_transfer_post_malformed_body_is_rejected() -> Result<()> {
    let store = RecordingStore::new();
    let app = app(store.clone(), SessionConfig::default());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/__rill_session__")
        .body(Body::from("id=abc"))?;
    let response = app.oneshot(request).await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(store.write_count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_transfer_post_over_limit_is_rejected() -> Result<()> {
    let store = RecordingStore::new();
    let app = app(store.clone(), SessionConfig::default().with_max_transfer_body(16));

    let request = Request::builder()
        .method(Method::POST)
        .uri("/__rill_session__")
        .body(Body::from(r#"{"id":"abc","data":{"padding":"xxxxxxxxxxxx"}}"#))?;
    let response = app.oneshot(request).await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(store.write_count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_transfer_other_methods_do_nothing() -> Result<()> {
    let store = RecordingStore::new();
    let app = app(store.clone(), SessionConfig::default());

    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/__rill_session__")
        .header(header::COOKIE, "rill_session=abc")
        .body(Body::empty())?;
    let response = app.oneshot(request).await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CACHE_CONTROL],
        "max-age=0, no-cache, no-store, must-revalidate"
    );
    assert!(session_cookie(&response).is_none());
    assert_eq!(store.write_count(), 0);
    assert_eq!(body_string(response).await, "");

    Ok(())
}

#[tokio::test]
async fn test_disabled_browser_transfer_falls_through() -> Result<()> {
    let store = RecordingStore::new();
    let app = app(store.clone(), SessionConfig::default().with_browser(false));

    let response = app.clone().oneshot(get_request("/set", None)).await?;
    let id = session_cookie(&response).expect("cookie").value().to_string();

    // The route behind the reserved path now sees the session like any other
    let response = app.oneshot(get_request("/__rill_session__", Some(&id))).await?;
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );
    assert_eq!(body_string(response).await, "bar");

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Request context
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_session_registered_under_context_property() -> Result<()> {
    async fn handler(ctx: SessionContext, session: Session) -> String {
        let named = ctx.get("visitor").expect("named session");
        assert_eq!(named.id(), session.id());
        assert!(ctx.get("session").is_none());
        "ok".to_string()
    }

    let store = RecordingStore::new();
    let manager = SessionManager::new(
        store,
        SessionConfig::default().with_context_property("visitor"),
    );
    let app = Router::new()
        .route("/", get(handler))
        .layer(middleware::from_fn_with_state(manager, session_middleware));

    let response = app.oneshot(get_request("/", None)).await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ok");

    Ok(())
}

#[tokio::test]
async fn test_missing_middleware_rejects_extractor() -> Result<()> {
    async fn handler(session: Session) -> String {
        session.id()
    }

    let app = Router::new().route("/", get(handler));
    let response = app.oneshot(get_request("/", None)).await?;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    Ok(())
}
