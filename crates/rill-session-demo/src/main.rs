//! rill-session demo server.
//!
//! Serves a page that counts visits in the session and reads the same
//! session back through the browser transfer script.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Json, Router, middleware,
    response::{Html, IntoResponse},
    routing::get,
};
use clap::Parser;
use rill_session::{Session, SessionConfig, SessionManager, session_middleware};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// rill-session demo server
#[derive(Parser)]
#[command(name = "rill-session-demo")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a TOML session config
    #[arg(short, long, env = "RILL_SESSION_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1:3000")]
    bind: SocketAddr,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "rill_session=debug,rill_session_store=debug,rill_session_demo=debug,tower_http=debug,info"
    } else {
        "rill_session=info,rill_session_demo=info,warn"
    };

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let config = match &cli.config {
        Some(path) => SessionConfig::load(path)
            .with_context(|| format!("loading session config from {}", path.display()))?,
        None => SessionConfig::default(),
    };

    let store = config.cache.build_store(&config.key);
    let _cleanup = store.spawn_cleanup_task();
    let manager = SessionManager::new(Arc::new(store), config);

    info!(
        key = %manager.config().key,
        transfer_path = %manager.transfer_path(),
        "Session middleware configured"
    );

    let app = router(manager);

    let listener = TcpListener::bind(cli.bind)
        .await
        .with_context(|| format!("binding {}", cli.bind))?;
    info!("Listening on http://{}", cli.bind);

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

fn router(manager: SessionManager) -> Router {
    let transfer_path = manager.transfer_path().to_string();

    Router::new()
        .route("/", get(move |session| index(session, transfer_path)))
        .route("/visits", get(visits))
        .layer(middleware::from_fn_with_state(manager, session_middleware))
        .layer(TraceLayer::new_for_http())
}

async fn index(session: Session, transfer_path: String) -> impl IntoResponse {
    let count = bump_visits(&session);
    // The transfer script is preloaded via the Link header set by the middleware.
    Html(format!(
        r#"<!doctype html>
<html>
  <body>
    <p>Visit #{count} (session {id})</p>
    <pre id="session"></pre>
    <script src="{path}"></script>
    <script>
      document.getElementById("session").textContent =
        JSON.stringify(window["{path}"], null, 2);
    </script>
  </body>
</html>"#,
        count = count,
        id = session.id(),
        path = transfer_path,
    ))
}

async fn visits(session: Session) -> Json<serde_json::Value> {
    let count = bump_visits(&session);
    Json(json!({ "session": session.id(), "visits": count }))
}

fn bump_visits(session: &Session) -> u64 {
    let count = session.get::<u64>("visits").unwrap_or(0) + 1;
    if let Err(e) = session.set("visits", count) {
        tracing::warn!(error = %e, "Failed to record visit");
    }
    count
}
