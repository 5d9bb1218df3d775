//! HTTP server for development.
//!
//! Serves the intermediate, source and public directories (first match wins)
//! behind configurable route rewrites, injects the live-reload client into
//! HTML pages and pushes reload events over a websocket.

use super::reload::{
    CLIENT_SCRIPT_PATH, LIVERELOAD_PATH, ReloadEvent, ReloadHub, client_script, client_snippet,
    inject_snippet,
};
use crate::config::Config;
use crate::paths::ProjectPaths;
use anyhow::bail;
use axum::{
    Router,
    body::Body,
    extract::{
        Request, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{
        StatusCode,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE},
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Largest HTML page the client snippet is injected into.
const MAX_INJECT_BYTES: usize = 16 * 1024 * 1024;

/// Everything the dev server needs to know.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub port: u16,
    /// Roots searched in order: intermediate, source, public.
    pub roots: [PathBuf; 3],
    /// URL prefix to directory rewrites, served ahead of the roots.
    pub routes: Vec<(String, PathBuf)>,
    /// Show an in-page banner on updates.
    pub notify: bool,
}

impl ServerOptions {
    pub fn new(config: &Config, paths: &ProjectPaths) -> Self {
        Self {
            port: config.port,
            roots: [
                paths.temp().to_path_buf(),
                paths.src().to_path_buf(),
                paths.public().to_path_buf(),
            ],
            routes: config
                .server
                .routes
                .iter()
                .map(|(prefix, dir)| (prefix.clone(), paths.join(dir)))
                .collect(),
            notify: config.server.notify,
        }
    }
}

#[derive(Clone)]
struct DevState {
    hub: ReloadHub,
    script: Arc<str>,
    snippet: Arc<str>,
}

/// Build the dev server router.
pub fn build_router(options: &ServerOptions, hub: ReloadHub) -> anyhow::Result<Router> {
    let state = DevState {
        hub,
        script: client_script(options.notify).into(),
        snippet: client_snippet().into(),
    };

    let [temp, src, public] = &options.roots;
    let files = ServeDir::new(temp).fallback(ServeDir::new(src).fallback(ServeDir::new(public)));

    let mut router = Router::new()
        .route(LIVERELOAD_PATH, get(livereload))
        .route(CLIENT_SCRIPT_PATH, get(client));

    let mut mounted = HashSet::new();
    for (prefix, dir) in &options.routes {
        let mount = prefix.trim_end_matches('/');
        if !mount.starts_with('/') || mount.len() < 2 || mount.contains(['{', '}', '*']) {
            bail!("invalid server route '{}': expected a path such as /node_modules", prefix);
        }
        if !mounted.insert(mount.to_string()) {
            bail!("server route '{}' is configured twice", mount);
        }
        debug!("Route {} -> {}", mount, dir.display());
        router = router.nest_service(mount, ServeDir::new(dir));
    }

    Ok(router
        .fallback_service(files)
        .layer(middleware::from_fn_with_state(state.clone(), inject_client))
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// Start the dev server on `127.0.0.1:<port>` (port 0 picks a free one).
///
/// Dropping or firing the returned sender shuts the server down.
pub async fn start_server(
    options: &ServerOptions,
    hub: ReloadHub,
) -> anyhow::Result<(oneshot::Sender<()>, SocketAddr)> {
    let app = build_router(options, hub)?;

    let addr = SocketAddr::from(([127, 0, 0, 1], options.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    info!("Dev server listening on http://{}", bound_addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("Dev server shutting down");
            })
            .await
        {
            tracing::error!("Dev server error: {}", e);
        }
    });

    Ok((shutdown_tx, bound_addr))
}

async fn client(State(state): State<DevState>) -> impl IntoResponse {
    (
        [
            (CONTENT_TYPE, "application/javascript; charset=utf-8"),
            (CACHE_CONTROL, "no-cache"),
        ],
        state.script.to_string(),
    )
}

async fn livereload(ws: WebSocketUpgrade, State(state): State<DevState>) -> impl IntoResponse {
    let events = state.hub.subscribe();
    ws.on_upgrade(move |socket| reload_session(socket, events))
}

async fn reload_session(mut socket: WebSocket, mut events: broadcast::Receiver<ReloadEvent>) {
    debug!("Live-reload client connected");
    loop {
        tokio::select! {
            event = events.recv() => {
                let event = match event {
                    Ok(event) => event,
                    // Missed events cannot be replayed; a full reload catches up
                    Err(broadcast::error::RecvError::Lagged(_)) => ReloadEvent::Reload,
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                let Ok(json) = serde_json::to_string(&event) else {
                    continue;
                };
                if socket.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
            message = socket.recv() => match message {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    debug!("Live-reload client disconnected");
}

/// Insert the client snippet into successful HTML responses.
async fn inject_client(State(state): State<DevState>, request: Request, next: Next) -> Response {
    let response = next.run(request).await;

    let is_html = response.status() == StatusCode::OK
        && response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("text/html"));
    if !is_html {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_INJECT_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Could not read page for live-reload injection: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    let html = String::from_utf8_lossy(&bytes);
    let injected = inject_snippet(&html, &state.snippet);

    parts.headers.remove(CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(injected))
}
