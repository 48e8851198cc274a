//! Live preview server for mdpress.
//!
//! Serves the rendered output directory over HTTP and pushes reload
//! notifications to connected clients over a WebSocket endpoint, so a
//! browser can refresh as soon as a page has been regenerated.
//!
//! # Architecture
//!
//! ```text
//! Browser ──HTTP──► axum server
//!                      │
//!                      ├─► Static files (tower-http ServeDir, 404.html fallback)
//!                      │
//!                      └─► WebSocket /__livereload
//!                              │
//!                              └─► broadcast::Receiver<ReloadEvent>
//! ```
//!
//! The rebuild engine talks to this server through the [`ReloadSink`] trait.

mod websocket;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::routing::get;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, oneshot};
use tower_http::services::{ServeDir, ServeFile};

/// WebSocket endpoint path for live reload.
pub const LIVE_RELOAD_PATH: &str = "/__livereload";

/// Fallback page served for unknown paths.
const NOT_FOUND_PAGE: &str = "404.html";

/// Event sent to connected clients when output files change.
///
/// `path` is the changed output path for a scoped refresh; `None` requests
/// a full reload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReloadEvent {
    /// Event type (always "reload").
    #[serde(rename = "type")]
    event_type: String,
    /// Output path that changed, if the refresh is scoped.
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
}

impl ReloadEvent {
    fn new(path: Option<String>) -> Self {
        Self {
            event_type: "reload".to_owned(),
            path,
        }
    }

    /// Output path the event is scoped to, if any.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }
}

/// Notification sink for output-freshness events.
///
/// Implemented by [`PreviewServer`]; the rebuild engine holds a
/// `dyn ReloadSink` so tests can substitute a recording sink.
pub trait ReloadSink: Send + Sync {
    /// Notify connected clients to refresh, optionally scoped to one
    /// output path.
    fn reload(&self, path: Option<&str>);
}

/// Preview server error.
#[derive(Debug, thiserror::Error)]
pub enum PreviewError {
    #[error("Failed to start preview server: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared state for request handlers.
pub(crate) struct AppState {
    pub(crate) reload_tx: broadcast::Sender<ReloadEvent>,
}

/// Live preview server handle.
///
/// Created with [`PreviewServer::start`]; the server task runs until
/// [`close`](PreviewServer::close) is called or the handle is dropped.
pub struct PreviewServer {
    addr: SocketAddr,
    reload_tx: broadcast::Sender<ReloadEvent>,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
}

impl PreviewServer {
    /// Bind and start serving `output_root`.
    ///
    /// Binds `host:port` (port 0 picks an ephemeral port, see
    /// [`local_addr`](Self::local_addr)) and spawns the server task.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError`] if the listener cannot be bound.
    pub async fn start(
        output_root: PathBuf,
        host: &str,
        port: u16,
    ) -> Result<Self, PreviewError> {
        let (reload_tx, _rx) = broadcast::channel::<ReloadEvent>(100);
        let state = Arc::new(AppState {
            reload_tx: reload_tx.clone(),
        });

        let static_files = ServeDir::new(&output_root)
            .not_found_service(ServeFile::new(output_root.join(NOT_FOUND_PAGE)));

        let app = Router::new()
            .route(LIVE_RELOAD_PATH, get(websocket::ws_handler))
            .fallback_service(static_files)
            .with_state(state);

        let listener = TcpListener::bind((host, port)).await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    // Resolves on close() or when the handle is dropped.
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(err) = result {
                tracing::error!(error = %err, "Preview server terminated");
            }
        });

        tracing::info!(address = %addr, "Preview server listening");

        Ok(Self {
            addr,
            reload_tx,
            shutdown: Mutex::new(Some(shutdown_tx)),
        })
    }

    /// Address the server is listening on.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Subscribe to reload events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.reload_tx.subscribe()
    }

    /// Stop the server. Idempotent; connected clients are disconnected.
    pub fn close(&self) {
        if let Some(tx) = self.shutdown.lock().unwrap().take() {
            let _ = tx.send(());
            tracing::debug!("Preview server closing");
        }
    }
}

impl ReloadSink for PreviewServer {
    fn reload(&self, path: Option<&str>) {
        // No receivers just means no connected clients yet.
        let _ = self
            .reload_tx
            .send(ReloadEvent::new(path.map(ToOwned::to_owned)));
    }
}
