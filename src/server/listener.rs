//! Relay server listener
//!
//! Serves the WebSocket endpoint plus read-only health and stream statistics
//! over HTTP, and spawns one connection task per upgraded socket.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::{ConnectInfo, Path, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;

use crate::error::Result;
use crate::registry::{StreamId, StreamRegistry};
use crate::server::config::ServerConfig;
use crate::server::connection::Connection;

/// Shared state handed to every request handler
struct Shared {
    config: ServerConfig,
    registry: Arc<StreamRegistry>,
    next_session_id: AtomicU64,
    active_connections: AtomicUsize,
    connection_semaphore: Option<Arc<Semaphore>>,
}

/// Live commentary relay server
pub struct RelayServer {
    shared: Arc<Shared>,
}

impl RelayServer {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        let registry = Arc::new(StreamRegistry::with_config(config.registry.clone()));
        Self::with_registry(config, registry)
    }

    /// Create a server around an existing registry
    pub fn with_registry(config: ServerConfig, registry: Arc<StreamRegistry>) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            shared: Arc::new(Shared {
                config,
                registry,
                next_session_id: AtomicU64::new(1),
                active_connections: AtomicUsize::new(0),
                connection_semaphore,
            }),
        }
    }

    /// Get a reference to the stream registry
    pub fn registry(&self) -> &Arc<StreamRegistry> {
        &self.shared.registry
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.shared.config.bind_addr
    }

    /// Number of currently open WebSocket connections
    pub fn active_connections(&self) -> usize {
        self.shared.active_connections.load(Ordering::Relaxed)
    }

    /// Build the HTTP router
    ///
    /// The WebSocket endpoint answers on both `/` and `/ws`.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(handle_upgrade))
            .route("/ws", get(handle_upgrade))
            .route("/health", get(handle_health))
            .route("/streams/{stream_id}", get(handle_stream_stats))
            .with_state(Arc::clone(&self.shared))
    }

    /// Run the server
    ///
    /// This method blocks until the server fails.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.shared.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already-bound listener
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::info!(addr = %listener.local_addr()?, "Relay server listening");

        axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            shutdown.await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

        Ok(())
    }
}

async fn handle_upgrade(
    ws: WebSocketUpgrade,
    ConnectInfo(peer_addr): ConnectInfo<SocketAddr>,
    State(shared): State<Arc<Shared>>,
) -> Response {
    // Check connection limit
    let permit = if let Some(ref sem) = shared.connection_semaphore {
        match sem.clone().try_acquire_owned() {
            Ok(permit) => Some(permit),
            Err(_) => {
                tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                return (StatusCode::SERVICE_UNAVAILABLE, "connection limit reached")
                    .into_response();
            }
        }
    } else {
        None
    };

    let session_id = shared.next_session_id.fetch_add(1, Ordering::Relaxed);

    ws.max_message_size(shared.config.max_message_size)
        .on_upgrade(move |socket| async move {
            tracing::debug!(session_id, peer = %peer_addr, "New connection");
            shared.active_connections.fetch_add(1, Ordering::Relaxed);

            let connection = Connection::new(
                session_id,
                peer_addr,
                socket,
                Arc::clone(&shared.registry),
                permit,
            );
            if let Err(e) = connection.run().await {
                tracing::debug!(session_id, error = %e, "Connection error");
            }

            shared.active_connections.fetch_sub(1, Ordering::Relaxed);
            tracing::debug!(session_id, "Connection closed");
        })
}

async fn handle_health(State(shared): State<Arc<Shared>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "streams": shared.registry.stream_count().await,
        "connections": shared.active_connections.load(Ordering::Relaxed),
    }))
}

async fn handle_stream_stats(
    Path(stream_id): Path<String>,
    State(shared): State<Arc<Shared>>,
) -> Response {
    let Ok(id) = StreamId::new(stream_id) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match shared.registry.get_stream_stats(&id).await {
        Some(stats) => Json(stats).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
