use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;

use super::api::{self, AppState};
use super::db::{BoardDb, DbHandle};
use super::ws;
use crate::session::SessionProvider;

/// Buffered events per WebSocket subscriber before it starts lagging.
const EVENT_CAPACITY: usize = 256;

/// Configuration for the board server.
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub dev_mode: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3142,
            db_path: PathBuf::from(".roadmap/board.db"),
            dev_mode: false,
        }
    }
}

/// Build application state around an opened database.
pub fn build_state(db: BoardDb, sessions: Arc<dyn SessionProvider>) -> Arc<AppState> {
    let (events_tx, _rx) = broadcast::channel::<String>(EVENT_CAPACITY);
    Arc::new(AppState {
        db: DbHandle::new(db),
        events_tx,
        sessions,
    })
}

/// Build the full application router with the API and the event WebSocket.
pub fn build_router(state: Arc<AppState>) -> Router {
    api::api_router()
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
}

/// Bind the listener, so callers can learn the real port before serving.
pub async fn bind(config: &ServerConfig) -> Result<TcpListener> {
    let addr = format!("{}:{}", config.host, config.port);
    TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))
}

/// Serve on an already bound listener until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    dev_mode: bool,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let mut app = build_router(state);
    if dev_mode {
        app = app.layer(CorsLayer::permissive());
    }

    let local_addr: SocketAddr = listener.local_addr()?;
    tracing::info!(%local_addr, dev_mode, "roadmap board listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("Server error")?;

    tracing::info!("server shut down gracefully");
    Ok(())
}

/// Open the database and run the server until Ctrl-C.
pub async fn start_server(config: ServerConfig, sessions: Arc<dyn SessionProvider>) -> Result<()> {
    if let Some(parent) = config.db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }

    let db = BoardDb::new(&config.db_path).context("Failed to initialize board database")?;
    let state = build_state(db, sessions);
    let listener = bind(&config).await?;
    println!("Roadmap board running at http://{}", listener.local_addr()?);

    serve(listener, state, config.dev_mode, shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
