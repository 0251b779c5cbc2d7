//! Board server command: `roadmap serve`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use roadmap::board::{BoardDb, ServerConfig, start_server};
use roadmap::config::RoadmapConfig;
use roadmap::session::StaticSessionProvider;

pub async fn cmd_serve(
    config: &RoadmapConfig,
    port: Option<u16>,
    db_path: Option<PathBuf>,
    dev: bool,
    init: bool,
) -> Result<()> {
    let db_path = match db_path {
        Some(path) if path.is_relative() => config.project_dir.join(path),
        Some(path) => path,
        None => config.db_path(),
    };

    if init {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }
        BoardDb::new(&db_path)?;
        println!("Board database initialized at {}", db_path.display());
        return Ok(());
    }

    for warning in config.validate() {
        tracing::warn!(%warning, "configuration");
    }
    let access = &config.toml.access;
    tracing::info!(open = access.open, users = access.users.len(), "access policy loaded");

    start_server(
        ServerConfig {
            host: config.toml.server.host.clone(),
            port: port.unwrap_or(config.toml.server.port),
            db_path,
            dev_mode: dev,
        },
        Arc::new(StaticSessionProvider::from_access(access)),
    )
    .await
}
