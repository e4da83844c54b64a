// Copyright (c) 2026 Aisu OS
// SPDX-License-Identifier: AGPL-3.0
//! Aisu control-plane server: load configuration, wire the Postgres stores
//! and the Docker runtime into the HTTP surface, serve until interrupted.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use aisu_core::config::AppConfig;
use aisu_core::infrastructure::db::Database;
use aisu_core::infrastructure::docker::DockerRuntime;
use aisu_core::infrastructure::rate_limit::init_rate_limiter;
use aisu_core::infrastructure::stores::{
    PgBetaAccessStore, PgContainerStore, PgNodeMetaStore, PgUserStore,
};
use aisu_core::presentation::{app, AppState};

/// Aisu control plane - containers, virtual filesystem and terminals for
/// the browser desktop.
#[derive(Parser)]
#[command(name = "aisu-server")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, env = "AISU_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the listen port from the config file
    #[arg(long, env = "AISU_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(port) = cli.port {
        config.port = port;
    }
    let config = Arc::new(config);

    let database = Database::new(&config.database_url)
        .await
        .context("Failed to connect to the database")?;
    let pool = database.get_pool().clone();

    let runtime = Arc::new(
        DockerRuntime::connect(&config.docker_base_url, &config.container_network)
            .context("Failed to connect to the container engine")?,
    );
    if config.container_enabled {
        if let Err(err) = runtime.healthcheck().await {
            warn!("container engine healthcheck failed: {err}");
        }
    }

    init_rate_limiter(&config).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let state = AppState {
        config: Arc::clone(&config),
        users: Arc::new(PgUserStore::new(pool.clone())),
        containers: Arc::new(PgContainerStore::new(pool.clone())),
        node_meta: Arc::new(PgNodeMetaStore::new(pool.clone())),
        beta: Arc::new(PgBetaAccessStore::new(pool)),
        runtime,
    };

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("{} listening on {addr}", config.app_name);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
