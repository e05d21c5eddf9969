//! # devsync
//!
//! devsync server binary: loads settings, opens the store, and serves the
//! HTTP/WebSocket hub until interrupted.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use devsync_server::auth::JwtAuthenticator;
use devsync_server::config::ServerConfig;
use devsync_server::metrics;
use devsync_server::server::DevsyncServer;
use devsync_settings::{DevsyncSettings, LoggingSettings};
use devsync_store::{ConnectionConfig, SqliteStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEV_SECRET: &str = "devsync-dev-secret-change-me";

/// devsync real-time hub server.
#[derive(Parser, Debug)]
#[command(name = "devsync", about = "devsync real-time hub server")]
struct Cli {
    /// JSON settings file layered over the defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides settings, 0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// Path to the `SQLite` database (overrides settings).
    #[arg(long)]
    db_path: Option<String>,

    /// Emit JSON log lines.
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn apply(&self, settings: &mut DevsyncSettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(path) = &self.db_path {
            settings.database.path.clone_from(path);
        }
        if self.json_logs {
            settings.logging.json = true;
        }
    }
}

fn init_tracing(logging: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => devsync_settings::load_settings_from_path(path),
        None => devsync_settings::load_settings(),
    }
    .context("Failed to load settings")?;
    cli.apply(&mut settings);

    init_tracing(&settings.logging);
    if settings.auth.jwt_secret == DEV_SECRET {
        warn!("using the development JWT secret; set DEVSYNC_AUTH__JWT_SECRET");
    }

    let store_config = ConnectionConfig {
        pool_size: settings.database.pool_size,
        ..ConnectionConfig::default()
    };
    let store = Arc::new(
        SqliteStore::open(&settings.database.path, &store_config)
            .with_context(|| format!("Failed to open database: {}", settings.database.path))?,
    );
    let auth = Arc::new(JwtAuthenticator::new(settings.auth.jwt_secret.as_bytes()));

    let mut server = DevsyncServer::new(ServerConfig::from(&settings), store.clone(), store, auth);
    match metrics::install_recorder() {
        Ok(handle) => server = server.with_metrics(handle),
        Err(e) => warn!(error = %e, "metrics recorder not installed"),
    }

    let (addr, serve) = server
        .listen()
        .await
        .with_context(|| format!("Failed to bind {}", server.config().bind_addr()))?;
    info!(%addr, "devsync ready");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    info!("Shutting down...");
    if !server.graceful_shutdown().await {
        warn!("some sessions did not finish before the shutdown timeout");
    }
    let _ = serve.await;
    info!("Shutdown complete");
    Ok(())
}
