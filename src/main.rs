//! Webstore Daemon
//!
//! Serves the encrypted blob store over HTTP.
//!
//! ## Usage
//!
//! ```bash
//! # Start with defaults (port 8080, storage under the local data dir)
//! webstore
//!
//! # Start with custom config
//! webstore --config /path/to/config.toml
//!
//! # Custom storage directory and port
//! webstore --storage-dir ./data --http-port 8081
//!
//! # Supply the encryption secret through the environment
//! WEBSTORE_SECRET=... webstore
//! ```
//!
//! ## HTTP API
//!
//! - `POST /upload/{name}` - Store a blob
//! - `GET /download/{name}` - Retrieve a blob
//! - `GET /clear` - Remove every blob
//! - `GET /metrics` - Prometheus metrics
//! - `GET /health` - Health check

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use webstore::{BlobStore, CipherKey, Config, HttpServer, Metrics, StoreService, WriteMode};

#[derive(Parser, Debug)]
#[command(name = "webstore")]
#[command(about = "Encrypted-at-rest blob store over HTTP")]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Storage directory
    #[arg(long)]
    storage_dir: Option<PathBuf>,

    /// HTTP API port
    #[arg(long)]
    http_port: Option<u16>,

    /// Host to bind to
    #[arg(long)]
    bind_host: Option<String>,

    /// Secret the encryption key is derived from
    #[arg(long, env = "WEBSTORE_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Write uploads to a staging file and rename into place
    #[arg(long)]
    staged_writes: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    webstore::init_tracing()?;

    let args = Args::parse();

    // Load config
    let mut config = if let Some(config_path) = &args.config {
        Config::load(config_path)?
    } else {
        Config::default()
    };

    // Apply CLI overrides
    if let Some(dir) = args.storage_dir {
        config.storage_dir = dir;
    }
    if let Some(port) = args.http_port {
        config.http_port = port;
    }
    if let Some(host) = args.bind_host {
        config.bind_host = host;
    }
    if let Some(secret) = args.secret {
        config.secret = secret;
    }
    if args.staged_writes {
        config.write_mode = WriteMode::Staged;
    }

    info!(
        storage_dir = %config.storage_dir.display(),
        http_port = config.http_port,
        write_mode = ?config.write_mode,
        "Starting webstore"
    );

    // Ensure storage directory exists
    tokio::fs::create_dir_all(&config.storage_dir).await?;

    // Save default config if it doesn't exist; the secret stays out of it
    let config_path = config.config_path();
    if !config_path.exists() {
        config.without_secret().save(&config_path)?;
        info!(path = %config_path.display(), "Created default config");
    }

    let blob_store = Arc::new(
        BlobStore::open(config.blobs_dir(), config.staging_dir(), config.write_mode).await?,
    );
    let service = Arc::new(StoreService::new(
        Arc::clone(&blob_store),
        CipherKey::from_secret(&config.secret),
        Metrics::new(),
    ));

    let http_addr = config.bind_addr()?;
    let http_server = Arc::new(HttpServer::new(service, http_addr));

    info!("HTTP API available at http://{}", http_addr);
    info!("Endpoints:");
    info!("  POST /upload/{{name}}    - Store a blob");
    info!("  GET  /download/{{name}}  - Retrieve a blob");
    info!("  GET  /clear             - Remove every blob");
    info!("  GET  /metrics           - Prometheus metrics");
    info!("  GET  /health            - Health check");
    info!("Press Ctrl+C to stop.");

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutting down...");
    };

    tokio::select! {
        result = http_server.run() => {
            if let Err(e) = result {
                error!(error = %e, "HTTP server error");
            }
        }
        _ = shutdown => {}
    }

    if let Ok(stats) = blob_store.stats().await {
        info!(
            blobs = stats.total_blobs,
            bytes = stats.total_bytes,
            "Final storage stats"
        );
    }

    Ok(())
}
