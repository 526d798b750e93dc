//! fileshelf server daemon.
//!
//! Usage: `shelfd [storage-root] [port]`

use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use fileshelf_server::{FileServer, ServerConfig};

const DEFAULT_PORT: u16 = 50051;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting shelfd");

    let mut args = std::env::args().skip(1);
    let storage_root = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("./media"));
    let port: u16 = match args.next() {
        Some(p) => p.parse()?,
        None => DEFAULT_PORT,
    };

    tokio::fs::create_dir_all(&storage_root).await?;

    let server = FileServer::new(ServerConfig {
        port,
        ..ServerConfig::new(storage_root)
    });

    // Ctrl-C triggers a graceful shutdown.
    let shutdown = Arc::clone(&server);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.shutdown();
        }
    });

    server.run().await?;
    Ok(())
}
