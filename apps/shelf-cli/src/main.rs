//! Command-line client for a fileshelf server.
//!
//! ```text
//! shelf <addr> list
//! shelf <addr> upload <path>
//! shelf <addr> download <name> [dest-dir]
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use chrono::{TimeZone, Utc};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use fileshelf_client::FileClient;

fn usage() -> ! {
    eprintln!("usage: shelf <addr> list");
    eprintln!("       shelf <addr> upload <path>");
    eprintln!("       shelf <addr> download <name> [dest-dir]");
    std::process::exit(2);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let addr: SocketAddr = match args.next() {
        Some(a) => a.parse()?,
        None => usage(),
    };
    let client = FileClient::new(addr);
    let cancel = CancellationToken::new();

    match args.next().as_deref() {
        Some("list") => {
            for file in client.list(&cancel).await? {
                let modified = Utc
                    .timestamp_opt(file.modified_at, 0)
                    .single()
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_default();
                println!("{modified}\t{}\t{}", file.size, file.name);
            }
        }
        Some("upload") => {
            let path = args.next().map(PathBuf::from).unwrap_or_else(|| usage());
            let result = client.upload(&path, &cancel).await?;
            if result.is_ok() {
                println!("uploaded {} bytes", result.bytes_transferred);
            } else {
                eprintln!(
                    "upload failed: server received {} bytes but sizes diverged",
                    result.bytes_transferred
                );
                std::process::exit(1);
            }
        }
        Some("download") => {
            let name = match args.next() {
                Some(n) => n,
                None => usage(),
            };
            let dest = args.next().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
            let (metadata, result) = client.download(&name, &dest, &cancel).await?;
            println!(
                "downloaded {} ({} bytes) into {}",
                metadata.filename,
                result.bytes_transferred,
                dest.display()
            );
        }
        _ => usage(),
    }

    Ok(())
}
