//! Accept loop and per-connection dispatch.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{BufReader, BufWriter};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use fileshelf_protocol::TransferLimits;
use fileshelf_protocol::wire::{self, OP_DOWNLOAD, OP_LIST, OP_UPLOAD};
use fileshelf_transfer::{FileLocks, TransferError};

use crate::WIRE_BUFFER_SIZE;
use crate::handlers;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP port to listen on (0 = OS-assigned).
    pub port: u16,
    /// Flat directory holding all transferable files.
    pub storage_root: PathBuf,
    /// Frame cap and transfer size ceiling.
    pub limits: TransferLimits,
}

impl ServerConfig {
    /// Configuration with default limits and an OS-assigned port.
    pub fn new(storage_root: impl Into<PathBuf>) -> Self {
        Self {
            port: 0,
            storage_root: storage_root.into(),
            limits: TransferLimits::default(),
        }
    }
}

/// The fileshelf TCP server.
pub struct FileServer {
    config: ServerConfig,
    locks: Arc<FileLocks>,
    cancel: CancellationToken,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl FileServer {
    pub fn new(config: ServerConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            locks: Arc::new(FileLocks::new()),
            cancel: CancellationToken::new(),
            local_addr: Mutex::new(None),
        })
    }

    /// Returns the local address the server is listening on.
    ///
    /// Only available after [`run`](Self::run) binds the socket.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().await
    }

    /// Returns the listening port (0 if not yet bound).
    pub async fn port(&self) -> u16 {
        self.local_addr.lock().await.map(|a| a.port()).unwrap_or(0)
    }

    /// Gracefully shuts down the server and aborts in-flight transfers.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Runs the server until cancellation.
    pub async fn run(self: &Arc<Self>) -> Result<(), TransferError> {
        let addr: SocketAddr = ([0, 0, 0, 0], self.config.port).into();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransferError::Transport)?;

        let local_addr = listener.local_addr().map_err(TransferError::Transport)?;
        *self.local_addr.lock().await = Some(local_addr);
        info!(%local_addr, root = %self.config.storage_root.display(), "fileshelf server listening");

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("server shutting down");
                    break Ok(());
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            let server = Arc::clone(self);
                            tokio::spawn(async move {
                                if let Err(e) = server.handle_connection(stream, peer_addr).await {
                                    error!(%peer_addr, "connection error: {e}");
                                }
                            });
                        }
                        Err(e) => {
                            error!("accept error: {e}");
                        }
                    }
                }
            }
        }
    }

    /// Handles one connection: reads the op byte and runs the call.
    async fn handle_connection(
        &self,
        stream: tokio::net::TcpStream,
        peer_addr: SocketAddr,
    ) -> Result<(), TransferError> {
        let (reader, writer) = stream.into_split();
        let mut reader = BufReader::with_capacity(WIRE_BUFFER_SIZE, reader);
        let mut writer = BufWriter::with_capacity(WIRE_BUFFER_SIZE, writer);

        let op = wire::read_op(&mut reader).await?;
        debug!(%peer_addr, op, "request received");

        match op {
            OP_LIST => handlers::handle_list(&self.config.storage_root, &mut writer).await,
            OP_UPLOAD => {
                handlers::handle_upload(
                    &self.config.storage_root,
                    self.config.limits,
                    &self.locks,
                    &self.cancel,
                    &mut reader,
                    &mut writer,
                )
                .await
            }
            OP_DOWNLOAD => {
                handlers::handle_download(
                    &self.config.storage_root,
                    self.config.limits,
                    &self.cancel,
                    &mut reader,
                    &mut writer,
                )
                .await
            }
            // read_op already validated the byte.
            _ => unreachable!(),
        }
    }
}
