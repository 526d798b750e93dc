//! One-connection-per-call client.

use std::net::SocketAddr;
use std::path::Path;

use tokio::io::{AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use fileshelf_protocol::wire::{
    self, DownloadReply, OP_DOWNLOAD, OP_LIST, OP_UPLOAD, UploadReply,
};
use fileshelf_protocol::{
    FileDescriptor, TransferLimits, TransferMetadata, TransferResult, TransferStatus,
};
use fileshelf_transfer::{ChunkReader, ChunkWriter, TransferError, validate_file_name, verify_size};

use crate::{CONNECT_TIMEOUT, WIRE_BUFFER_SIZE};

/// Client for one fileshelf server.
#[derive(Debug, Clone)]
pub struct FileClient {
    addr: SocketAddr,
    limits: TransferLimits,
}

impl FileClient {
    /// Creates a client with default limits.
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            limits: TransferLimits::default(),
        }
    }

    /// Overrides the frame cap and transfer ceiling.
    ///
    /// Must agree with the server's configuration; the receiver side of
    /// either pipeline refuses frames above its own cap.
    pub fn with_limits(mut self, limits: TransferLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Connects with timeout and cancellation.
    async fn connect(&self, cancel: &CancellationToken) -> Result<TcpStream, TransferError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransferError::Cancelled),
            result = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(self.addr)) => {
                match result {
                    Ok(Ok(stream)) => {
                        debug!(addr = %self.addr, "connected");
                        Ok(stream)
                    }
                    Ok(Err(e)) => Err(TransferError::Transport(e)),
                    Err(_) => Err(TransferError::Transport(std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        "connection attempt timed out",
                    ))),
                }
            }
        }
    }

    /// Enumerates files stored on the server.
    pub async fn list(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<FileDescriptor>, TransferError> {
        let stream = self.connect(cancel).await?;
        let (reader, writer) = stream.into_split();
        let mut reader = BufReader::with_capacity(WIRE_BUFFER_SIZE, reader);
        let mut writer = BufWriter::with_capacity(WIRE_BUFFER_SIZE, writer);

        wire::write_op(&mut writer, OP_LIST).await?;
        writer.flush().await.map_err(TransferError::Transport)?;

        let files = wire::read_descriptor_list(&mut reader).await?;
        debug!(count = files.len(), "listing received");
        Ok(files)
    }

    /// Uploads a local file under its base name.
    ///
    /// Returns the server-reported result. A `Failed` status means the
    /// stream completed but the server received a byte count that
    /// diverged from the declared size; the call itself still succeeds
    /// and the caller must inspect the status.
    pub async fn upload(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<TransferResult, TransferError> {
        let stat = tokio::fs::metadata(path).await.map_err(TransferError::Local)?;
        if !stat.is_file() {
            return Err(TransferError::Local(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("not a regular file: {}", path.display()),
            )));
        }

        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| TransferError::InvalidName(format!("unusable path: {}", path.display())))?
            .to_string();
        validate_file_name(&filename)?;

        if stat.len() > self.limits.max_transfer_size {
            return Err(TransferError::Protocol(format!(
                "file of {} bytes exceeds transfer ceiling {}",
                stat.len(),
                self.limits.max_transfer_size
            )));
        }

        let metadata = TransferMetadata {
            filename: filename.clone(),
            size: stat.len(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        info!(filename = %filename, size = stat.len(), "starting upload");

        let stream = self.connect(cancel).await?;
        let (reader, writer) = stream.into_split();
        let mut reader = BufReader::with_capacity(WIRE_BUFFER_SIZE, reader);
        let mut writer = BufWriter::with_capacity(WIRE_BUFFER_SIZE, writer);

        // Metadata is established before the chunk sequence opens.
        wire::write_op(&mut writer, OP_UPLOAD).await?;
        wire::write_metadata(&mut writer, &metadata).await?;

        let file = tokio::fs::File::open(path).await.map_err(TransferError::Local)?;
        let mut chunks = ChunkReader::new(file, self.limits.frame_cap);
        loop {
            if cancel.is_cancelled() {
                return Err(TransferError::Cancelled);
            }
            match chunks.next_chunk().await? {
                Some(chunk) => wire::write_chunk(&mut writer, chunk).await?,
                None => break,
            }
        }
        wire::write_end_marker(&mut writer).await?;
        writer.flush().await.map_err(TransferError::Transport)?;

        let bytes_sent = chunks.bytes_read();
        match wire::read_upload_reply(&mut reader).await? {
            UploadReply::Status(status) => {
                info!(filename = %filename, bytes_sent, ?status, "upload reply received");
                Ok(TransferResult {
                    status,
                    bytes_transferred: bytes_sent,
                })
            }
            UploadReply::Rejected(reason) => Err(TransferError::Rejected(reason)),
        }
    }

    /// Downloads `name` into `dest_dir`.
    ///
    /// Metadata is read before any chunk. After a clean end of stream
    /// the received byte count is checked against the declared size;
    /// a mismatch is fatal because the download direction has no
    /// status channel.
    pub async fn download(
        &self,
        name: &str,
        dest_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<(TransferMetadata, TransferResult), TransferError> {
        validate_file_name(name)?;
        info!(filename = %name, "starting download");

        let stream = self.connect(cancel).await?;
        let (reader, writer) = stream.into_split();
        let mut reader = BufReader::with_capacity(WIRE_BUFFER_SIZE, reader);
        let mut writer = BufWriter::with_capacity(WIRE_BUFFER_SIZE, writer);

        wire::write_op(&mut writer, OP_DOWNLOAD).await?;
        wire::write_name(&mut writer, name).await?;
        writer.flush().await.map_err(TransferError::Transport)?;

        match wire::read_download_reply(&mut reader).await? {
            DownloadReply::Accepted => {}
            DownloadReply::Rejected(reason) => return Err(TransferError::NotFound(reason)),
        }

        // Metadata blocks the first chunk read.
        let metadata = wire::read_metadata(&mut reader).await?;
        validate_file_name(&metadata.filename)?;

        let dest = dest_dir.join(&metadata.filename);
        let file = tokio::fs::File::create(&dest)
            .await
            .map_err(TransferError::Local)?;
        let mut sink = ChunkWriter::new(file);

        loop {
            if cancel.is_cancelled() {
                return Err(TransferError::Cancelled);
            }
            match wire::read_chunk(&mut reader, self.limits.frame_cap).await? {
                Some(chunk) => {
                    sink.write_chunk(&chunk).await?;
                    if sink.bytes_written() > self.limits.max_transfer_size {
                        return Err(TransferError::Protocol(format!(
                            "transfer exceeds ceiling of {} bytes",
                            self.limits.max_transfer_size
                        )));
                    }
                }
                None => break,
            }
        }
        sink.flush().await?;

        let received = sink.bytes_written();
        match verify_size(metadata.size, received) {
            TransferStatus::Ok => {
                info!(filename = %metadata.filename, received, "download complete");
                Ok((metadata, TransferResult::ok(received)))
            }
            TransferStatus::Failed => Err(TransferError::SizeMismatch {
                declared: metadata.size,
                received,
            }),
        }
    }
}
