//! Per-call handlers for the three operations.
//!
//! Handlers are generic over the stream halves so they can run against
//! in-memory buffers in tests.

use std::path::Path;
use std::time::UNIX_EPOCH;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use fileshelf_protocol::wire::{self, DownloadReply, UploadReply};
use fileshelf_protocol::{FileDescriptor, TransferLimits, TransferMetadata, WireError};
use fileshelf_transfer::{
    ChunkReader, ChunkWriter, FileLocks, TransferError, validate_file_name, verify_size,
};

/// Enumerates regular files in the storage root.
///
/// The listing is sorted by name so repeated calls with no intervening
/// writes return identical descriptor sets.
pub(crate) async fn handle_list<W: AsyncWrite + Unpin>(
    root: &Path,
    writer: &mut W,
) -> Result<(), TransferError> {
    let mut entries = tokio::fs::read_dir(root).await.map_err(TransferError::Local)?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await.map_err(TransferError::Local)? {
        let meta = entry.metadata().await.map_err(TransferError::Local)?;
        if !meta.is_file() {
            continue;
        }
        let modified_at = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        files.push(FileDescriptor {
            name: entry.file_name().to_string_lossy().into_owned(),
            size: meta.len(),
            modified_at,
        });
    }

    files.sort_by(|a, b| a.name.cmp(&b.name));
    info!(count = files.len(), "listing sent");
    wire::write_descriptor_list(writer, &files).await?;
    Ok(())
}

/// Receives one file: metadata first, then the chunk sequence.
///
/// A size mismatch after a clean end of stream is reported through the
/// status byte, not as a call failure. Metadata and name problems are
/// rejected before any chunk is consumed. Mid-stream errors abort the
/// connection without a reply.
pub(crate) async fn handle_upload<R, W>(
    root: &Path,
    limits: TransferLimits,
    locks: &FileLocks,
    cancel: &CancellationToken,
    reader: &mut R,
    writer: &mut W,
) -> Result<(), TransferError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let metadata = match wire::read_metadata(reader).await {
        Ok(md) => md,
        Err(WireError::MissingMetadata(reason)) => {
            warn!(reason, "upload rejected: bad metadata");
            wire::write_upload_reply(writer, &UploadReply::Rejected(reason.clone())).await?;
            return Err(TransferError::MissingMetadata(reason));
        }
        Err(e) => return Err(e.into()),
    };
    info!(
        filename = %metadata.filename,
        size = metadata.size,
        timestamp = %metadata.timestamp,
        "upload requested"
    );

    if let Err(e) = validate_file_name(&metadata.filename) {
        wire::write_upload_reply(writer, &UploadReply::Rejected(e.to_string())).await?;
        return Err(e);
    }
    if metadata.size > limits.max_transfer_size {
        let reason = format!(
            "declared size {} exceeds transfer ceiling {}",
            metadata.size, limits.max_transfer_size
        );
        wire::write_upload_reply(writer, &UploadReply::Rejected(reason.clone())).await?;
        return Err(TransferError::Protocol(reason));
    }

    // Serialize writers of the same name; the guard lives until return.
    let _guard = locks.acquire(&metadata.filename).await;

    let dest = root.join(&metadata.filename);
    let file = tokio::fs::File::create(&dest)
        .await
        .map_err(TransferError::Local)?;
    let mut sink = ChunkWriter::new(file);

    loop {
        if cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }
        match wire::read_chunk(reader, limits.frame_cap).await? {
            Some(chunk) => {
                sink.write_chunk(&chunk).await?;
                if sink.bytes_written() > limits.max_transfer_size {
                    return Err(TransferError::Protocol(format!(
                        "transfer exceeds ceiling of {} bytes",
                        limits.max_transfer_size
                    )));
                }
            }
            None => break,
        }
    }
    sink.flush().await?;

    let received = sink.bytes_written();
    let status = verify_size(metadata.size, received);
    info!(
        filename = %metadata.filename,
        declared = metadata.size,
        received,
        ?status,
        "upload finished"
    );
    wire::write_upload_reply(writer, &UploadReply::Status(status)).await?;
    Ok(())
}

/// Sends one file: metadata as the first stream event, then chunks.
///
/// No trailing status frame exists in this direction; clean stream end
/// is the wire-level completion signal and the client performs the
/// authoritative size check.
pub(crate) async fn handle_download<R, W>(
    root: &Path,
    limits: TransferLimits,
    cancel: &CancellationToken,
    reader: &mut R,
    writer: &mut W,
) -> Result<(), TransferError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let name = wire::read_name(reader).await?;
    info!(filename = %name, "download requested");

    if let Err(e) = validate_file_name(&name) {
        wire::write_download_reply(writer, &DownloadReply::Rejected(e.to_string())).await?;
        return Err(e);
    }

    let path = root.join(&name);
    let stat = match tokio::fs::metadata(&path).await {
        Ok(m) if m.is_file() => m,
        Ok(_) => {
            let reason = format!("not a regular file: {name}");
            wire::write_download_reply(writer, &DownloadReply::Rejected(reason)).await?;
            return Err(TransferError::NotFound(name));
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let reason = format!("no such file: {name}");
            wire::write_download_reply(writer, &DownloadReply::Rejected(reason)).await?;
            return Err(TransferError::NotFound(name));
        }
        Err(e) => return Err(TransferError::Local(e)),
    };

    wire::write_download_reply(writer, &DownloadReply::Accepted).await?;
    let metadata = TransferMetadata {
        filename: name.clone(),
        size: stat.len(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };
    wire::write_metadata(writer, &metadata).await?;

    let file = tokio::fs::File::open(&path)
        .await
        .map_err(TransferError::Local)?;
    let mut chunks = ChunkReader::new(file, limits.frame_cap);
    while let Some(chunk) = chunks.next_chunk().await? {
        if cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }
        wire::write_chunk(writer, chunk).await?;
    }
    wire::write_end_marker(writer).await?;
    writer.flush().await.map_err(TransferError::Transport)?;

    info!(filename = %name, size = stat.len(), "download finished");
    Ok(())
}
