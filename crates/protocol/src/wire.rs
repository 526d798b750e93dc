//! Frame codec for the transfer wire.
//!
//! All helpers are generic over [`AsyncRead`]/[`AsyncWrite`] so the
//! same codec runs against TCP streams in production and `Vec<u8>`
//! buffers in tests. Integers are big-endian.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::WireError;
use crate::types::{FileDescriptor, TransferMetadata, TransferStatus};

/// Request op: list stored files.
pub const OP_LIST: u8 = 0x01;

/// Request op: upload one file.
pub const OP_UPLOAD: u8 = 0x02;

/// Request op: download one file.
pub const OP_DOWNLOAD: u8 = 0x03;

/// Upload reply: sizes matched.
pub const STATUS_OK: u8 = 0x01;

/// Upload reply: sizes diverged.
pub const STATUS_FAILED: u8 = 0x00;

/// Upload reply: transfer refused before any chunk was consumed.
pub const STATUS_REJECTED: u8 = 0x02;

/// Download reply: request accepted, metadata and chunks follow.
pub const DOWNLOAD_ACCEPTED: u8 = 0x01;

/// Download reply: request refused, reason follows.
pub const DOWNLOAD_REJECTED: u8 = 0x00;

/// Upper bound on metadata header pairs per transfer.
pub const MAX_METADATA_PAIRS: usize = 16;

/// Upper bound on the JSON list reply (16 MiB).
pub const MAX_LIST_BYTES: u32 = 16 * 1024 * 1024;

/// Server's reply to an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadReply {
    /// Transfer ran to completion; status is the integrity verdict.
    Status(TransferStatus),
    /// Transfer refused before data flowed (bad metadata or name).
    Rejected(String),
}

/// Server's reply to a download request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadReply {
    Accepted,
    Rejected(String),
}

// ---------------------------------------------------------------------------
// Request framing
// ---------------------------------------------------------------------------

/// Writes the request op byte.
pub async fn write_op<W: AsyncWrite + Unpin>(writer: &mut W, op: u8) -> Result<(), WireError> {
    writer.write_u8(op).await?;
    Ok(())
}

/// Reads the request op byte and validates it.
pub async fn read_op<R: AsyncRead + Unpin>(reader: &mut R) -> Result<u8, WireError> {
    let op = reader.read_u8().await?;
    match op {
        OP_LIST | OP_UPLOAD | OP_DOWNLOAD => Ok(op),
        other => Err(WireError::Protocol(format!("unknown op byte {other:#04x}"))),
    }
}

/// Writes a length-prefixed UTF-8 name (download request).
pub async fn write_name<W: AsyncWrite + Unpin>(
    writer: &mut W,
    name: &str,
) -> Result<(), WireError> {
    let bytes = name.as_bytes();
    if bytes.len() > u16::MAX as usize {
        return Err(WireError::Protocol(format!(
            "name too long: {} bytes (max {})",
            bytes.len(),
            u16::MAX
        )));
    }
    writer.write_u16(bytes.len() as u16).await?;
    writer.write_all(bytes).await?;
    Ok(())
}

/// Reads a length-prefixed UTF-8 name.
pub async fn read_name<R: AsyncRead + Unpin>(reader: &mut R) -> Result<String, WireError> {
    let len = reader.read_u16().await?;
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf).await?;
    String::from_utf8(buf).map_err(|e| WireError::Protocol(format!("invalid UTF-8 name: {e}")))
}

// ---------------------------------------------------------------------------
// Metadata header block
// ---------------------------------------------------------------------------

/// Writes the metadata header block.
///
/// Must precede every chunk frame of the transfer on the stream.
pub async fn write_metadata<W: AsyncWrite + Unpin>(
    writer: &mut W,
    metadata: &TransferMetadata,
) -> Result<(), WireError> {
    let pairs = metadata.to_pairs();
    writer.write_u16(pairs.len() as u16).await?;
    for (key, value) in &pairs {
        write_pair_part(writer, key).await?;
        write_pair_part(writer, value).await?;
    }
    Ok(())
}

async fn write_pair_part<W: AsyncWrite + Unpin>(
    writer: &mut W,
    part: &str,
) -> Result<(), WireError> {
    let bytes = part.as_bytes();
    if bytes.len() > u16::MAX as usize {
        return Err(WireError::Protocol(format!(
            "metadata attribute too long: {} bytes",
            bytes.len()
        )));
    }
    writer.write_u16(bytes.len() as u16).await?;
    writer.write_all(bytes).await?;
    Ok(())
}

/// Reads the metadata header block.
///
/// Fails with [`WireError::MissingMetadata`] if the required attributes
/// are absent, before any chunk frame has been touched.
pub async fn read_metadata<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<TransferMetadata, WireError> {
    let count = reader.read_u16().await? as usize;
    if count > MAX_METADATA_PAIRS {
        return Err(WireError::Protocol(format!(
            "too many metadata pairs: {count} (max {MAX_METADATA_PAIRS})"
        )));
    }

    let mut pairs = Vec::with_capacity(count);
    for _ in 0..count {
        let key = read_pair_part(reader).await?;
        let value = read_pair_part(reader).await?;
        pairs.push((key, value));
    }

    TransferMetadata::from_pairs(&pairs)
}

async fn read_pair_part<R: AsyncRead + Unpin>(reader: &mut R) -> Result<String, WireError> {
    let len = reader.read_u16().await?;
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf).await?;
    String::from_utf8(buf)
        .map_err(|e| WireError::Protocol(format!("invalid UTF-8 metadata attribute: {e}")))
}

// ---------------------------------------------------------------------------
// Chunk frames
// ---------------------------------------------------------------------------

/// Writes one chunk frame.
///
/// Chunks are never empty; the zero length is reserved for the end
/// marker.
pub async fn write_chunk<W: AsyncWrite + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> Result<(), WireError> {
    if data.is_empty() {
        return Err(WireError::Protocol("empty chunk frame".into()));
    }
    if data.len() > u32::MAX as usize {
        return Err(WireError::Protocol(format!(
            "chunk too large for frame: {} bytes",
            data.len()
        )));
    }
    writer.write_u32(data.len() as u32).await?;
    writer.write_all(data).await?;
    Ok(())
}

/// Writes the end-of-stream marker.
pub async fn write_end_marker<W: AsyncWrite + Unpin>(writer: &mut W) -> Result<(), WireError> {
    writer.write_u32(0).await?;
    Ok(())
}

/// Reads the next chunk frame.
///
/// Returns `None` on the end marker. A frame longer than `frame_cap`
/// is a protocol violation; the receiver never allocates past the cap.
pub async fn read_chunk<R: AsyncRead + Unpin>(
    reader: &mut R,
    frame_cap: usize,
) -> Result<Option<Vec<u8>>, WireError> {
    let len = reader.read_u32().await? as usize;
    if len == 0 {
        return Ok(None);
    }
    if len > frame_cap {
        return Err(WireError::Protocol(format!(
            "chunk frame of {len} bytes exceeds cap of {frame_cap}"
        )));
    }
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(Some(buf))
}

// ---------------------------------------------------------------------------
// Replies
// ---------------------------------------------------------------------------

/// Writes the upload reply frame.
pub async fn write_upload_reply<W: AsyncWrite + Unpin>(
    writer: &mut W,
    reply: &UploadReply,
) -> Result<(), WireError> {
    match reply {
        UploadReply::Status(TransferStatus::Ok) => writer.write_u8(STATUS_OK).await?,
        UploadReply::Status(TransferStatus::Failed) => writer.write_u8(STATUS_FAILED).await?,
        UploadReply::Rejected(reason) => {
            writer.write_u8(STATUS_REJECTED).await?;
            write_reason(writer, reason).await?;
        }
    }
    writer.flush().await?;
    Ok(())
}

/// Reads the upload reply frame.
pub async fn read_upload_reply<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<UploadReply, WireError> {
    match reader.read_u8().await? {
        STATUS_OK => Ok(UploadReply::Status(TransferStatus::Ok)),
        STATUS_FAILED => Ok(UploadReply::Status(TransferStatus::Failed)),
        STATUS_REJECTED => Ok(UploadReply::Rejected(read_reason(reader).await?)),
        other => Err(WireError::Protocol(format!(
            "unknown upload status byte {other:#04x}"
        ))),
    }
}

/// Writes the download reply frame.
pub async fn write_download_reply<W: AsyncWrite + Unpin>(
    writer: &mut W,
    reply: &DownloadReply,
) -> Result<(), WireError> {
    match reply {
        DownloadReply::Accepted => writer.write_u8(DOWNLOAD_ACCEPTED).await?,
        DownloadReply::Rejected(reason) => {
            writer.write_u8(DOWNLOAD_REJECTED).await?;
            write_reason(writer, reason).await?;
            writer.flush().await?;
        }
    }
    Ok(())
}

/// Reads the download reply frame.
pub async fn read_download_reply<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<DownloadReply, WireError> {
    match reader.read_u8().await? {
        DOWNLOAD_ACCEPTED => Ok(DownloadReply::Accepted),
        DOWNLOAD_REJECTED => Ok(DownloadReply::Rejected(read_reason(reader).await?)),
        other => Err(WireError::Protocol(format!(
            "unknown download reply byte {other:#04x}"
        ))),
    }
}

async fn write_reason<W: AsyncWrite + Unpin>(
    writer: &mut W,
    reason: &str,
) -> Result<(), WireError> {
    let bytes = reason.as_bytes();
    let len = bytes.len().min(u16::MAX as usize);
    writer.write_u16(len as u16).await?;
    writer.write_all(&bytes[..len]).await?;
    Ok(())
}

async fn read_reason<R: AsyncRead + Unpin>(reader: &mut R) -> Result<String, WireError> {
    let len = reader.read_u16().await?;
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf).await?;
    String::from_utf8(buf).map_err(|e| WireError::Protocol(format!("invalid UTF-8 reason: {e}")))
}

// ---------------------------------------------------------------------------
// List reply
// ---------------------------------------------------------------------------

/// Writes the listing as a length-prefixed JSON frame.
pub async fn write_descriptor_list<W: AsyncWrite + Unpin>(
    writer: &mut W,
    files: &[FileDescriptor],
) -> Result<(), WireError> {
    let json = serde_json::to_vec(files)
        .map_err(|e| WireError::Protocol(format!("listing serialization failed: {e}")))?;
    if json.len() > MAX_LIST_BYTES as usize {
        return Err(WireError::Protocol(format!(
            "listing of {} bytes exceeds cap",
            json.len()
        )));
    }
    writer.write_u32(json.len() as u32).await?;
    writer.write_all(&json).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads the listing JSON frame.
pub async fn read_descriptor_list<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<Vec<FileDescriptor>, WireError> {
    let len = reader.read_u32().await?;
    if len > MAX_LIST_BYTES {
        return Err(WireError::Protocol(format!(
            "listing frame of {len} bytes exceeds cap"
        )));
    }
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf).await?;
    serde_json::from_slice(&buf)
        .map_err(|e| WireError::Protocol(format!("invalid listing JSON: {e}")))
}
