//! Chunked transfer primitives shared by both transfer directions.
//!
//! Chunk framing knows nothing about file semantics: it turns an
//! unbounded byte source into bounded frames and back, keeping a
//! running byte count on each side. The integrity check compares that
//! count against the declared size and is the single authoritative
//! success signal of a transfer.

mod chunked;
mod integrity;
mod locks;
mod validation;

pub use chunked::{ChunkReader, ChunkWriter};
pub use integrity::verify_size;
pub use locks::FileLocks;
pub use validation::validate_file_name;

use fileshelf_protocol::WireError;

/// Errors produced by the transfer pipelines.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// Local file open/read/write failure.
    #[error("local I/O error: {0}")]
    Local(#[source] std::io::Error),

    /// Network send/receive failure mid-transfer.
    #[error("transport error: {0}")]
    Transport(#[source] std::io::Error),

    /// Required metadata attribute absent when the stream opened.
    #[error("missing metadata: {0}")]
    MissingMetadata(String),

    /// Requested file absent from the storage root.
    #[error("not found: {0}")]
    NotFound(String),

    /// Declared and received sizes diverged after clean stream end.
    ///
    /// Only fatal on the download path; an upload mismatch is reported
    /// as a status value instead.
    #[error("size mismatch: declared {declared} bytes, received {received}")]
    SizeMismatch { declared: u64, received: u64 },

    /// Name violates the flat namespace (separators, `..`, empty).
    #[error("invalid file name: {0}")]
    InvalidName(String),

    /// Peer refused the transfer before any data flowed.
    #[error("transfer rejected: {0}")]
    Rejected(String),

    /// Malformed frame, cap violation or unknown op.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Transfer abandoned before completion.
    #[error("cancelled")]
    Cancelled,
}

impl From<WireError> for TransferError {
    fn from(err: WireError) -> Self {
        match err {
            // Wire I/O always rides the socket.
            WireError::Io(e) => TransferError::Transport(e),
            WireError::MissingMetadata(m) => TransferError::MissingMetadata(m),
            WireError::Protocol(m) => TransferError::Protocol(m),
        }
    }
}
