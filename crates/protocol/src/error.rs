//! Error type for the wire codec.

/// Errors produced while encoding or decoding wire frames.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing metadata: {0}")]
    MissingMetadata(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}
