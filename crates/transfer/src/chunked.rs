use fileshelf_protocol::DEFAULT_FRAME_CAP;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::TransferError;

/// Produces bounded chunks from an unbounded byte source.
///
/// One frame buffer is allocated up front and reused for every chunk,
/// so peak memory stays proportional to the frame cap regardless of
/// total transfer size.
pub struct ChunkReader<R> {
    source: R,
    buf: Vec<u8>,
    bytes_read: u64,
}

impl<R: AsyncRead + Unpin> ChunkReader<R> {
    /// Wraps `source` with the given frame cap.
    ///
    /// If `frame_cap` is 0, [`DEFAULT_FRAME_CAP`] (4 MiB) is used.
    pub fn new(source: R, frame_cap: usize) -> Self {
        let frame_cap = if frame_cap == 0 {
            DEFAULT_FRAME_CAP
        } else {
            frame_cap
        };
        Self {
            source,
            buf: vec![0u8; frame_cap],
            bytes_read: 0,
        }
    }

    /// Reads the next chunk. Returns `None` at end of source.
    ///
    /// At most one read of up to the frame cap per call; a short read
    /// yields a short chunk. Never yields an empty chunk. Bytes read by
    /// earlier calls stay yielded even if a later read fails.
    pub async fn next_chunk(&mut self) -> Result<Option<&[u8]>, TransferError> {
        let n = self
            .source
            .read(&mut self.buf)
            .await
            .map_err(TransferError::Local)?;
        if n == 0 {
            return Ok(None);
        }
        self.bytes_read += n as u64;
        Ok(Some(&self.buf[..n]))
    }

    /// Total bytes yielded so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}

/// Consumes chunks in receipt order, accumulating a running byte count.
pub struct ChunkWriter<W> {
    sink: W,
    bytes_written: u64,
}

impl<W: AsyncWrite + Unpin> ChunkWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            bytes_written: 0,
        }
    }

    /// Writes one chunk's content to the sink.
    pub async fn write_chunk(&mut self, data: &[u8]) -> Result<(), TransferError> {
        self.sink
            .write_all(data)
            .await
            .map_err(TransferError::Local)?;
        self.bytes_written += data.len() as u64;
        Ok(())
    }

    /// Flushes the sink.
    pub async fn flush(&mut self) -> Result<(), TransferError> {
        self.sink.flush().await.map_err(TransferError::Local)
    }

    /// Total bytes written so far, compared against the declared size
    /// once the chunk sequence is exhausted.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}
