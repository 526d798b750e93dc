//! Wire protocol for fileshelf transfers.
//!
//! One TCP connection carries one RPC call: a list request, an upload,
//! or a download. Control-plane data (the file listing) travels as a
//! JSON frame; transfer metadata travels as a key/value header block
//! written before any chunk frame; file content travels as
//! length-prefixed binary chunk frames.
//!
//! # Wire format
//!
//! ```text
//! REQUEST:   [1 byte op: 0x01=list, 0x02=upload, 0x03=download]
//!
//! METADATA:  [2 bytes BE: pair count]
//!            per pair: [2 bytes BE: key len][key UTF-8]
//!                      [2 bytes BE: value len][value UTF-8]
//!
//! CHUNK:     [4 bytes BE: length][length bytes raw data]
//! END:       [4 bytes: 0x00000000]
//!
//! UPLOAD REPLY:   [1 byte: 0x01=ok, 0x00=failed,
//!                  0x02=rejected + [2 bytes BE: len][reason UTF-8]]
//! DOWNLOAD REPLY: [1 byte: 0x01=accepted,
//!                  0x00=rejected + [2 bytes BE: len][reason UTF-8]]
//!
//! LIST REPLY: [4 bytes BE: len][JSON array of FileDescriptor]
//! ```

pub mod error;
pub mod types;
pub mod wire;

pub use error::WireError;
pub use types::{FileDescriptor, TransferLimits, TransferMetadata, TransferResult, TransferStatus};

/// Default chunk frame cap: 4 MiB.
///
/// Bounds per-message memory independent of file size. Deployments with
/// different memory profiles override it via [`TransferLimits`].
pub const DEFAULT_FRAME_CAP: usize = 4 * 1024 * 1024;

/// Default ceiling on the total size of one transfer: 8 GiB.
///
/// A deployment-time limit, not a negotiated protocol value.
pub const DEFAULT_MAX_TRANSFER_SIZE: u64 = 8 * 1024 * 1024 * 1024;

/// Metadata header key for the file's base name.
pub const META_FILENAME: &str = "filename";

/// Metadata header key for the declared size (decimal string).
pub const META_SIZE: &str = "size";

/// Metadata header key for the sender's timestamp (informational).
pub const META_TIMESTAMP: &str = "timestamp";
