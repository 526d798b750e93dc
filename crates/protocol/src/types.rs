use serde::{Deserialize, Serialize};

use crate::error::WireError;
use crate::{DEFAULT_FRAME_CAP, DEFAULT_MAX_TRANSFER_SIZE, META_FILENAME, META_SIZE, META_TIMESTAMP};

/// Describes one stored file at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Modification time as unix seconds.
    pub modified_at: i64,
}

/// Identity and size attributes for one in-flight transfer.
///
/// Carried as stream-level key/value headers, never inside the chunk
/// sequence. Must be available to the receiver before the first chunk
/// is consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferMetadata {
    /// Base name of the file (flat namespace, no paths).
    pub filename: String,
    /// Declared content size in bytes.
    pub size: u64,
    /// Sender's wall-clock time, informational only.
    pub timestamp: String,
}

impl TransferMetadata {
    /// Returns the metadata as wire header pairs.
    ///
    /// The size travels as a decimal string like the other values.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        vec![
            (META_FILENAME.to_string(), self.filename.clone()),
            (META_SIZE.to_string(), self.size.to_string()),
            (META_TIMESTAMP.to_string(), self.timestamp.clone()),
        ]
    }

    /// Rebuilds metadata from received header pairs.
    ///
    /// Fails with [`WireError::MissingMetadata`] if `filename` or `size`
    /// is absent or malformed. `timestamp` is optional and defaults to
    /// the empty string.
    pub fn from_pairs(pairs: &[(String, String)]) -> Result<Self, WireError> {
        let get = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        let filename = get(META_FILENAME)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| WireError::MissingMetadata("filename attribute absent".into()))?
            .to_string();

        let size = get(META_SIZE)
            .ok_or_else(|| WireError::MissingMetadata("size attribute absent".into()))?
            .parse::<u64>()
            .map_err(|e| WireError::MissingMetadata(format!("size attribute invalid: {e}")))?;

        let timestamp = get(META_TIMESTAMP).unwrap_or_default().to_string();

        Ok(Self {
            filename,
            size,
            timestamp,
        })
    }
}

/// Authoritative outcome of one completed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Ok,
    Failed,
}

/// Uniform completion value for both transfer directions.
///
/// Uploads learn the status from the server's reply byte; downloads
/// derive it client-side from the declared-vs-received size check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferResult {
    pub status: TransferStatus,
    pub bytes_transferred: u64,
}

impl TransferResult {
    pub fn ok(bytes_transferred: u64) -> Self {
        Self {
            status: TransferStatus::Ok,
            bytes_transferred,
        }
    }

    pub fn failed(bytes_transferred: u64) -> Self {
        Self {
            status: TransferStatus::Failed,
            bytes_transferred,
        }
    }

    /// Returns `true` if the transfer completed with matching sizes.
    pub fn is_ok(&self) -> bool {
        self.status == TransferStatus::Ok
    }
}

/// Deployment-configurable transfer limits.
#[derive(Debug, Clone, Copy)]
pub struct TransferLimits {
    /// Maximum bytes per chunk frame.
    pub frame_cap: usize,
    /// Maximum total bytes for one transfer.
    pub max_transfer_size: u64,
}

impl Default for TransferLimits {
    fn default() -> Self {
        Self {
            frame_cap: DEFAULT_FRAME_CAP,
            max_transfer_size: DEFAULT_MAX_TRANSFER_SIZE,
        }
    }
}
