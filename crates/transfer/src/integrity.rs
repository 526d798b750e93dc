use fileshelf_protocol::TransferStatus;

/// Compares bytes actually received against the declared size.
///
/// Applied exactly once per transfer, after the chunk sequence has
/// been consumed without a stream error. Chunk framing never checksums
/// content, so this comparison is the authoritative completion signal:
/// a stream can end cleanly at the transport level and still represent
/// a short transfer.
pub fn verify_size(declared: u64, received: u64) -> TransferStatus {
    if declared == received {
        TransferStatus::Ok
    } else {
        TransferStatus::Failed
    }
}
