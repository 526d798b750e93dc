use crate::TransferError;

/// Validates that a transfer name is a plain base name.
///
/// The namespace is flat: one directory of files keyed by base name.
/// Rejects empty names, path separators, `.`/`..` components and NUL
/// bytes so a name can never resolve outside the storage root.
pub fn validate_file_name(name: &str) -> Result<(), TransferError> {
    if name.is_empty() {
        return Err(TransferError::InvalidName("empty name".into()));
    }

    if name == "." || name == ".." {
        return Err(TransferError::InvalidName(format!(
            "directory reference not allowed: {name}"
        )));
    }

    if name.contains('/') || name.contains('\\') {
        return Err(TransferError::InvalidName(format!(
            "path separator not allowed: {name}"
        )));
    }

    if name.contains('\0') {
        return Err(TransferError::InvalidName("NUL byte in name".into()));
    }

    // Windows drive prefixes (`C:`) are plain characters on Unix but
    // resolve as roots on Windows.
    if name.len() >= 2 && name.as_bytes()[1] == b':' {
        return Err(TransferError::InvalidName(format!(
            "drive prefix not allowed: {name}"
        )));
    }

    Ok(())
}
