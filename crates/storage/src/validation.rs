use crate::StorageError;

/// Validates a filename received over the wire.
///
/// The file area is flat, so only plain file names are accepted: no path
/// separators, no `..`, nothing that could address outside the area.
pub fn validate_name(name: &str) -> Result<(), StorageError> {
    if name.is_empty() {
        return Err(StorageError::InvalidName("empty name".into()));
    }

    if name == "." || name == ".." {
        return Err(StorageError::InvalidName(format!(
            "directory reference not allowed: {name}"
        )));
    }

    if name.contains('/') || name.contains('\\') {
        return Err(StorageError::InvalidName(format!(
            "path separator not allowed: {name}"
        )));
    }

    if name.contains('\0') {
        return Err(StorageError::InvalidName("NUL byte in name".into()));
    }

    Ok(())
}
