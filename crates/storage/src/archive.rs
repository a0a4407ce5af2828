//! Version-suffix naming for archived file revisions.

/// Splits a filename into base and extension, extension including the dot.
///
/// A leading dot does not start an extension, so `.bashrc` is all base.
pub(crate) fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(pos) if pos > 0 => name.split_at(pos),
        _ => (name, ""),
    }
}

/// Renders `base_v{version}{ext}`.
pub(crate) fn versioned_name(base: &str, ext: &str, version: u32) -> String {
    format!("{base}_v{version}{ext}")
}

/// Extracts the version number if `file_name` is `base_v{n}{ext}`.
pub(crate) fn parse_version(file_name: &str, base: &str, ext: &str) -> Option<u32> {
    let middle = file_name
        .strip_prefix(base)?
        .strip_suffix(ext)?
        .strip_prefix("_v")?;
    middle.parse().ok()
}
