//! Server-side file area: the directory of current files, plus the version
//! history subarea that receives archived prior revisions on upload
//! collisions.

mod archive;
mod area;
mod validation;

pub use area::{FileArea, VERSION_DIR};
pub use validation::validate_name;

/// Errors produced by the storage crate.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("invalid name: {0}")]
    InvalidName(String),
}
