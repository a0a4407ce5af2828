//! TCP server for the filedepot transfer protocol.
//!
//! One independent session task per accepted connection; sessions share
//! only the file area and the checkpoint store.

mod server;
mod session;

pub use server::{FileServer, ServerConfig};

use filedepot_checkpoint::CheckpointError;
use filedepot_protocol::ProtocolError;
use filedepot_storage::StorageError;
use filedepot_transfer::TransferError;

/// Errors produced by the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error(transparent)]
    Transfer(#[from] TransferError),
}

impl ServerError {
    /// `true` when the peer went away mid-exchange rather than the server
    /// hitting a local fault.
    pub(crate) fn is_disconnect(&self) -> bool {
        matches!(self, ServerError::Protocol(ProtocolError::ConnectionClosed))
    }
}
