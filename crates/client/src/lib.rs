//! Client side of the filedepot transfer protocol.
//!
//! Mirrors the server's session protocol from the initiating side: digests
//! are computed locally and compared against the server's, downloads resume
//! from a locally persisted checkpoint, and progress is exposed through
//! pollable transfer state rather than any built-in rendering.

mod client;

pub use client::{CHECKPOINT_INTERVAL, FileClient, TransferOutcome};

use filedepot_checkpoint::CheckpointError;
use filedepot_protocol::ProtocolError;
use filedepot_transfer::TransferError;

/// Errors produced by the client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error("file not found on server: {0}")]
    NotFound(String),

    #[error("unexpected server reply: {0}")]
    UnexpectedReply(String),

    #[error("not a local file: {0}")]
    InvalidPath(String),
}
