//! Transfer bookkeeping shared by client and server: incremental SHA-256
//! digests, byte-count state, and progress/speed tracking.
//!
//! Nothing in here renders anything. Progress is exposed as pollable
//! snapshots and observable callbacks for a presentation layer to consume.

mod digest;
mod progress;
mod state;

pub use digest::{DigestAccumulator, digest_bytes, file_digest};
pub use progress::{ProgressCallback, ProgressTracker, SpeedCalculator};
pub use state::{Direction, TransferProgress, TransferState, TransferStatus};

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
