//! Wire protocol for the filedepot transfer service.
//!
//! Commands are newline-terminated ASCII lines; binary payloads are
//! length-declared raw bytes with no additional framing. [`FramedStream`]
//! turns an unstructured stream socket into discrete protocol exchanges.

mod command;
mod framing;

pub use command::{Command, Continuation};
pub use framing::FramedStream;

/// Reply sent by the server when it is ready to receive upload bytes.
pub const REPLY_READY: &str = "READY";

/// Reply sent by the server after persisting a checkpoint.
pub const REPLY_OK: &str = "OK";

/// Reply sent by the server when a requested file does not exist.
pub const REPLY_ERROR: &str = "ERROR";

/// Chunk size for payload streaming in both directions: 64 KiB.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Longest accepted command line, terminator included. A peer that streams
/// more than this without a newline is violating the protocol.
pub const MAX_LINE_LEN: usize = 4096;

/// Errors produced by the protocol crate.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A read returned zero bytes before the expected terminator or byte
    /// count was reached. Always a truncated exchange, never a success.
    #[error("connection closed")]
    ConnectionClosed,

    /// More than [`MAX_LINE_LEN`] bytes arrived without a terminator.
    #[error("command line exceeds {} bytes", MAX_LINE_LEN)]
    LineTooLong,

    #[error("empty command")]
    EmptyCommand,

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("missing argument: {0}")]
    MissingArgument(&'static str),

    #[error("invalid argument for {command}: {value}")]
    InvalidArgument {
        command: &'static str,
        value: String,
    },

    #[error("unexpected continuation: {0}")]
    UnexpectedContinuation(String),
}
