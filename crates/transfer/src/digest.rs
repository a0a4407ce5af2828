use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

use crate::TransferError;

/// Incremental SHA-256 over a byte stream.
///
/// `update` may be called any number of times with arbitrary-sized chunks.
/// `finalize` consumes the accumulator, so updating after finalization is
/// ruled out at the type level.
#[derive(Default)]
pub struct DigestAccumulator {
    hasher: Sha256,
}

impl DigestAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk into the digest.
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    /// Ends accumulation and returns the hex-encoded digest (64 chars).
    pub fn finalize(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

/// Computes SHA-256 of `data` and returns the hex-encoded digest.
pub fn digest_bytes(data: &[u8]) -> String {
    let mut acc = DigestAccumulator::new();
    acc.update(data);
    acc.finalize()
}

/// Computes SHA-256 of an entire file and returns the hex-encoded digest.
///
/// Reads through `tokio::fs` so hashing a large file never stalls the
/// runtime's worker threads.
pub async fn file_digest(path: &Path) -> Result<String, TransferError> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut acc = DigestAccumulator::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        acc.update(&buf[..n]);
    }
    Ok(acc.finalize())
}
