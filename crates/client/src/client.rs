use std::cmp;
use std::path::Path;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use filedepot_checkpoint::CheckpointStore;
use filedepot_protocol::{
    Command, Continuation, FramedStream, REPLY_ERROR, REPLY_READY,
};
use filedepot_transfer::{
    Direction, DigestAccumulator, ProgressTracker, TransferState, file_digest,
};

use crate::ClientError;

/// Persist the local resume checkpoint every this many received bytes.
pub const CHECKPOINT_INTERVAL: u64 = 1024 * 1024;

/// Outcome of a completed transfer after digest comparison.
///
/// A mismatch is terminal for the transfer, not retried; the bytes stay on
/// disk and the caller decides what to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Verified { digest: String },
    Mismatch { ours: String, theirs: String },
}

impl TransferOutcome {
    pub fn is_verified(&self) -> bool {
        matches!(self, TransferOutcome::Verified { .. })
    }
}

/// Client for one connection to a filedepot server.
///
/// Generic over the stream type so protocol behavior can be exercised
/// against in-memory streams; real use goes through
/// [`FileClient::connect`].
pub struct FileClient<S> {
    channel: FramedStream<S>,
    checkpoints: CheckpointStore,
    tracker: ProgressTracker,
    /// Identity written into checkpoint records (the server we talk to).
    peer_label: String,
}

impl FileClient<TcpStream> {
    /// Connects to a server and opens the local checkpoint store under
    /// `state_dir`.
    pub async fn connect(
        addr: impl tokio::net::ToSocketAddrs,
        state_dir: &Path,
    ) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        let peer_label = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "server".to_string());
        tracing::info!(peer = %peer_label, "connected");
        Self::new(stream, state_dir, peer_label)
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> FileClient<S> {
    /// Wraps an established stream.
    pub fn new(
        stream: S,
        state_dir: &Path,
        peer_label: impl Into<String>,
    ) -> Result<Self, ClientError> {
        std::fs::create_dir_all(state_dir)?;
        let checkpoints = CheckpointStore::open(state_dir.join("checkpoints.json"))?;
        Ok(Self {
            channel: FramedStream::new(stream),
            checkpoints,
            tracker: ProgressTracker::default(),
            peer_label: peer_label.into(),
        })
    }

    /// Progress observation point for a presentation layer: register
    /// callbacks or poll tracked transfers. Protocol logic never reads it.
    pub fn progress(&self) -> &ProgressTracker {
        &self.tracker
    }

    /// Lists current files on the server.
    pub async fn list(&mut self) -> Result<Vec<String>, ClientError> {
        self.channel.write_line(&Command::List.to_string()).await?;
        let mut names = Vec::new();
        loop {
            let line = self.channel.read_line().await?;
            if line.is_empty() {
                break;
            }
            names.push(line);
        }
        Ok(names)
    }

    /// Records a resume offset both locally and on the server.
    pub async fn checkpoint(&mut self, name: &str, offset: u64) -> Result<(), ClientError> {
        self.checkpoints
            .record(name, &self.peer_label, offset)
            .await?;
        self.channel
            .write_line(&Command::Checkpoint { name: name.to_string(), offset }.to_string())
            .await?;
        let reply = self.channel.read_line().await?;
        if reply != filedepot_protocol::REPLY_OK {
            return Err(ClientError::UnexpectedReply(reply));
        }
        Ok(())
    }

    /// Uploads a local file, digesting it as it streams and comparing the
    /// server's digest of what it wrote against ours.
    pub async fn upload(&mut self, path: &Path) -> Result<TransferOutcome, ClientError> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ClientError::InvalidPath(path.display().to_string()))?
            .to_string();
        let size = tokio::fs::metadata(path).await?.len();

        self.channel
            .write_line(&Command::Upload { name: name.clone(), size }.to_string())
            .await?;
        let reply = self.channel.read_line().await?;
        if reply != REPLY_READY {
            return Err(ClientError::UnexpectedReply(reply));
        }

        let state = std::sync::Arc::new(TransferState::new(&name, Direction::Outbound, size));
        state.start();
        self.tracker.track(std::sync::Arc::clone(&state));

        let mut digest = DigestAccumulator::new();
        let mut file = tokio::fs::File::open(path).await?;
        self.channel
            .send_payload(&mut file, |chunk| {
                digest.update(chunk);
                state.add_progress(chunk.len() as u64);
            })
            .await?;
        let ours = digest.finalize();

        let theirs = self.channel.read_line().await?;
        if ours == theirs {
            state.complete();
            tracing::info!(%name, size, "upload verified");
            Ok(TransferOutcome::Verified { digest: ours })
        } else {
            state.fail("digest mismatch");
            tracing::warn!(%name, %ours, %theirs, "upload digest mismatch");
            Ok(TransferOutcome::Mismatch { ours, theirs })
        }
    }

    /// Downloads `name` into `dest_dir`, resuming from a local checkpoint
    /// when the partial file on disk matches it, and verifying the digest
    /// of the whole local file on completion.
    pub async fn download(
        &mut self,
        name: &str,
        dest_dir: &Path,
    ) -> Result<TransferOutcome, ClientError> {
        tokio::fs::create_dir_all(dest_dir).await?;
        let dest = dest_dir.join(name);

        // A checkpoint only counts if the partial file actually has the
        // bytes it claims; anything else starts over.
        let mut resume_from = 0u64;
        if let Some(rec) = self.checkpoints.get(name).await {
            let actual = tokio::fs::metadata(&dest).await.map(|m| m.len()).unwrap_or(0);
            if actual > 0 && actual == rec.offset {
                resume_from = actual;
            } else {
                tracing::warn!(%name, recorded = rec.offset, actual, "discarding stale checkpoint");
                self.checkpoints.remove(name).await?;
            }
        }
        if resume_from > 0 {
            // Advisory mirror so the server's store knows where we stand.
            self.checkpoint(name, resume_from).await?;
        }

        self.channel
            .write_line(&Command::Download { name: name.to_string() }.to_string())
            .await?;
        let reply = self.channel.read_line().await?;
        if reply == REPLY_ERROR {
            return Err(ClientError::NotFound(name.to_string()));
        }
        let size: u64 = reply
            .parse()
            .map_err(|_| ClientError::UnexpectedReply(reply))?;

        if resume_from > size {
            // The server's file changed shape since the checkpoint.
            tracing::warn!(%name, resume_from, size, "checkpoint beyond server file, restarting");
            resume_from = 0;
        }

        let continuation = if resume_from > 0 {
            Continuation::Resume(resume_from)
        } else {
            Continuation::Ready
        };
        self.channel.write_line(&continuation.to_string()).await?;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .append(resume_from > 0)
            .truncate(resume_from == 0)
            .open(&dest)
            .await?;

        let state = std::sync::Arc::new(TransferState::new(name, Direction::Inbound, size));
        state.start();
        state.add_progress(resume_from);
        self.tracker.track(std::sync::Arc::clone(&state));

        // Receive in checkpoint-interval segments so a crash mid-download
        // leaves a usable resume point behind.
        let mut received = resume_from;
        while received < size {
            let span = cmp::min(CHECKPOINT_INTERVAL, size - received);
            let result = self
                .channel
                .receive_payload(span, &mut file, |chunk| {
                    state.add_progress(chunk.len() as u64);
                })
                .await;

            if let Err(e) = result {
                // Whatever reached the file is a valid resume point.
                let actual = tokio::fs::metadata(&dest).await.map(|m| m.len()).unwrap_or(received);
                self.checkpoints
                    .record(name, &self.peer_label, actual)
                    .await?;
                state.fail("connection lost");
                tracing::warn!(%name, received = actual, "download interrupted");
                return Err(e.into());
            }

            received += span;
            if received < size {
                self.checkpoints
                    .record(name, &self.peer_label, received)
                    .await?;
            }
        }
        file.flush().await?;
        drop(file);
        state.complete();

        let theirs = self.channel.read_line().await?;
        let ours = file_digest(&dest).await?;

        if ours == theirs {
            // Verified success is the one outcome that clears the record.
            self.checkpoints.remove(name).await?;
            tracing::info!(%name, size, resume_from, "download verified");
            Ok(TransferOutcome::Verified { digest: ours })
        } else {
            state.fail("digest mismatch");
            tracing::warn!(%name, %ours, %theirs, "download digest mismatch, file kept");
            Ok(TransferOutcome::Mismatch { ours, theirs })
        }
    }
}
